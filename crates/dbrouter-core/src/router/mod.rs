//! Read/write splitting entry point.
//!
//! ```text
//! query   ──► sticky window after a write? ──► master (if healthy)
//!             else fastest healthy provider ──► else master regardless
//!             failure ──► one retry on a different healthy provider
//!
//! execute ──► master only (rejected when absent or unhealthy)
//!             success ──► stamp last write ──► replication.after_write
//! ```
//!
//! `shutdown` is terminal: it waits for in-flight replication, disconnects
//! every provider and makes later calls fail with [`RouterError::ShutDown`].
//!
//! The router owns a [`HealthMonitor`] and a [`ReplicationEngine`] sharing one
//! [`ProviderRegistry`]. Monitor `provider:*` events resync the replication
//! targets before being forwarded, together with replication events, to
//! listeners added via [`DbRouter::add_event_listener`].

mod builder;

#[cfg(test)]
mod tests;

pub use builder::DbRouterBuilder;

use builder::Registration;
use chrono::{DateTime, Utc};
use dbrouter_types::{
    ProviderError, ProviderStatus, QueryResult, Result, RouterConfig, RouterError, RouterEvent,
    RouterStatus, Row, SqlParam,
};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::events::{EventBus, RouterEventListener};
use crate::health::HealthMonitor;
use crate::metrics;
use crate::provider::{ManagedProvider, ProviderRegistry};
use crate::replication::ReplicationEngine;

#[derive(Debug, Clone, Copy)]
struct LastWrite {
    /// Monotonic, for the sticky window
    at: Instant,
    /// Wall clock, for status output
    wall: DateTime<Utc>,
}

/// Health-aware read/write router. Construct once at startup and share it.
pub struct DbRouter {
    config: RouterConfig,
    registrations: Vec<Registration>,
    registry: Arc<ProviderRegistry>,
    monitor: Arc<HealthMonitor>,
    replication: Arc<ReplicationEngine>,
    events: Arc<EventBus>,
    initialized: AtomicBool,
    closed: AtomicBool,
    init_lock: tokio::sync::Mutex<()>,
    last_write: RwLock<Option<LastWrite>>,
    /// Replication spawned by `execute`, drained on shutdown
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl DbRouter {
    fn assemble(config: RouterConfig, registrations: Vec<Registration>) -> Arc<Self> {
        let registry = Arc::new(ProviderRegistry::new());
        let monitor = HealthMonitor::with_registry(Arc::clone(&registry), config.health.clone());
        let replication = ReplicationEngine::new(config.replication.clone());
        let events = Arc::new(EventBus::new());

        {
            let events = Arc::clone(&events);
            let replication = Arc::clone(&replication);
            let registry = Arc::clone(&registry);
            let enable_sync = config.enable_sync;
            monitor.subscribe(Arc::new(move |event: &RouterEvent| {
                if enable_sync && event.event_type.is_provider_event() {
                    replication.update_slaves(&registry.all());
                }
                events.emit(event);
            }));
        }
        {
            let events = Arc::clone(&events);
            replication.subscribe(Arc::new(move |event: &RouterEvent| events.emit(event)));
        }

        Arc::new(Self {
            config,
            registrations,
            registry,
            monitor,
            replication,
            events,
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            init_lock: tokio::sync::Mutex::new(()),
            last_write: RwLock::new(None),
            in_flight: Mutex::new(Vec::new()),
        })
    }

    /// Register providers, run a first health pass and start the background
    /// tasks. Idempotent; called lazily by every query. Fails once the
    /// router has been shut down.
    pub async fn init(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        let _guard = self.init_lock.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(RouterError::ShutDown);
        }
        if self.is_initialized() {
            return Ok(());
        }

        for registration in &self.registrations {
            self.monitor.register_provider(Arc::new(ManagedProvider::new(
                Arc::clone(&registration.backend),
                registration.role,
                registration.priority,
            )));
        }
        if self.registry.is_empty() {
            tracing::warn!("Router initialized without providers");
        }

        if self.config.enable_health_check {
            self.monitor.check_all().await;
            self.monitor.start();
        }
        if self.config.enable_sync {
            self.replication.update_slaves(&self.registry.all());
            self.replication.start();
        }

        self.initialized.store(true, Ordering::SeqCst);
        let master = self.registry.master();
        tracing::info!(
            providers = self.registry.len(),
            master = master.as_ref().map(|p| p.name()),
            health_check = self.config.enable_health_check,
            sync = self.config.enable_sync,
            "Router initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn within_sticky_window(&self) -> bool {
        self.last_write
            .read()
            .is_some_and(|write| write.at.elapsed() < self.config.sticky_read_duration())
    }

    fn select_read_provider(&self) -> Result<Arc<ManagedProvider>> {
        let master = self.registry.master();

        if let Some(master) = &master {
            if master.is_healthy() && self.within_sticky_window() {
                return Ok(Arc::clone(master));
            }
        }
        if let Some(fastest) = self.registry.healthy_by_latency().into_iter().next() {
            return Ok(fastest);
        }
        master.ok_or(RouterError::NoProvidersAvailable)
    }

    async fn run_read(
        &self,
        provider: &ManagedProvider,
        sql: &str,
        params: &[SqlParam],
    ) -> std::result::Result<QueryResult, ProviderError> {
        let started = Instant::now();
        let result = provider.query(sql, params).await;
        metrics::record_query("read", provider.name(), result.is_ok(), started.elapsed());
        result
    }

    /// Read path.
    pub async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<QueryResult> {
        self.init().await?;
        let provider = self.select_read_provider()?;

        let err = match self.run_read(&provider, sql, params).await {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };

        let fallback = self
            .registry
            .healthy_by_latency()
            .into_iter()
            .find(|candidate| candidate.name() != provider.name());

        let Some(fallback) = fallback else {
            return Err(err.into());
        };

        tracing::warn!(
            provider = %provider.name(),
            fallback = %fallback.name(),
            error = %err,
            "Read failed, retrying on fallback provider"
        );
        Ok(self.run_read(&fallback, sql, params).await?)
    }

    /// Write path. Always the master; never redirected.
    pub async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<QueryResult> {
        self.init().await?;
        let master = self.registry.master().ok_or(RouterError::NoProvidersAvailable)?;
        if master.status() == ProviderStatus::Unhealthy {
            tracing::warn!(provider = %master.name(), "Write rejected, master unhealthy");
            return Err(RouterError::MasterUnhealthy { provider: master.name().to_string() });
        }

        let started = Instant::now();
        let result = master.execute(sql, params).await;
        metrics::record_query("write", master.name(), result.is_ok(), started.elapsed());
        let result = result?;

        *self.last_write.write() = Some(LastWrite { at: Instant::now(), wall: Utc::now() });

        if self.config.enable_sync {
            let handle = self.replication.after_write(sql.to_string(), params.to_vec());
            let mut in_flight = self.in_flight.lock();
            in_flight.retain(|task| !task.is_finished());
            in_flight.push(handle);
        }
        Ok(result)
    }

    pub async fn query_one(&self, sql: &str, params: &[SqlParam]) -> Result<Option<Row>> {
        Ok(self.query(sql, params).await?.into_first())
    }

    /// Write returning the first row (`INSERT ... RETURNING`).
    pub async fn execute_one(&self, sql: &str, params: &[SqlParam]) -> Result<Option<Row>> {
        Ok(self.execute(sql, params).await?.into_first())
    }

    pub async fn query_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Vec<T>> {
        Ok(self.query(sql, params).await?.deserialize_rows()?)
    }

    pub async fn query_one_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<T>> {
        let row = self.query_one(sql, params).await?;
        Ok(row.map(|row| serde_json::from_value(row.into())).transpose()?)
    }

    pub async fn execute_one_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<T>> {
        let row = self.execute_one(sql, params).await?;
        Ok(row.map(|row| serde_json::from_value(row.into())).transpose()?)
    }

    /// Listeners receive monitor and replication events, in registration order.
    pub fn add_event_listener<L>(&self, listener: L)
    where
        L: RouterEventListener + 'static,
    {
        self.events.add_listener(Arc::new(listener));
    }

    pub fn status(&self) -> RouterStatus {
        RouterStatus {
            initialized: self.is_initialized(),
            master: self.registry.master().map(|p| p.name().to_string()),
            providers: self.registry.snapshot(),
            sync_queue: self.replication.stats(),
            last_write_at: self.last_write_at(),
        }
    }

    /// Run one health pass now and return the resulting status.
    pub async fn check_health(&self) -> RouterStatus {
        if self.init().await.is_ok() {
            self.monitor.check_all().await;
        }
        self.status()
    }

    /// Drain the replication queue once now.
    pub async fn process_sync_queue(&self) -> Result<()> {
        self.init().await?;
        self.replication.process_queue().await;
        Ok(())
    }

    /// Let in-flight replication finish, stop background tasks, disconnect
    /// every provider and reset to the uninitialized state. The backends are
    /// not reopened, so every later call returns [`RouterError::ShutDown`].
    pub async fn shutdown(&self) {
        let _guard = self.init_lock.lock().await;
        self.closed.store(true, Ordering::SeqCst);

        let in_flight = std::mem::take(&mut *self.in_flight.lock());
        if !in_flight.is_empty() {
            tracing::debug!(tasks = in_flight.len(), "Waiting for in-flight replication");
            for result in join_all(in_flight).await {
                if let Err(err) = result {
                    tracing::warn!(error = %err, "Replication task ended abnormally");
                }
            }
        }

        self.monitor.stop().await;
        self.replication.stop().await;

        for provider in self.registry.all() {
            provider.disconnect().await;
        }
        self.registry.clear();
        self.replication.update_slaves(&[]);
        *self.last_write.write() = None;
        self.initialized.store(false, Ordering::SeqCst);

        tracing::info!("Router shut down");
    }

    pub fn last_write_at(&self) -> Option<DateTime<Utc>> {
        self.last_write.read().map(|write| write.wall)
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn replication(&self) -> &Arc<ReplicationEngine> {
        &self.replication
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }
}
