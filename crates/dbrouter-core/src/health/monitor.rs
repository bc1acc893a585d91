//! Health Monitor implementation.

use dbrouter_types::{
    HealthConfig, ProviderRole, ProviderSnapshot, ProviderStatus, RouterEvent, RouterEventType,
};
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::events::{EventBus, RouterEventListener};
use crate::metrics;
use crate::provider::{ManagedProvider, ProviderRegistry};

/// Polls providers, evolves their status and performs failover.
///
/// The monitor is the only component that changes a provider's role or
/// status. Events are emitted after the registry locks are released.
pub struct HealthMonitor {
    registry: Arc<ProviderRegistry>,
    config: HealthConfig,
    events: EventBus,
    /// Shutdown signal for the poll task
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Create a monitor with an empty registry.
    pub fn new(config: HealthConfig) -> Arc<Self> {
        Self::with_registry(Arc::new(ProviderRegistry::new()), config)
    }

    pub fn with_registry(registry: Arc<ProviderRegistry>, config: HealthConfig) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            registry,
            config,
            events: EventBus::new(),
            shutdown_tx,
            task: Mutex::new(None),
        })
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Receive `provider:*` and `router:failover` events.
    pub fn subscribe(&self, listener: Arc<dyn RouterEventListener>) {
        self.events.add_listener(listener);
    }

    pub fn register_provider(&self, provider: Arc<ManagedProvider>) {
        tracing::info!(
            provider = %provider.name(),
            backend = provider.backend(),
            role = %provider.role(),
            priority = provider.priority(),
            "Provider registered"
        );
        self.registry.register(provider);
    }

    /// De-register a provider. Removing the master hands the role to the best
    /// remaining provider (healthy slaves first, then by priority).
    pub fn remove_provider(&self, name: &str) -> Option<Arc<ManagedProvider>> {
        let removed = self.registry.remove(name)?;
        tracing::info!(provider = %name, "Provider removed");

        if removed.is_master() {
            let successor = self
                .registry
                .healthy_slaves()
                .into_iter()
                .next()
                .or_else(|| self.registry.all().into_iter().next());

            if let Some(successor) = successor {
                self.registry.promote(&successor);
                tracing::warn!(
                    provider = %successor.name(),
                    previous_master = %name,
                    "Master removed, promoted replacement"
                );
                let details = json!({ "reason": "master_removed", "previousMaster": name });
                self.events.emit(
                    &RouterEvent::new(RouterEventType::ProviderPromoted, successor.name())
                        .with_details(details),
                );
            }
        }
        Some(removed)
    }

    /// Start the poll task. The first pass runs after one interval.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        self.shutdown_tx.send_replace(false);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let weak = Arc::downgrade(self);
        let interval = self.config.check_interval();

        tracing::info!(
            interval_ms = self.config.check_interval_ms,
            providers = self.registry.len(),
            "Health monitor started"
        );

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(monitor) = weak.upgrade() else { break };
                        monitor.check_all().await;
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Health monitor poll task shutting down");
                        break;
                    }
                }
            }
        }));
    }

    /// Stop the poll task, waiting for an in-flight pass to finish.
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "Health monitor task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run one polling pass: ping everything concurrently, update statuses,
    /// then evaluate failover.
    pub async fn check_all(&self) {
        let providers = self.registry.all();
        if providers.is_empty() {
            return;
        }

        let timeout = self.config.ping_timeout();
        let outcomes = join_all(providers.iter().map(|provider| async move {
            let ok = provider.ping_within(timeout).await.is_ok();
            provider.mark_checked();
            ok
        }))
        .await;

        for (provider, ok) in providers.iter().zip(outcomes) {
            if let Some(event) = self.evaluate_status(provider, ok) {
                self.events.emit(&event);
            }
        }

        for event in self.evaluate_failover() {
            self.events.emit(&event);
        }
    }

    fn evaluate_status(&self, provider: &ManagedProvider, ping_ok: bool) -> Option<RouterEvent> {
        let (status, failures, successes) = provider.health_counters();

        if ping_ok
            && status != ProviderStatus::Healthy
            && (status == ProviderStatus::Unknown || successes >= self.config.recovery_threshold)
        {
            provider.set_status(ProviderStatus::Healthy);
            tracing::info!(
                provider = %provider.name(),
                previous = %status,
                successes,
                "Provider healthy"
            );
            return Some(RouterEvent::new(RouterEventType::ProviderHealthy, provider.name()));
        }

        if !ping_ok
            && status != ProviderStatus::Unhealthy
            && failures >= self.config.failure_threshold
        {
            provider.set_status(ProviderStatus::Unhealthy);
            tracing::warn!(
                provider = %provider.name(),
                failures,
                threshold = self.config.failure_threshold,
                "Provider unhealthy"
            );
            return Some(
                RouterEvent::new(RouterEventType::ProviderUnhealthy, provider.name())
                    .with_details(json!({ "failureCount": failures })),
            );
        }

        None
    }

    fn evaluate_failover(&self) -> Vec<RouterEvent> {
        let mut events = Vec::new();

        if let Some(master) = self.registry.master() {
            if master.status() == ProviderStatus::Unhealthy {
                if let Some(candidate) = self.registry.healthy_slaves().into_iter().next() {
                    self.registry.promote(&candidate);
                    metrics::record_failover(master.name(), candidate.name());
                    tracing::warn!(
                        previous_master = %master.name(),
                        new_master = %candidate.name(),
                        "Failover: master unhealthy, promoted slave"
                    );

                    events.push(RouterEvent::new(RouterEventType::ProviderDemoted, master.name()));
                    events.push(RouterEvent::new(
                        RouterEventType::ProviderPromoted,
                        candidate.name(),
                    ));
                    events.push(
                        RouterEvent::new(RouterEventType::RouterFailover, candidate.name())
                            .with_details(json!({ "previousMaster": master.name() })),
                    );
                }
            }
        }

        // No hysteresis: runs on every pass the boot-time master is healthy but demoted.
        if let Some(original) = self.registry.original_master() {
            if original.is_healthy() && original.role() == ProviderRole::Slave {
                let previous = self.registry.promote(&original);
                let reason = json!({ "reason": "original_master_recovered" });
                tracing::info!(
                    provider = %original.name(),
                    previous_master = previous.as_ref().map(|p| p.name()),
                    "Original master recovered, re-promoted"
                );

                if let Some(previous) = previous {
                    metrics::record_failover(previous.name(), original.name());
                    events.push(
                        RouterEvent::new(RouterEventType::ProviderDemoted, previous.name())
                            .with_details(reason.clone()),
                    );
                }
                events.push(
                    RouterEvent::new(RouterEventType::ProviderPromoted, original.name())
                        .with_details(reason),
                );
            }
        }

        events
    }

    pub fn master(&self) -> Option<Arc<ManagedProvider>> {
        self.registry.master()
    }

    /// Healthy slaves, lowest priority first.
    pub fn healthy_slaves(&self) -> Vec<Arc<ManagedProvider>> {
        self.registry.healthy_slaves()
    }

    /// Healthy providers, fastest first.
    pub fn healthy_by_latency(&self) -> Vec<Arc<ManagedProvider>> {
        self.registry.healthy_by_latency()
    }

    pub fn status_snapshot(&self) -> BTreeMap<String, ProviderSnapshot> {
        self.registry.snapshot()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
