use dbrouter_types::{
    ProviderRole, ReplicationConfig, RouterEvent, RouterEventType, SqlParam, SyncOrigin,
    SyncQueueEntry, SyncQueueStats, SyncStatus,
};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::events::{EventBus, RouterEventListener};
use crate::metrics;
use crate::provider::ManagedProvider;

/// Clears the draining flag when a drain pass ends, including on panic.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum DrainOutcome {
    Synced,
    Retry { error: Option<String> },
}

pub struct ReplicationEngine {
    config: ReplicationConfig,
    /// Replication targets: healthy slaves only
    slaves: RwLock<HashMap<String, Arc<ManagedProvider>>>,
    queue: Mutex<Vec<SyncQueueEntry>>,
    events: EventBus,
    draining: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReplicationEngine {
    pub fn new(config: ReplicationConfig) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            config,
            slaves: RwLock::new(HashMap::new()),
            queue: Mutex::new(Vec::new()),
            events: EventBus::new(),
            draining: AtomicBool::new(false),
            shutdown_tx,
            task: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Receive `sync:success` / `sync:failed` events.
    pub fn subscribe(&self, listener: Arc<dyn RouterEventListener>) {
        self.events.add_listener(listener);
    }

    /// Replace the replication targets with the healthy slaves among `providers`.
    pub fn update_slaves(&self, providers: &[Arc<ManagedProvider>]) {
        let next: HashMap<String, Arc<ManagedProvider>> = providers
            .iter()
            .filter(|p| p.role() == ProviderRole::Slave && p.is_healthy())
            .map(|p| (p.name().to_string(), Arc::clone(p)))
            .collect();

        let mut slaves = self.slaves.write();
        let changed = slaves.len() != next.len() || next.keys().any(|k| !slaves.contains_key(k));
        *slaves = next;

        if changed {
            let mut names: Vec<&str> = slaves.keys().map(String::as_str).collect();
            names.sort_unstable();
            tracing::info!(slaves = ?names, "Replication targets updated");
        }
    }

    /// Names of the current replication targets, sorted.
    pub fn slave_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slaves.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn targets(&self) -> Vec<Arc<ManagedProvider>> {
        self.slaves.read().values().cloned().collect()
    }

    /// Fire-and-forget replication of a write that already succeeded on the
    /// master. The router keeps the handle so shutdown can wait for it.
    pub fn after_write(self: &Arc<Self>, sql: String, params: Vec<SqlParam>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.replicate(&sql, &params).await })
    }

    /// Execute a write on every target concurrently; failures are queued.
    pub async fn replicate(&self, sql: &str, params: &[SqlParam]) {
        let targets = self.targets();
        if targets.is_empty() {
            return;
        }

        let outcomes =
            join_all(targets.iter().map(|slave| async move { slave.execute(sql, params).await }))
                .await;

        for (slave, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(_) => {
                    metrics::record_replication(SyncOrigin::Immediate.as_str(), "success");
                    tracing::debug!(provider = %slave.name(), "Write replicated");
                    self.events.emit(
                        &RouterEvent::new(RouterEventType::SyncSuccess, slave.name())
                            .with_details(json!({ "origin": SyncOrigin::Immediate })),
                    );
                },
                Err(err) => {
                    let entry = SyncQueueEntry::new(
                        sql.to_string(),
                        params.to_vec(),
                        slave.name().to_string(),
                    );
                    let entry_id = entry.id;
                    self.queue.lock().push(entry);

                    metrics::record_replication(SyncOrigin::Immediate.as_str(), "failed");
                    tracing::warn!(
                        provider = %slave.name(),
                        entry_id = %entry_id,
                        error = %err,
                        "Replication failed, queued for retry"
                    );
                    self.events.emit(
                        &RouterEvent::new(RouterEventType::SyncFailed, slave.name()).with_details(
                            json!({
                                "origin": SyncOrigin::Immediate,
                                "entryId": entry_id,
                                "error": err.to_string(),
                                "queued": true,
                            }),
                        ),
                    );
                },
            }
        }
    }

    /// One drain pass over pending entries, then cleanup of old settled ones.
    /// Concurrent calls return immediately while a pass is running.
    pub async fn process_queue(&self) {
        if self.draining.swap(true, Ordering::SeqCst) {
            tracing::debug!("Replication drain already running, skipping");
            return;
        }
        let _guard = DrainGuard(&self.draining);

        let pending: Vec<(Uuid, String, Vec<SqlParam>, String)> = self
            .queue
            .lock()
            .iter()
            .filter(|entry| entry.is_pending())
            .map(|entry| {
                (entry.id, entry.sql.clone(), entry.params.clone(), entry.target_provider.clone())
            })
            .collect();

        if !pending.is_empty() {
            tracing::debug!(pending = pending.len(), "Draining replication queue");
        }

        for (id, sql, params, target) in pending {
            let slave = self.slaves.read().get(&target).cloned();
            let outcome = match slave {
                Some(slave) if slave.is_healthy() => match slave.execute(&sql, &params).await {
                    Ok(_) => DrainOutcome::Synced,
                    Err(err) => DrainOutcome::Retry { error: Some(err.to_string()) },
                },
                _ => DrainOutcome::Retry { error: None },
            };
            if let Some(event) = self.settle(id, &target, outcome) {
                self.events.emit(&event);
            }
        }

        self.cleanup();
    }

    /// Apply a drain outcome to the entry. Returns the event to emit, if any.
    fn settle(&self, id: Uuid, target: &str, outcome: DrainOutcome) -> Option<RouterEvent> {
        let mut queue = self.queue.lock();
        let entry = queue.iter_mut().find(|entry| entry.id == id)?;

        match outcome {
            DrainOutcome::Synced => {
                entry.status = SyncStatus::Synced;
                metrics::record_replication(SyncOrigin::Queue.as_str(), "success");
                tracing::info!(
                    provider = %target,
                    entry_id = %id,
                    retries = entry.retry_count,
                    "Queued write replicated"
                );
                Some(
                    RouterEvent::new(RouterEventType::SyncSuccess, target).with_details(json!({
                        "origin": SyncOrigin::Queue,
                        "entryId": id,
                        "retryCount": entry.retry_count,
                    })),
                )
            },
            DrainOutcome::Retry { error } => {
                entry.retry_count = entry.retry_count.saturating_add(1);
                if entry.retry_count < self.config.max_retries {
                    tracing::debug!(
                        provider = %target,
                        entry_id = %id,
                        retries = entry.retry_count,
                        attempted = error.is_some(),
                        "Queued replication still pending"
                    );
                    return None;
                }

                entry.status = SyncStatus::Failed;
                metrics::record_replication(SyncOrigin::Queue.as_str(), "exhausted");
                tracing::error!(
                    provider = %target,
                    entry_id = %id,
                    retries = entry.retry_count,
                    error = error.as_deref().unwrap_or("target unavailable"),
                    "Replication permanently failed"
                );
                Some(RouterEvent::new(RouterEventType::SyncFailed, target).with_details(json!({
                    "origin": SyncOrigin::Queue,
                    "entryId": id,
                    "retryCount": entry.retry_count,
                    "error": error,
                })))
            },
        }
    }

    /// Drop settled entries older than the cleanup age. Pending entries stay.
    fn cleanup(&self) {
        let max_age = self.config.cleanup_age();
        let now = chrono::Utc::now();

        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|entry| {
            entry.is_pending() || (now - entry.timestamp).to_std().unwrap_or_default() < max_age
        });

        let removed = before - queue.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = queue.len(), "Replication queue cleaned up");
        }
    }

    pub fn stats(&self) -> SyncQueueStats {
        self.queue.lock().iter().collect()
    }

    /// Snapshot of every queued entry.
    pub fn entries(&self) -> Vec<SyncQueueEntry> {
        self.queue.lock().clone()
    }

    /// Start the periodic drain, first pass after one `retry_delay`.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        self.shutdown_tx.send_replace(false);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let weak = Arc::downgrade(self);
        let period = self.config.retry_delay();

        tracing::info!(retry_delay_ms = self.config.retry_delay_ms, "Replication drain started");

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(engine) = weak.upgrade() else { break };
                        engine.process_queue().await;
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Replication drain task shutting down");
                        break;
                    }
                }
            }
        }));
    }

    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "Replication drain task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ReplicationEngine {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
