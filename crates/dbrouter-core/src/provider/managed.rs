//! Health bookkeeping around a provider backend.

use chrono::{DateTime, Utc};
use dbrouter_types::{
    ProviderError, ProviderRole, ProviderSnapshot, ProviderStatus, QueryResult, SqlParam,
};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::Provider;

#[derive(Debug)]
struct ProviderState {
    role: ProviderRole,
    status: ProviderStatus,
    /// `None` until the first measurement
    latency: Option<Duration>,
    failure_count: u32,
    success_count: u32,
    last_check_at: Option<DateTime<Utc>>,
}

impl ProviderState {
    fn record(&mut self, ok: bool, latency: Option<Duration>) {
        if let Some(latency) = latency {
            self.latency = Some(latency);
        }
        if ok {
            self.failure_count = 0;
            self.success_count = self.success_count.saturating_add(1);
        } else {
            self.success_count = 0;
            self.failure_count = self.failure_count.saturating_add(1);
        }
    }
}

/// A registered provider: backend plus role, status, latency and counters.
///
/// Every `query`/`execute`/`ping` updates latency and the consecutive
/// counters. Role and status are only changed by the health monitor.
pub struct ManagedProvider {
    backend: Arc<dyn Provider>,
    name: String,
    priority: i32,
    state: RwLock<ProviderState>,
}

impl std::fmt::Debug for ManagedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProvider")
            .field("name", &self.name)
            .field("backend", &self.backend.backend())
            .field("priority", &self.priority)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl ManagedProvider {
    pub fn new(backend: Arc<dyn Provider>, role: ProviderRole, priority: i32) -> Self {
        let name = backend.name().to_string();
        Self {
            backend,
            name,
            priority,
            state: RwLock::new(ProviderState {
                role,
                status: ProviderStatus::Unknown,
                latency: None,
                failure_count: 0,
                success_count: 0,
                last_check_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn backend(&self) -> &'static str {
        self.backend.backend()
    }

    pub fn role(&self) -> ProviderRole {
        self.state.read().role
    }

    pub fn status(&self) -> ProviderStatus {
        self.state.read().status
    }

    pub fn is_master(&self) -> bool {
        self.role() == ProviderRole::Master
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == ProviderStatus::Healthy
    }

    pub fn latency(&self) -> Option<Duration> {
        self.state.read().latency
    }

    /// Latency used for ordering; unmeasured providers sort last.
    pub(crate) fn latency_rank(&self) -> Duration {
        self.latency().unwrap_or(Duration::MAX)
    }

    pub fn failure_count(&self) -> u32 {
        self.state.read().failure_count
    }

    pub fn success_count(&self) -> u32 {
        self.state.read().success_count
    }

    /// Read path.
    pub async fn query(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<QueryResult, ProviderError> {
        self.tracked_run(sql, params).await
    }

    /// Write path. Same execution as `query`; only the routing intent differs.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<QueryResult, ProviderError> {
        self.tracked_run(sql, params).await
    }

    async fn tracked_run(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<QueryResult, ProviderError> {
        let started = Instant::now();
        let result = self.backend.run(sql, params).await;
        let elapsed = started.elapsed();

        self.state.write().record(result.is_ok(), Some(elapsed));

        if let Err(ref err) = result {
            tracing::debug!(
                provider = %self.name,
                latency_ms = elapsed.as_secs_f64() * 1000.0,
                error = %err,
                "Statement failed"
            );
        }
        result
    }

    /// Liveness check. A failed ping counts as a failure.
    pub async fn ping(&self) -> bool {
        self.ping_within(Duration::MAX).await.is_ok()
    }

    /// Liveness check under a deadline. A ping that misses it fails with
    /// [`ProviderError::Timeout`] and counts as a failure.
    pub async fn ping_within(&self, timeout: Duration) -> Result<(), ProviderError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, self.backend.ping()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: self.name.clone(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        };
        let elapsed = started.elapsed();

        let ok = result.is_ok();
        self.state.write().record(ok, ok.then_some(elapsed));

        if let Err(ref err) = result {
            tracing::debug!(provider = %self.name, error = %err, "Ping failed");
        }
        result
    }

    pub(crate) fn mark_checked(&self) {
        self.state.write().last_check_at = Some(Utc::now());
    }

    pub(crate) fn set_role(&self, role: ProviderRole) {
        self.state.write().role = role;
    }

    pub(crate) fn set_status(&self, status: ProviderStatus) {
        self.state.write().status = status;
    }

    /// Status, failure count and success count read under one lock.
    pub(crate) fn health_counters(&self) -> (ProviderStatus, u32, u32) {
        let state = self.state.read();
        (state.status, state.failure_count, state.success_count)
    }

    pub async fn disconnect(&self) {
        self.backend.disconnect().await;
    }

    pub fn snapshot(&self) -> ProviderSnapshot {
        let state = self.state.read();
        ProviderSnapshot {
            name: self.name.clone(),
            backend: self.backend.backend().to_string(),
            role: state.role,
            status: state.status,
            priority: self.priority,
            latency_ms: state.latency.map(|d| d.as_secs_f64() * 1000.0),
            failure_count: state.failure_count,
            success_count: state.success_count,
            last_check_at: state.last_check_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;

    fn managed(mock: &Arc<MockProvider>) -> ManagedProvider {
        ManagedProvider::new(mock.clone(), ProviderRole::Slave, 1)
    }

    #[tokio::test]
    async fn test_counters_are_mutually_exclusive() {
        let mock = MockProvider::new("s");
        let provider = managed(&mock);

        provider.query("SELECT 1", &[]).await.unwrap();
        provider.execute("UPDATE t SET a = 1", &[]).await.unwrap();
        assert_eq!((provider.failure_count(), provider.success_count()), (0, 2));

        mock.set_failing(true);
        assert!(provider.query("SELECT 1", &[]).await.is_err());
        assert_eq!((provider.failure_count(), provider.success_count()), (1, 0));

        assert!(!provider.ping().await);
        assert_eq!((provider.failure_count(), provider.success_count()), (2, 0));

        mock.set_failing(false);
        assert!(provider.ping().await);
        assert_eq!((provider.failure_count(), provider.success_count()), (0, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_past_deadline_is_timeout() {
        let mock = MockProvider::new("slow");
        let provider = managed(&mock);
        mock.set_delay(Duration::from_secs(10));

        let err = provider.ping_within(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout { provider: "slow".to_string(), timeout_ms: 50 });
        assert_eq!((provider.failure_count(), provider.success_count()), (1, 0));
        assert_eq!(provider.latency(), None);

        mock.set_delay(Duration::from_millis(5));
        provider.ping_within(Duration::from_millis(50)).await.unwrap();
        assert_eq!(provider.latency(), Some(Duration::from_millis(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_recorded_on_every_call() {
        let mock = MockProvider::new("s");
        let provider = managed(&mock);
        assert_eq!(provider.latency(), None);
        assert_eq!(provider.latency_rank(), Duration::MAX);

        mock.set_delay(Duration::from_millis(40));
        provider.query("SELECT 1", &[]).await.unwrap();
        assert_eq!(provider.latency(), Some(Duration::from_millis(40)));

        mock.set_delay(Duration::from_millis(15));
        mock.set_failing(true);
        assert!(provider.execute("SELECT 1", &[]).await.is_err());
        assert_eq!(provider.latency(), Some(Duration::from_millis(15)));
    }

    #[tokio::test]
    async fn test_errors_propagate_unchanged() {
        let mock = MockProvider::new("s");
        mock.set_failing(true);
        let provider = managed(&mock);

        let err = provider.query("SELECT 1", &[]).await.unwrap_err();
        assert_eq!(err.provider(), "s");
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_snapshot_starts_unknown() {
        let mock = MockProvider::new("s");
        let snapshot = managed(&mock).snapshot();
        assert_eq!(snapshot.status, ProviderStatus::Unknown);
        assert_eq!(snapshot.role, ProviderRole::Slave);
        assert_eq!(snapshot.latency_ms, None);
        assert_eq!(snapshot.backend, "mock");
    }
}
