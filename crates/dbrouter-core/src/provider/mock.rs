//! Scriptable in-memory provider for tests.

use async_trait::async_trait;
use dbrouter_types::{ProviderError, QueryResult, Row, SqlParam};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::Provider;

/// A provider whose availability, latency and result rows are set by the test.
///
/// Records every statement it receives; pings are counted separately.
pub struct MockProvider {
    name: String,
    failing: AtomicBool,
    delay: Mutex<Duration>,
    rows: Mutex<Vec<Row>>,
    statements: Mutex<Vec<(String, Vec<SqlParam>)>>,
    pings: AtomicU32,
    disconnected: AtomicBool,
}

impl MockProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            failing: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            rows: Mutex::new(Vec::new()),
            statements: Mutex::new(Vec::new()),
            pings: AtomicU32::new(0),
            disconnected: AtomicBool::new(false),
        })
    }

    /// Make every statement and ping fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Artificial round-trip time applied to statements and pings.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Rows returned by every successful statement.
    pub fn set_rows(&self, rows: Vec<Row>) {
        *self.rows.lock() = rows;
    }

    /// SQL text of every statement received, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().iter().map(|(sql, _)| sql.clone()).collect()
    }

    /// Parameters of the most recent statement.
    pub fn last_params(&self) -> Option<Vec<SqlParam>> {
        self.statements.lock().last().map(|(_, params)| params.clone())
    }

    pub fn call_count(&self) -> usize {
        self.statements.lock().len()
    }

    pub fn ping_count(&self) -> u32 {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    async fn simulate_round_trip(&self) {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> &'static str {
        "mock"
    }

    async fn run(&self, sql: &str, params: &[SqlParam]) -> Result<QueryResult, ProviderError> {
        self.statements.lock().push((sql.to_string(), params.to_vec()));
        self.simulate_round_trip().await;

        if self.is_disconnected() {
            return Err(ProviderError::Disconnected { provider: self.name.clone() });
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Query {
                provider: self.name.clone(),
                message: "simulated failure".to_string(),
            });
        }
        Ok(QueryResult::from_rows(self.rows.lock().clone()))
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        self.simulate_round_trip().await;

        if self.failing.load(Ordering::SeqCst) || self.is_disconnected() {
            return Err(ProviderError::Connection {
                provider: self.name.clone(),
                message: "simulated outage".to_string(),
            });
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}
