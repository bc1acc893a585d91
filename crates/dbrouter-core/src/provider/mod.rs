//! Provider abstraction.
//!
//! A [`Provider`] is one physical connection to a backing store. It knows how
//! to run a statement and how to answer a liveness ping; nothing else.
//! Health bookkeeping (latency, consecutive success/failure counters, role,
//! status) lives in [`ManagedProvider`], which wraps every backend the same way.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ProviderRegistry                            │
//! │  └── name → Arc<ManagedProvider>             │
//! │            ├── state: role/status/counters   │
//! │            └── backend: Arc<dyn Provider>    │
//! │                 ├── PostgresProvider (sqlx)  │
//! │                 └── HttpSqlProvider (reqwest)│
//! └──────────────────────────────────────────────┘
//! ```

mod http;
mod managed;
mod postgres;
mod postgres_codec;
mod registry;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use http::HttpSqlProvider;
pub use managed::ManagedProvider;
pub use postgres::PostgresProvider;
pub use registry::ProviderRegistry;

use async_trait::async_trait;
use dbrouter_types::{ProviderError, QueryResult, SqlParam};

/// Statement used by the default liveness ping.
pub const PING_SQL: &str = "SELECT 1";

/// A single backing store.
///
/// Implementations must not retry internally; errors are returned as-is so the
/// router can decide whether to fall back.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique provider name.
    fn name(&self) -> &str;

    /// Short backend label for status output.
    fn backend(&self) -> &'static str;

    /// Run one statement with positional parameters.
    async fn run(&self, sql: &str, params: &[SqlParam]) -> Result<QueryResult, ProviderError>;

    /// Liveness ping.
    async fn ping(&self) -> Result<(), ProviderError> {
        self.run(PING_SQL, &[]).await.map(|_| ())
    }

    /// Release connections. Calls after this fail with `Disconnected`.
    async fn disconnect(&self);
}
