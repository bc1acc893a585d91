//! # dbrouter Core
//!
//! Health-aware read/write routing over two (or more) PostgreSQL-compatible
//! stores, with automatic failover and best-effort replication.
//!
//! ## Layout
//!
//! ```text
//! dbrouter-core/src/
//! ├── provider/      # Provider trait, ManagedProvider, registry, sqlx + HTTP backends
//! ├── health/        # HealthMonitor: pings, status transitions, failover
//! ├── replication/   # ReplicationEngine: fan-out + bounded retry queue
//! ├── router/        # DbRouter: read/write split, sticky reads, event forwarding
//! ├── events.rs      # Ordered, panic-isolated listener fan-out
//! ├── config.rs      # DB_* environment configuration
//! └── metrics.rs     # `metrics` facade counters
//! ```
//!
//! ## Example
//!
//! ```no_run
//! # async fn run() -> Result<(), dbrouter_core::types::RouterError> {
//! use serde_json::json;
//!
//! let router = dbrouter_core::DbRouter::from_env()?;
//! let posts = router
//!     .query("SELECT id, title FROM posts WHERE author_id = $1", &[json!(7)])
//!     .await?;
//! router
//!     .execute("UPDATE posts SET views = views + 1 WHERE id = $1", &[json!(1)])
//!     .await?;
//! # let _ = posts;
//! # Ok(())
//! # }
//! ```

#![allow(
    clippy::significant_drop_tightening,
    reason = "parking_lot guards are scoped to single statements; never held across .await"
)]
// Test-only lints: allow panic!, unwrap, etc. in test code
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::float_cmp))]

pub mod config;
pub mod events;
pub mod health;
pub mod metrics;
pub mod provider;
pub mod replication;
pub mod router;

pub use events::{EventBus, RouterEventListener};
pub use health::HealthMonitor;
pub use provider::{
    HttpSqlProvider, ManagedProvider, PostgresProvider, Provider, ProviderRegistry,
};
pub use replication::ReplicationEngine;
pub use router::{DbRouter, DbRouterBuilder};

pub use dbrouter_types as types;
