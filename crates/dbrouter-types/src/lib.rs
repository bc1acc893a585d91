//! # dbrouter Types
//!
//! Core types, models, and error definitions for the dbrouter database router.
//!
//! - **`error`** - Typed error hierarchy for providers, routing and configuration
//! - **`models`** - Provider roles/statuses, query results, sync queue entries,
//!   lifecycle events, status snapshots and configuration structs
//!
//! ## Architecture Role
//!
//! `dbrouter-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!        dbrouter-types (this crate)
//!                │
//!                ▼
//!         dbrouter-core
//!                │
//!                ▼
//!        dbrouter-server
//! ```

pub mod error;
pub mod models;

pub use error::{ConfigError, ProviderError, Result, RouterError};

pub use models::{
    HealthConfig, ProviderKind, ProviderRole, ProviderSettings, ProviderSnapshot, ProviderStatus,
    QueryResult, ReplicationConfig, RouterConfig, RouterEvent, RouterEventType, RouterStatus, Row,
    SqlParam, SyncOrigin, SyncQueueEntry, SyncQueueStats, SyncStatus,
};
