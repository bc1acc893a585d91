//! Core domain models for dbrouter.

mod config;
mod event;
mod provider;
mod query;
mod status;
mod sync;

pub use config::{HealthConfig, ProviderKind, ProviderSettings, ReplicationConfig, RouterConfig};
pub use event::{RouterEvent, RouterEventType};
pub use provider::{ProviderRole, ProviderSnapshot, ProviderStatus};
pub use query::{QueryResult, Row, SqlParam};
pub use status::RouterStatus;
pub use sync::{SyncOrigin, SyncQueueEntry, SyncQueueStats, SyncStatus};
