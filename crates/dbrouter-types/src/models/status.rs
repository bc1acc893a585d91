use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::provider::ProviderSnapshot;
use super::sync::SyncQueueStats;

/// Operational snapshot returned by `DbRouter::status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterStatus {
    pub initialized: bool,
    /// Name of the provider currently holding the master role
    pub master: Option<String>,
    pub providers: BTreeMap<String, ProviderSnapshot>,
    pub sync_queue: SyncQueueStats,
    pub last_write_at: Option<DateTime<Utc>>,
}
