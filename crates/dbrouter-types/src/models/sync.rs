//! Replication queue models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::query::SqlParam;

/// Lifecycle of a queued replication retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

/// Where a replication attempt originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOrigin {
    /// Fan-out right after the master write
    Immediate,
    /// Periodic drain of the retry queue
    Queue,
}

impl SyncOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Queue => "queue",
        }
    }
}

/// A write that failed to replicate to one slave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueEntry {
    pub id: Uuid,
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub timestamp: DateTime<Utc>,
    pub status: SyncStatus,
    pub retry_count: u32,
    pub target_provider: String,
}

impl SyncQueueEntry {
    pub fn new(sql: String, params: Vec<SqlParam>, target_provider: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            sql,
            params,
            timestamp: Utc::now(),
            status: SyncStatus::Pending,
            retry_count: 0,
            target_provider,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == SyncStatus::Pending
    }
}

/// Queue counts reported by the status snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQueueStats {
    pub pending: usize,
    pub synced: usize,
    pub failed: usize,
    pub total: usize,
}

impl<'a> FromIterator<&'a SyncQueueEntry> for SyncQueueStats {
    fn from_iter<I: IntoIterator<Item = &'a SyncQueueEntry>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |mut stats, entry| {
            match entry.status {
                SyncStatus::Pending => stats.pending += 1,
                SyncStatus::Synced => stats.synced += 1,
                SyncStatus::Failed => stats.failed += 1,
            }
            stats.total += 1;
            stats
        })
    }
}
