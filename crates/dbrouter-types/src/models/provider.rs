//! Provider role, status and snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a provider in the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRole {
    /// Receives all writes
    Master,
    /// Read-eligible, receives replicated writes
    Slave,
}

impl std::fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderRole::Master => write!(f, "master"),
            ProviderRole::Slave => write!(f, "slave"),
        }
    }
}

/// Health status of a provider, driven only by the health monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Not yet checked
    #[default]
    Unknown,
    /// Passed its most recent transition check
    Healthy,
    /// Crossed the consecutive failure threshold
    Unhealthy,
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderStatus::Unknown => write!(f, "unknown"),
            ProviderStatus::Healthy => write!(f, "healthy"),
            ProviderStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Point-in-time view of one provider, for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub name: String,
    /// Backend kind ("postgres", "http", ...)
    pub backend: String,
    pub role: ProviderRole,
    pub status: ProviderStatus,
    pub priority: i32,
    /// Last observed round trip; `None` until first measurement
    pub latency_ms: Option<f64>,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_check_at: Option<DateTime<Utc>>,
}
