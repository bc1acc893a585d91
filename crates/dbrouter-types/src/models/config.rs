//! Router configuration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use super::provider::ProviderRole;

/// Health monitor tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HealthConfig {
    /// Interval between polling passes (default: 30s)
    #[validate(range(min = 100_u64))]
    pub check_interval_ms: u64,
    /// Consecutive failures before a provider turns unhealthy (default: 3)
    #[validate(range(min = 1_u32))]
    pub failure_threshold: u32,
    /// Consecutive successes before a provider recovers (default: 2)
    #[validate(range(min = 1_u32))]
    pub recovery_threshold: u32,
    /// Deadline for a single ping (default: 5s)
    #[validate(range(min = 1_u64))]
    pub ping_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 30_000,
            failure_threshold: 3,
            recovery_threshold: 2,
            ping_timeout_ms: 5_000,
        }
    }
}

impl HealthConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

/// Replication retry queue tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Attempts before a queued entry is marked failed (default: 5)
    #[validate(range(min = 1_u32))]
    pub max_retries: u32,
    /// Interval between queue drains (default: 5s)
    #[validate(range(min = 10_u64))]
    pub retry_delay_ms: u64,
    /// Age after which settled entries are discarded (default: 1h)
    pub cleanup_age_ms: u64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self { max_retries: 5, retry_delay_ms: 5_000, cleanup_age_ms: 3_600_000 }
    }
}

impl ReplicationConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cleanup_age(&self) -> Duration {
        Duration::from_millis(self.cleanup_age_ms)
    }
}

/// Top-level router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RouterConfig {
    /// Reads are pinned to the master for this long after a write (default: 5s)
    pub sticky_read_ms: u64,
    /// Replicate master writes to slaves
    pub enable_sync: bool,
    /// Run the periodic health monitor
    pub enable_health_check: bool,
    #[validate(nested)]
    pub health: HealthConfig,
    #[validate(nested)]
    pub replication: ReplicationConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            sticky_read_ms: 5_000,
            enable_sync: true,
            enable_health_check: true,
            health: HealthConfig::default(),
            replication: ReplicationConfig::default(),
        }
    }
}

impl RouterConfig {
    pub fn sticky_read_duration(&self) -> Duration {
        Duration::from_millis(self.sticky_read_ms)
    }
}

/// Backend implementation for a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Pooled PostgreSQL connection
    #[default]
    Postgres,
    /// SQL-over-HTTP edge endpoint
    Http,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" | "pool" => Ok(Self::Postgres),
            "http" | "https" | "edge" | "serverless" => Ok(Self::Http),
            other => Err(format!("unknown provider kind '{other}' (expected postgres or http)")),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Postgres => write!(f, "postgres"),
            ProviderKind::Http => write!(f, "http"),
        }
    }
}

/// One configured backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub name: String,
    pub kind: ProviderKind,
    /// Connection URL / identifier
    #[serde(skip_serializing)]
    pub connection: String,
    pub role: ProviderRole,
    pub priority: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.sticky_read_duration(), Duration::from_secs(5));
        assert_eq!(config.health.check_interval(), Duration::from_secs(30));
        assert_eq!(config.health.failure_threshold, 3);
        assert_eq!(config.health.recovery_threshold, 2);
        assert_eq!(config.health.ping_timeout(), Duration::from_secs(5));
        assert_eq!(config.replication.max_retries, 5);
        assert_eq!(config.replication.cleanup_age(), Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config = RouterConfig {
            health: HealthConfig { failure_threshold: 0, ..Default::default() },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("postgres".parse::<ProviderKind>(), Ok(ProviderKind::Postgres));
        assert_eq!("HTTP".parse::<ProviderKind>(), Ok(ProviderKind::Http));
        assert!("mysql".parse::<ProviderKind>().is_err());
    }
}
