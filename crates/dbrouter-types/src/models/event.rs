//! Lifecycle events delivered to router listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouterEventType {
    #[serde(rename = "provider:healthy")]
    ProviderHealthy,
    #[serde(rename = "provider:unhealthy")]
    ProviderUnhealthy,
    #[serde(rename = "provider:promoted")]
    ProviderPromoted,
    #[serde(rename = "provider:demoted")]
    ProviderDemoted,
    #[serde(rename = "sync:success")]
    SyncSuccess,
    #[serde(rename = "sync:failed")]
    SyncFailed,
    #[serde(rename = "router:failover")]
    RouterFailover,
}

impl RouterEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderHealthy => "provider:healthy",
            Self::ProviderUnhealthy => "provider:unhealthy",
            Self::ProviderPromoted => "provider:promoted",
            Self::ProviderDemoted => "provider:demoted",
            Self::SyncSuccess => "sync:success",
            Self::SyncFailed => "sync:failed",
            Self::RouterFailover => "router:failover",
        }
    }

    /// `provider:*` events: a role or status changed.
    pub fn is_provider_event(&self) -> bool {
        matches!(
            self,
            Self::ProviderHealthy
                | Self::ProviderUnhealthy
                | Self::ProviderPromoted
                | Self::ProviderDemoted
        )
    }
}

impl std::fmt::Display for RouterEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterEvent {
    #[serde(rename = "type")]
    pub event_type: RouterEventType,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RouterEvent {
    pub fn new(event_type: RouterEventType, provider: impl Into<String>) -> Self {
        Self { event_type, provider: provider.into(), timestamp: Utc::now(), details: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
