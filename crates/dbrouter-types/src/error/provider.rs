//! Provider-level errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a single backing store.
///
/// Providers never retry internally; these propagate to the router unchanged
/// after the provider's health counters are updated.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ProviderError {
    /// Store unreachable (network error, pool exhausted, TLS failure)
    #[error("Connection to {provider} failed: {message}")]
    Connection { provider: String, message: String },

    /// Store reachable but rejected the statement
    #[error("Query on {provider} failed: {message}")]
    Query { provider: String, message: String },

    /// Health ping exceeded its deadline
    #[error("Ping to {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    /// Result could not be converted into rows
    #[error("Failed to decode result from {provider}: {message}")]
    Decode { provider: String, message: String },

    /// Provider was disconnected during shutdown
    #[error("Provider {provider} is disconnected")]
    Disconnected { provider: String },
}

impl ProviderError {
    /// Name of the provider that produced the error.
    pub fn provider(&self) -> &str {
        match self {
            Self::Connection { provider, .. }
            | Self::Query { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Decode { provider, .. }
            | Self::Disconnected { provider } => provider,
        }
    }

    /// Whether the error indicates the store itself is unreachable.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. } | Self::Disconnected { .. })
    }
}
