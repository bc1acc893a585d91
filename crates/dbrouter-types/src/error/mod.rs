//! Typed error definitions for dbrouter.
//!
//! - **`ProviderError`** - a single backing store failed (connectivity, query, timeout)
//! - **`RouterError`** - what callers of the router see
//! - **`ConfigError`** - invalid or missing configuration, raised at construction time

mod config;
mod provider;
mod router;

pub use config::ConfigError;
pub use provider::ProviderError;
pub use router::RouterError;

/// Standard Result type for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
