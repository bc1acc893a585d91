//! Provider Health Monitoring Module
//!
//! Periodically pings every registered provider and evolves its status:
//! - `unknown → healthy` on the first successful ping
//! - `→ healthy` after `recovery_threshold` consecutive successes
//! - `→ unhealthy` after `failure_threshold` consecutive failures
//!
//! After each pass, failover evaluation promotes the best healthy slave when
//! the master is unhealthy, and hands the role back to the boot-time master
//! once it is healthy again.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  HealthMonitor                                               │
//! │  ├── registry: Arc<ProviderRegistry>                         │
//! │  ├── poll task: interval → check_all → evaluate_failover     │
//! │  ├── events: EventBus (provider:*, router:failover)          │
//! │  └── config: HealthConfig                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod monitor;

#[cfg(test)]
mod tests;

pub use monitor::HealthMonitor;
