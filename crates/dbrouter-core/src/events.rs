//! Synchronous, ordered fan-out of router lifecycle events.

use dbrouter_types::RouterEvent;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Receives router lifecycle events.
///
/// Called on the emitting task; implementations must not block.
pub trait RouterEventListener: Send + Sync {
    fn on_event(&self, event: &RouterEvent);
}

impl<F> RouterEventListener for F
where
    F: Fn(&RouterEvent) + Send + Sync,
{
    fn on_event(&self, event: &RouterEvent) {
        self(event);
    }
}

/// Ordered listener list. A panicking listener is logged and skipped; the
/// remaining listeners still receive the event.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn RouterEventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn RouterEventListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn emit(&self, event: &RouterEvent) {
        // Snapshot so listeners may register further listeners without deadlocking.
        let listeners = self.listeners.read().clone();

        tracing::debug!(
            event = %event.event_type,
            provider = %event.provider,
            listeners = listeners.len(),
            "Emitting router event"
        );

        for listener in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if outcome.is_err() {
                tracing::warn!(
                    event = %event.event_type,
                    provider = %event.provider,
                    "Event listener panicked; continuing with remaining listeners"
                );
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("listeners", &self.listener_count()).finish()
    }
}
