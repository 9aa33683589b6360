use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use log::debug;

use super::{EventBus, EventHandler, SubscriptionId};
use crate::flow::JobEvent;

/// In-process event bus. Whatever feeds events in (an SSE pump, a test)
/// calls [`LocalEventBus::publish`].
#[derive(Default)]
pub struct LocalEventBus {
    next_id: AtomicU64,
    handlers: Mutex<IndexMap<u64, Arc<EventHandler>>>,
}

impl LocalEventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delivers `event` to every registered handler in registration order.
    pub fn publish(&self, event: &JobEvent) {
        // Handlers run outside the lock so they may (un)register themselves.
        let handlers: Vec<Arc<EventHandler>> = self.handlers().values().cloned().collect();

        debug!("Publishing event to {} handlers", handlers.len());
        for handler in handlers {
            handler(event.clone());
        }
    }

    #[cfg(test)]
    pub fn handler_count(&self) -> usize {
        self.handlers().len()
    }

    fn handlers(&self) -> MutexGuard<'_, IndexMap<u64, Arc<EventHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventBus for LocalEventBus {
    fn register_handler(&self, handler: EventHandler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers().insert(id, Arc::new(handler));
        debug!("Registered event handler {id}");
        SubscriptionId(id)
    }

    fn remove_handler(&self, id: SubscriptionId) {
        let removed = self.handlers().shift_remove(&id.0);
        if removed.is_some() {
            debug!("Removed event handler {}", id.0);
        }
    }
}
