use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::types::JobEvent;
use crate::providers::{EventBus, SubscriptionId};

/// Lifecycle of the post-save completion listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    Idle,
    Armed,
    Resolved,
    TimedOut,
}

#[derive(Debug)]
pub enum CompletionSignal {
    Event(JobEvent),
    TimedOut,
}

/// An event-bus subscription paired with its timeout timer.
///
/// Both are created by [`CompletionWatch::arm`] and released together when
/// the watch is dropped, so one can never outlive the other.
pub struct CompletionWatch {
    bus: Arc<dyn EventBus>,
    subscription: SubscriptionId,
    timer: JoinHandle<()>,
    signals: mpsc::UnboundedReceiver<CompletionSignal>,
}

impl CompletionWatch {
    /// Subscribes to `bus` and starts a `timeout` timer. Must run inside a
    /// tokio runtime.
    pub fn arm(bus: Arc<dyn EventBus>, timeout: Duration) -> Self {
        let (tx, signals) = mpsc::unbounded_channel();

        let events = tx.clone();
        let subscription = bus.register_handler(Box::new(move |event| {
            let _ = events.send(CompletionSignal::Event(event));
        }));

        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(CompletionSignal::TimedOut);
        });

        debug!(
            "Completion watch armed (subscription {}, timeout {:?})",
            subscription.0, timeout
        );

        Self {
            bus,
            subscription,
            timer,
            signals,
        }
    }

    /// Next event or timeout. `None` once every sender is gone.
    pub async fn next_signal(&mut self) -> Option<CompletionSignal> {
        self.signals.recv().await
    }

    /// Already-delivered signal, if any, without waiting.
    pub fn try_next_signal(&mut self) -> Option<CompletionSignal> {
        self.signals.try_recv().ok()
    }
}

impl Drop for CompletionWatch {
    fn drop(&mut self) {
        self.bus.remove_handler(self.subscription);
        self.timer.abort();
        debug!("Completion watch disarmed (subscription {})", self.subscription.0);
    }
}
