//! Receivers for validation results.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::result::ValidationResult;

/// Receives validation results for display.
///
/// Notifications arrive one at a time and in the order they were produced.
/// No pipeline lock is held during the call, so a sink may push a new value
/// into the same pipeline; that value's notifications are delivered after
/// the current callback returns.
pub trait ResultSink<E>: Send + Sync {
    /// Called once per notification.
    fn on_validation(&self, result: ValidationResult<E>);
}

impl<E, F> ResultSink<E> for F
where
    F: Fn(ValidationResult<E>) + Send + Sync,
{
    fn on_validation(&self, result: ValidationResult<E>) {
        self(result)
    }
}

/// Sink that forwards every result into an unbounded channel.
#[derive(Debug)]
pub struct ChannelSink<E> {
    tx: mpsc::UnboundedSender<ValidationResult<E>>,
}

impl<E: Send> ResultSink<E> for ChannelSink<E> {
    fn on_validation(&self, result: ValidationResult<E>) {
        // Receiver dropped = nobody is listening anymore.
        let _ = self.tx.send(result);
    }
}

/// Create a channel-backed sink and the receiver that observes it.
pub fn channel<E>() -> (ChannelSink<E>, mpsc::UnboundedReceiver<ValidationResult<E>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx }, rx)
}

// =============================================================================
// Outbox
// =============================================================================

struct OutboxInner<E> {
    queue: VecDeque<ValidationResult<E>>,
    draining: bool,
}

/// Ordered hand-off between whoever produces a notification and the sink.
///
/// Notifications are posted while the pass gate is held, which fixes their
/// order, and delivered by [`flush`](Self::flush) after it is released. At
/// most one caller drains at a time; a flush that finds a drain in progress
/// leaves its notifications to that drain.
pub(crate) struct Outbox<E> {
    inner: Mutex<OutboxInner<E>>,
}

impl<E> Outbox<E> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(OutboxInner {
                queue: VecDeque::new(),
                draining: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, OutboxInner<E>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a notification behind everything posted before it.
    pub(crate) fn post(&self, result: ValidationResult<E>) {
        self.lock().queue.push_back(result);
    }

    /// Drop every notification not yet delivered.
    pub(crate) fn clear(&self) {
        self.lock().queue.clear();
    }

    /// Deliver queued notifications to `sink` until the queue is empty.
    pub(crate) fn flush(&self, sink: &dyn ResultSink<E>) {
        {
            let mut inner = self.lock();
            if inner.draining {
                return;
            }
            inner.draining = true;
        }
        let _drain = DrainGuard(self);

        loop {
            let Some(result) = self.lock().queue.pop_front() else {
                return;
            };
            sink.on_validation(result);
        }
    }
}

/// Releases the drain flag even if the sink panics.
struct DrainGuard<'a, E>(&'a Outbox<E>);

impl<E> Drop for DrainGuard<'_, E> {
    fn drop(&mut self) {
        self.0.lock().draining = false;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_flush_delivers_in_post_order() {
        let outbox = Outbox::new();
        let (sink, mut rx) = channel::<String>();

        outbox.post(ValidationResult::changed());
        outbox.post(ValidationResult::checking());
        outbox.flush(&sink);

        assert_eq!(rx.try_recv().ok(), Some(ValidationResult::changed()));
        assert_eq!(rx.try_recv().ok(), Some(ValidationResult::checking()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_nested_flush_defers_to_outer_drain() {
        let outbox: Arc<Outbox<String>> = Arc::new(Outbox::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (nested, mut nested_rx) = channel::<String>();

        let inner_outbox = Arc::clone(&outbox);
        let recorder = Arc::clone(&seen);
        let sink = move |result: ValidationResult<String>| {
            let first = recorder.lock().unwrap().is_empty();
            recorder.lock().unwrap().push(result);
            if first {
                inner_outbox.post(ValidationResult::checking());
                // Already draining, so this returns without delivering.
                inner_outbox.flush(&nested);
            }
        };

        outbox.post(ValidationResult::changed());
        outbox.flush(&sink);

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![ValidationResult::changed(), ValidationResult::checking()]);
        assert!(nested_rx.try_recv().is_err());
    }

    #[test]
    fn test_clear_drops_undelivered() {
        let outbox = Outbox::new();
        let (sink, mut rx) = channel::<String>();

        outbox.post(ValidationResult::changed());
        outbox.clear();
        outbox.flush(&sink);
        assert!(rx.try_recv().is_err());
    }
}
