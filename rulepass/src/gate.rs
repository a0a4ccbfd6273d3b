//! Pass generations and stale-result suppression.

use std::sync::{Mutex, MutexGuard};

/// Lifecycle of the most recent pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassState {
    /// No pass is running: nothing arrived yet, or a new value is waiting
    /// out the quiet period.
    #[default]
    Idle,
    /// Rules are running for the current value.
    AwaitingRules,
    /// The current pass delivered its result.
    Resolved,
}

/// Identifies one generation of input. Only the newest ticket may deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PassTicket(u64);

impl PassTicket {
    /// The generation number.
    pub fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
struct GateInner {
    generation: u64,
    state: PassState,
}

/// Monotonic generation counter guarding delivery to the result sink.
///
/// Each new value [`supersede`](Self::supersede)s everything before it.
/// Transitions check their ticket and run under the same lock, so a stale
/// pass can never produce a notification after a newer value has.
#[derive(Debug, Default)]
pub struct PassGate {
    inner: Mutex<GateInner>,
}

impl PassGate {
    /// Create a gate at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a new generation, invalidating every earlier ticket.
    pub fn supersede(&self) -> PassTicket {
        self.supersede_with(|ticket| ticket)
    }

    /// Start a new generation and run `f` with its ticket before any other
    /// generation can start or deliver.
    pub fn supersede_with<T>(&self, f: impl FnOnce(PassTicket) -> T) -> T {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.state = PassState::Idle;
        f(PassTicket(inner.generation))
    }

    /// State of the newest pass.
    pub fn state(&self) -> PassState {
        self.lock().state
    }

    /// Mark the pass for `ticket` as running and run `announce`.
    ///
    /// Returns `false` without running anything if the ticket is stale.
    pub fn begin(&self, ticket: PassTicket, announce: impl FnOnce()) -> bool {
        self.transition(ticket, PassState::AwaitingRules, announce)
    }

    /// Mark the pass for `ticket` as resolved and run `deliver`.
    ///
    /// Returns `false` without running anything if the ticket is stale.
    pub fn finish(&self, ticket: PassTicket, deliver: impl FnOnce()) -> bool {
        self.transition(ticket, PassState::Resolved, deliver)
    }

    fn transition(&self, ticket: PassTicket, next: PassState, f: impl FnOnce()) -> bool {
        let mut inner = self.lock();
        if inner.generation != ticket.0 {
            return false;
        }
        inner.state = next;
        f();
        true
    }
}
