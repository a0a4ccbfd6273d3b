//! Reactive validation pipeline.
//!
//! Raw values come in through [`ValidationPipeline::push`] (or an attached
//! stream). Every value immediately supersedes whatever was in flight and
//! tells the sink the value changed. Once the input stays quiet for the
//! debounce interval, a pass runs the rules against the latest value and
//! its result is delivered, unless yet another value arrived meanwhile.
//!
//! ```text
//!  push ──> changed ──> (quiet period) ──> checking ──> valid / invalid
//!    ^                                                        |
//!    └──────────── any push here drops the stale result ──────┘
//! ```

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::gate::{PassGate, PassState, PassTicket};
use crate::resolver::SequentialResolver;
use crate::result::ValidationResult;
use crate::rule::RuleList;
use crate::sink::{Outbox, ResultSink};

struct Shared<V, E> {
    resolver: SequentialResolver<V, E>,
    sink: Box<dyn ResultSink<E>>,
    outbox: Outbox<E>,
    gate: PassGate,
}

impl<V, E> Shared<V, E> {
    /// Hand queued notifications to the sink. Never called with the gate held.
    fn flush(&self) {
        self.outbox.flush(self.sink.as_ref());
    }
}

/// A value waiting out the quiet period, tagged with its generation.
struct Submitted<V> {
    ticket: PassTicket,
    value: V,
}

// =============================================================================
// PipelineInput
// =============================================================================

/// Cloneable handle for feeding raw values into a pipeline.
///
/// Hand this to whatever produces input events. It stops accepting values
/// once the pipeline is torn down.
pub struct PipelineInput<V, E = String> {
    shared: Arc<Shared<V, E>>,
    tx: mpsc::UnboundedSender<Submitted<V>>,
    cancel: CancellationToken,
}

impl<V, E> PipelineInput<V, E> {
    /// Feed a new raw value.
    ///
    /// Supersedes any pass in flight, queues the value for the debounce
    /// driver and notifies the sink with [`ValidationResult::changed`] before
    /// returning. If the sink is busy with another notification (another
    /// producer, or a push from inside the sink), `changed` is delivered
    /// right after it instead.
    ///
    /// Safe to call from several clones at once: values reach the driver in
    /// generation order, so the newest push always gets a pass.
    pub fn push(&self, value: V) -> Result<(), PipelineError> {
        if self.is_closed() {
            return Err(PipelineError::Closed);
        }

        let shared = &self.shared;
        let queued = shared.gate.supersede_with(|ticket| {
            log::trace!("value changed, generation {}", ticket.generation());
            if self.tx.send(Submitted { ticket, value }).is_err() {
                return false;
            }
            shared.outbox.post(ValidationResult::changed());
            true
        });
        shared.flush();

        if queued {
            Ok(())
        } else {
            Err(PipelineError::Closed)
        }
    }

    /// Check if the pipeline was torn down.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

impl<V, E> Clone for PipelineInput<V, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// An attached value stream. Dropping it stops the forwarding task.
struct Subscription {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

// =============================================================================
// ValidationPipeline
// =============================================================================

/// Validates a stream of values against a fixed rule list, delivering only
/// the newest value's result to a [`ResultSink`].
///
/// Owns its background tasks: dropping the pipeline (or calling
/// [`shutdown`](Self::shutdown)) stops the debounce driver, the pass in
/// flight and any attached stream, and nothing reaches the sink afterwards.
///
/// # Example
///
/// ```
/// use rulepass::{PipelineConfig, Rule, ValidationPipeline, sink};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (sink, mut results) = sink::channel();
/// let pipeline: ValidationPipeline<String> = ValidationPipeline::spawn(
///     vec![Rule::required("required"), Rule::min_length(3, "too short")],
///     sink,
///     PipelineConfig::immediate(),
/// );
///
/// pipeline.push("ab".to_string()).unwrap();
/// assert!(results.recv().await.unwrap().is_pending()); // changed
/// assert!(results.recv().await.unwrap().is_pending()); // checking
/// let result = results.recv().await.unwrap();
/// assert_eq!(result.failure().map(String::as_str), Some("too short"));
/// # }
/// ```
pub struct ValidationPipeline<V, E = String> {
    input: PipelineInput<V, E>,
    config: PipelineConfig,
    cancel: CancellationToken,
    driver: Option<JoinHandle<()>>,
    subscription: Option<Subscription>,
}

impl<V, E> ValidationPipeline<V, E>
where
    V: Send + Sync + 'static,
    E: Send + 'static,
{
    /// Start a pipeline on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn spawn(
        rules: impl Into<RuleList<V, E>>,
        sink: impl ResultSink<E> + 'static,
        config: PipelineConfig,
    ) -> Self {
        Self::start(rules.into(), Box::new(sink), config, None)
    }

    /// Start a pipeline and validate `initial` right away, without waiting
    /// for the quiet period.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn spawn_with_initial(
        rules: impl Into<RuleList<V, E>>,
        sink: impl ResultSink<E> + 'static,
        config: PipelineConfig,
        initial: V,
    ) -> Self {
        Self::start(rules.into(), Box::new(sink), config, Some(initial))
    }

    fn start(
        rules: RuleList<V, E>,
        sink: Box<dyn ResultSink<E>>,
        config: PipelineConfig,
        initial: Option<V>,
    ) -> Self {
        let shared = Arc::new(Shared {
            resolver: SequentialResolver::new(rules),
            sink,
            outbox: Outbox::new(),
            gate: PassGate::new(),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let initial = initial.map(|value| Submitted {
            ticket: shared.gate.supersede(),
            value,
        });

        log::debug!(
            "starting validation pipeline with {} rules, debounce {:?}",
            shared.resolver.rules().len(),
            config.debounce
        );
        let driver = tokio::spawn(drive(
            Arc::clone(&shared),
            rx,
            config.debounce,
            cancel.clone(),
            initial,
        ));

        Self {
            input: PipelineInput {
                shared,
                tx,
                cancel: cancel.clone(),
            },
            config,
            cancel,
            driver: Some(driver),
            subscription: None,
        }
    }

    /// Subscribe a value stream. Each item is pushed as a raw value.
    ///
    /// The pipeline owns at most one subscription; attaching a new stream
    /// releases the previous one.
    pub fn attach<S>(&mut self, stream: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = V> + Send + 'static,
    {
        if self.input.is_closed() {
            return Err(PipelineError::Closed);
        }

        let input = self.input.clone();
        let token = self.cancel.child_token();
        let stop = token.clone();
        let handle = tokio::spawn(async move {
            let mut stream = pin!(stream);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    next = stream.next() => match next {
                        Some(value) => {
                            if input.push(value).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            log::trace!("value stream subscription ended");
        });

        if self
            .subscription
            .replace(Subscription { token, handle })
            .is_some()
        {
            log::debug!("replaced value stream subscription");
        }
        Ok(())
    }

    /// Release the attached value stream, if any.
    pub fn detach(&mut self) {
        self.subscription = None;
    }

    /// Check if a value stream is attached and still forwarding.
    pub fn is_attached(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|subscription| !subscription.handle.is_finished())
    }
}

impl<V, E> ValidationPipeline<V, E> {
    /// Feed a new raw value. See [`PipelineInput::push`].
    pub fn push(&self, value: V) -> Result<(), PipelineError> {
        self.input.push(value)
    }

    /// A cloneable handle for feeding values from elsewhere.
    pub fn input(&self) -> PipelineInput<V, E> {
        self.input.clone()
    }

    /// State of the newest pass.
    pub fn state(&self) -> PassState {
        self.input.shared.gate.state()
    }

    /// The configuration this pipeline was started with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stop the pipeline and wait for its driver to exit.
    pub async fn shutdown(mut self) {
        self.teardown();
        let Some(driver) = self.driver.take() else {
            return;
        };
        if let Err(e) = driver.await {
            log::warn!("validation driver ended abnormally: {}", e);
        }
    }

    fn teardown(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.subscription = None;
        self.cancel.cancel();
        // Invalidate the last ticket so a pass racing the cancellation
        // cannot deliver, and drop whatever has not reached the sink yet.
        let shared = &self.input.shared;
        shared.gate.supersede_with(|_| shared.outbox.clear());
        log::debug!("validation pipeline torn down");
    }
}

impl<V, E> Drop for ValidationPipeline<V, E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<V, E> std::fmt::Debug for ValidationPipeline<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("attached", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Debounce loop. Owns the receiving end of the value channel and the
/// cancellation token of the pass in flight.
async fn drive<V, E>(
    shared: Arc<Shared<V, E>>,
    mut rx: mpsc::UnboundedReceiver<Submitted<V>>,
    debounce: Duration,
    cancel: CancellationToken,
    initial: Option<Submitted<V>>,
) where
    V: Send + Sync + 'static,
    E: Send + 'static,
{
    let mut in_flight: Option<CancellationToken> = None;
    if let Some(submitted) = initial {
        in_flight = start_pass(&shared, submitted, &cancel);
    }

    let mut waiting: Option<Submitted<V>> = None;
    loop {
        let next = match waiting.take() {
            None => tokio::select! {
                _ = cancel.cancelled() => break,
                next = rx.recv() => next,
            },
            Some(submitted) => tokio::select! {
                _ = cancel.cancelled() => break,
                next = rx.recv() => next,
                _ = tokio::time::sleep(debounce) => {
                    let started = start_pass(&shared, submitted, &cancel);
                    if let Some(previous) = std::mem::replace(&mut in_flight, started) {
                        previous.cancel();
                    }
                    continue;
                }
            },
        };

        match next {
            // A newer value restarts the quiet period and replaces the old one.
            Some(submitted) => waiting = Some(submitted),
            None => break,
        }
    }

    if let Some(pass) = in_flight {
        pass.cancel();
    }
    log::debug!("validation driver stopped");
}

/// Announce and spawn a pass for `submitted`.
///
/// Returns the pass's cancellation token, or `None` if a newer value
/// superseded it before it could start.
fn start_pass<V, E>(
    shared: &Arc<Shared<V, E>>,
    submitted: Submitted<V>,
    parent: &CancellationToken,
) -> Option<CancellationToken>
where
    V: Send + Sync + 'static,
    E: Send + 'static,
{
    let Submitted { ticket, value } = submitted;
    let generation = ticket.generation();

    let announced = shared.gate.begin(ticket, || {
        shared.outbox.post(ValidationResult::checking());
    });
    shared.flush();
    if !announced {
        log::trace!("pass {} superseded before it started", generation);
        return None;
    }

    log::debug!("starting pass {}", generation);
    let resolution = shared.resolver.resolve(&value);
    let token = parent.child_token();
    let stop = token.clone();
    let shared = Arc::clone(shared);

    tokio::spawn(async move {
        tokio::select! {
            _ = stop.cancelled() => {
                log::trace!("pass {} cancelled", generation);
            }
            outcome = resolution => {
                let result = ValidationResult::from_outcome(outcome);
                let valid = result.is_valid();
                let delivered = shared.gate.finish(ticket, || shared.outbox.post(result));
                shared.flush();
                if delivered {
                    log::debug!("pass {} resolved, valid: {}", generation, valid);
                } else {
                    log::trace!("dropping stale result of pass {}", generation);
                }
            }
        }
    });

    Some(token)
}
