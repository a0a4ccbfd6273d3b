//! Ordered asynchronous validation of a single value.
//!
//! A value is judged by an ordered list of rules that all run concurrently.
//! The reported result is the outcome of the first rule, in list order,
//! whose settlement is decisive: a later rule that fails early never
//! preempts an earlier rule that is still running, and once an earlier rule
//! fails nobody waits for the rules after it.
//!
//! - [`Rule`] / [`RuleList`]: sync or async judgements, plus string built-ins.
//! - [`evaluate`]: one rule against one value, panics folded into the outcome.
//! - [`SequentialResolver`]: the priority resolution over a whole list.
//! - [`ValidationPipeline`]: debounced, latest-wins validation of a value
//!   stream, reporting [`ValidationResult`]s to a [`ResultSink`].

pub mod builtin;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod pipeline;
pub mod resolver;
pub mod result;
pub mod rule;
pub mod sink;

pub use config::PipelineConfig;
pub use error::{PipelineError, RuleError};
pub use evaluator::{Evaluation, evaluate};
pub use gate::{PassGate, PassState, PassTicket};
pub use pipeline::{PipelineInput, ValidationPipeline};
pub use resolver::{EvaluationState, SequentialResolver, Settlements};
pub use result::ValidationResult;
pub use rule::{Outcome, Rule, RuleList, RuleOutput};
pub use sink::ResultSink;

pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::error::{PipelineError, RuleError};
    pub use crate::pipeline::ValidationPipeline;
    pub use crate::result::ValidationResult;
    pub use crate::rule::{Rule, RuleList};
    pub use crate::sink::ResultSink;
}
