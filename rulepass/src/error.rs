//! Error types for rule outcomes and the pipeline.

use std::any::Any;

use serde::Serialize;
use thiserror::Error;

/// Why a rule rejected a value.
///
/// Both variants are decisive failures: the resolver ranks a fault exactly
/// like a declared failure at the same position.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RuleError<E> {
    /// The rule judged the value and rejected it.
    #[error("{0}")]
    Failed(E),

    /// The rule panicked while being invoked or polled.
    #[error("rule panicked: {message}")]
    Fault {
        /// Panic message extracted from the panic payload.
        message: String,
    },
}

impl<E> RuleError<E> {
    /// Returns the declared failure, if this is one.
    pub fn as_failed(&self) -> Option<&E> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Fault { .. } => None,
        }
    }

    /// Check if the rule panicked rather than rejecting the value.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault { .. })
    }
}

/// Errors surfaced by [`ValidationPipeline`](crate::ValidationPipeline) and
/// rule construction.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline was shut down and no longer accepts values.
    #[error("validation pipeline is closed")]
    Closed,

    /// A pattern rule was given an invalid regular expression.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Text of a caught panic payload, for [`RuleError::Fault`].
///
/// `panic!` payloads are a `&str` or a `String`; any other payload is reported
/// by a fixed placeholder.
pub fn extract_panic_message(payload: &(dyn Any + Send)) -> String {
    match (payload.downcast_ref::<&str>(), payload.downcast_ref::<String>()) {
        (Some(message), _) => (*message).to_owned(),
        (None, Some(message)) => message.clone(),
        (None, None) => "non-string panic payload".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_from_payloads() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        let formatted: Box<dyn Any + Send> = Box::new(format!("late {}", 1));
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(extract_panic_message(&*literal), "boom");
        assert_eq!(extract_panic_message(&*formatted), "late 1");
        assert_eq!(extract_panic_message(&*other), "non-string panic payload");
    }

    #[test]
    fn test_fault_and_failure_are_distinguishable() {
        let failed: RuleError<String> = RuleError::Failed("too short".to_string());
        let fault: RuleError<String> = RuleError::Fault {
            message: "boom".to_string(),
        };

        assert_eq!(failed.as_failed().map(String::as_str), Some("too short"));
        assert!(!failed.is_fault());
        assert_eq!(fault.as_failed(), None);
        assert!(fault.is_fault());
        assert_eq!(fault.to_string(), "rule panicked: boom");
    }
}
