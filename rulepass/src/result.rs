//! The record handed to a result sink, and the builder that produces it.

use serde::Serialize;

use crate::error::RuleError;
use crate::rule::Outcome;

/// What the result sink is told about the current value.
///
/// `valid` is `None` while the answer is unknown (the value just changed, or
/// rules are still running). `show_validation` is only `false` for the
/// transient "value just changed" notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult<E = String> {
    /// `Some(true)` valid, `Some(false)` invalid, `None` unknown.
    pub valid: Option<bool>,
    /// The reported failure when invalid.
    pub error: Option<RuleError<E>>,
    /// Whether feedback should be shown to the user.
    pub show_validation: bool,
}

impl<E> ValidationResult<E> {
    /// Build a result from its parts.
    pub fn build(valid: Option<bool>, error: Option<RuleError<E>>, show_validation: bool) -> Self {
        Self {
            valid,
            error,
            show_validation,
        }
    }

    /// The value just changed; hide feedback until rules start.
    pub fn changed() -> Self {
        Self::build(None, None, false)
    }

    /// Rules are running for the current value.
    pub fn checking() -> Self {
        Self::build(None, None, true)
    }

    /// Final result of a pass.
    pub fn from_outcome(outcome: Outcome<E>) -> Self {
        match outcome {
            Ok(()) => Self::build(Some(true), None, true),
            Err(error) => Self::build(Some(false), Some(error), true),
        }
    }

    /// Check if the value is known to be valid.
    pub fn is_valid(&self) -> bool {
        self.valid == Some(true)
    }

    /// Check if the value is known to be invalid.
    pub fn is_invalid(&self) -> bool {
        self.valid == Some(false)
    }

    /// Check if the answer is still unknown.
    pub fn is_pending(&self) -> bool {
        self.valid.is_none()
    }

    /// The declared failure, if the value was rejected by a rule (rather than
    /// by a panicking one).
    pub fn failure(&self) -> Option<&E> {
        self.error.as_ref().and_then(RuleError::as_failed)
    }
}
