//! Pipeline configuration

use std::time::Duration;

/// Default quiet period before a changed value is validated.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Configuration for a [`ValidationPipeline`](crate::ValidationPipeline).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use rulepass::PipelineConfig;
///
/// let config = PipelineConfig::default().with_debounce(Duration::from_millis(250));
/// assert_eq!(config.debounce, Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// How long the input must stay quiet before a pass starts.
    ///
    /// Default: 500ms
    pub debounce: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl PipelineConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the debounce interval.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Creates a config that validates every value as soon as it arrives.
    pub fn immediate() -> Self {
        Self {
            debounce: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_debounce() {
        assert_eq!(PipelineConfig::new().debounce, Duration::from_millis(500));
    }

    #[test]
    fn test_immediate_has_no_debounce() {
        assert_eq!(PipelineConfig::immediate().debounce, Duration::ZERO);
    }
}
