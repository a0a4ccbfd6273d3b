//! Built-in rules for string values.

use crate::error::PipelineError;
use crate::rule::Rule;

impl<E> Rule<String, E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Require the value to be non-empty (after trimming whitespace).
    pub fn required(err: impl Into<E>) -> Self {
        Self::check(|v: &String| !v.trim().is_empty(), err)
    }

    /// Require minimum length (in characters).
    pub fn min_length(min: usize, err: impl Into<E>) -> Self {
        Self::check(move |v: &String| v.chars().count() >= min, err)
    }

    /// Require maximum length (in characters).
    pub fn max_length(max: usize, err: impl Into<E>) -> Self {
        Self::check(move |v: &String| v.chars().count() <= max, err)
    }

    /// Require the value to match a regex pattern.
    pub fn pattern(pattern: &str, err: impl Into<E>) -> Result<Self, PipelineError> {
        let re = regex::Regex::new(pattern)?;
        Ok(Self::check(move |v: &String| re.is_match(v), err))
    }

    /// Require a valid email address. Empty is valid; pair with
    /// [`required`](Self::required) to reject it.
    pub fn email(err: impl Into<E>) -> Self {
        Self::check(
            |v: &String| v.is_empty() || email_address::EmailAddress::is_valid(v),
            err,
        )
    }

    /// Require the value to equal `other`.
    pub fn equals(other: impl Into<String>, err: impl Into<E>) -> Self {
        let other = other.into();
        Self::check(move |v: &String| *v == other, err)
    }

    /// Require the value to contain a substring.
    pub fn contains(substr: impl Into<String>, err: impl Into<E>) -> Self {
        let substr = substr.into();
        Self::check(move |v: &String| v.contains(&substr), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use crate::rule::RuleOutput;

    fn judge(rule: &Rule<String>, value: &str) -> Result<(), String> {
        match rule.invoke(&value.to_string()) {
            RuleOutput::Ready(Ok(())) => Ok(()),
            RuleOutput::Ready(Err(RuleError::Failed(msg))) => Err(msg),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_required_trims_whitespace() {
        let rule = Rule::required("required");
        assert_eq!(judge(&rule, "   "), Err("required".to_string()));
        assert_eq!(judge(&rule, " a "), Ok(()));
    }

    #[test]
    fn test_length_counts_characters() {
        let min = Rule::min_length(3, "too short");
        let max = Rule::max_length(3, "too long");
        assert_eq!(judge(&min, "日本語"), Ok(()));
        assert_eq!(judge(&min, "ab"), Err("too short".to_string()));
        assert_eq!(judge(&max, "日本語"), Ok(()));
        assert_eq!(judge(&max, "abcd"), Err("too long".to_string()));
    }

    #[test]
    fn test_pattern() {
        let rule = Rule::pattern(r"^[a-z]+$", "lowercase only").unwrap();
        assert_eq!(judge(&rule, "abc"), Ok(()));
        assert_eq!(judge(&rule, "aBc"), Err("lowercase only".to_string()));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let result: Result<Rule<String>, _> = Rule::pattern("(unclosed", "never");
        assert!(matches!(result, Err(PipelineError::InvalidPattern(_))));
    }

    #[test]
    fn test_email_allows_empty() {
        let rule = Rule::email("bad email");
        assert_eq!(judge(&rule, ""), Ok(()));
        assert_eq!(judge(&rule, "user@example.com"), Ok(()));
        assert_eq!(judge(&rule, "not-an-email"), Err("bad email".to_string()));
    }

    #[test]
    fn test_equals_and_contains() {
        let equals = Rule::equals("secret", "mismatch");
        let contains = Rule::contains("@", "missing @");
        assert_eq!(judge(&equals, "secret"), Ok(()));
        assert_eq!(judge(&equals, "Secret"), Err("mismatch".to_string()));
        assert_eq!(judge(&contains, "a@b"), Ok(()));
        assert_eq!(judge(&contains, "ab"), Err("missing @".to_string()));
    }
}
