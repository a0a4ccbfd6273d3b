//! Rules and ordered rule lists.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::RuleError;
use crate::resolver::SequentialResolver;

/// Type alias for boxed futures used by async rules.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of judging one value with one rule. `Ok(())` means the value passed.
pub type Outcome<E> = Result<(), RuleError<E>>;

/// What a rule hands back when invoked.
///
/// Synchronous rules answer immediately; asynchronous rules hand back a
/// future that settles later.
pub enum RuleOutput<E> {
    /// The outcome is already known.
    Ready(Outcome<E>),
    /// The outcome will be known once the future settles.
    Pending(BoxFuture<'static, Outcome<E>>),
}

impl<E> fmt::Debug for RuleOutput<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(outcome) => f.debug_tuple("Ready").field(outcome).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

type RuleFn<V, E> = dyn Fn(&V) -> RuleOutput<E> + Send + Sync;

/// A stateless judgement over a value.
///
/// Cloning a rule is cheap; clones share the same closure.
///
/// # Example
///
/// ```
/// use rulepass::Rule;
///
/// let not_admin: Rule<String> = Rule::check(|v: &String| v != "admin", "name is reserved");
/// let lookup: Rule<String> = Rule::check_async(
///     |v: String| async move { !v.starts_with("taken") },
///     "name is already taken",
/// );
/// # let _ = (not_admin, lookup);
/// ```
pub struct Rule<V, E = String> {
    f: Arc<RuleFn<V, E>>,
}

impl<V, E> Rule<V, E>
where
    V: 'static,
    E: 'static,
{
    /// Create a rule from a closure producing a raw [`RuleOutput`].
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&V) -> RuleOutput<E> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Create a synchronous rule. `Err(e)` rejects the value with `e`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&V) -> Result<(), E> + Send + Sync + 'static,
    {
        Self::from_fn(move |v| RuleOutput::Ready(f(v).map_err(RuleError::Failed)))
    }

    /// Create an asynchronous rule. The closure receives its own copy of the
    /// value so the returned future can outlive the call.
    pub fn new_async<F, Fut>(f: F) -> Self
    where
        V: Clone,
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        Self::from_fn(move |v: &V| {
            let fut = f(v.clone());
            RuleOutput::Pending(Box::pin(async move { fut.await.map_err(RuleError::Failed) }))
        })
    }

    /// Create a synchronous rule from a predicate. A `false` answer rejects
    /// the value with `err`.
    pub fn check<F>(pred: F, err: impl Into<E>) -> Self
    where
        E: Clone + Send + Sync,
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        let err = err.into();
        Self::new(move |v| if pred(v) { Ok(()) } else { Err(err.clone()) })
    }

    /// Create an asynchronous rule from a predicate future.
    pub fn check_async<F, Fut>(pred: F, err: impl Into<E>) -> Self
    where
        V: Clone,
        E: Clone + Send + Sync,
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let err = err.into();
        Self::new_async(move |v| {
            let fut = pred(v);
            let err = err.clone();
            async move { if fut.await { Ok(()) } else { Err(err) } }
        })
    }

    /// Compose an ordered list into a single rule.
    ///
    /// The composite runs every rule concurrently and settles with the
    /// outcome the [`SequentialResolver`] picks: the first rule in list order
    /// that rejects the value, once every rule before it has passed.
    pub fn all(rules: impl Into<RuleList<V, E>>) -> Self
    where
        E: Send,
    {
        let resolver = SequentialResolver::new(rules);
        Self::from_fn(move |v| RuleOutput::Pending(resolver.resolve(v)))
    }

    /// Invoke the rule. Panics raised by the closure propagate; use
    /// [`evaluate`](crate::evaluate) to have them folded into the outcome.
    pub fn invoke(&self, value: &V) -> RuleOutput<E> {
        (self.f)(value)
    }
}

impl<V, E> Clone for Rule<V, E> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<V, E> fmt::Debug for Rule<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").finish_non_exhaustive()
    }
}

/// An ordered, immutable list of rules. Index 0 has the highest priority.
///
/// Shared read-only between every pass of a pipeline.
pub struct RuleList<V, E = String> {
    rules: Arc<[Rule<V, E>]>,
}

impl<V, E> RuleList<V, E> {
    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the list has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Get the rule at `index`.
    pub fn get(&self, index: usize) -> Option<&Rule<V, E>> {
        self.rules.get(index)
    }

    /// Iterate the rules in priority order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rule<V, E>> {
        self.rules.iter()
    }
}

impl<V, E> Clone for RuleList<V, E> {
    fn clone(&self) -> Self {
        Self {
            rules: Arc::clone(&self.rules),
        }
    }
}

impl<V, E> fmt::Debug for RuleList<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleList").field("len", &self.len()).finish()
    }
}

impl<V, E> Default for RuleList<V, E> {
    fn default() -> Self {
        Self {
            rules: Arc::from(Vec::new()),
        }
    }
}

impl<V, E> From<Vec<Rule<V, E>>> for RuleList<V, E> {
    fn from(rules: Vec<Rule<V, E>>) -> Self {
        Self {
            rules: Arc::from(rules),
        }
    }
}

impl<V, E, const N: usize> From<[Rule<V, E>; N]> for RuleList<V, E> {
    fn from(rules: [Rule<V, E>; N]) -> Self {
        Self::from(Vec::from(rules))
    }
}

impl<V, E> FromIterator<Rule<V, E>> for RuleList<V, E> {
    fn from_iter<I: IntoIterator<Item = Rule<V, E>>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

impl<'a, V, E> IntoIterator for &'a RuleList<V, E> {
    type Item = &'a Rule<V, E>;
    type IntoIter = std::slice::Iter<'a, Rule<V, E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
