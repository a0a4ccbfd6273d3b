//! Priority resolution over concurrently running evaluations.
//!
//! Every rule of a pass runs at once, but the pass reports the outcome of the
//! first rule *in list order* whose settlement is decisive: the scan walks
//! from index 0 past rules that settled and passed, and stops at the first
//! rule that is either still pending or settled with a failure. A pending
//! stop means "keep waiting"; a settled stop decides the pass.
//!
//! ```text
//!   index:   0        1        2        3
//!   state:   ok       ok       pending  failed     -> waiting on 2
//!   state:   ok       failed   pending  failed     -> decided by 1
//!   state:   ok       ok       ok       ok         -> decided valid
//! ```
//!
//! The result depends only on the per-index outcomes, never on the order in
//! which settlements arrive.

use futures::FutureExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;

use crate::error::RuleError;
use crate::evaluator::{Evaluation, evaluate};
use crate::rule::{BoxFuture, Outcome, RuleList};

/// Observable state of one evaluation within a pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EvaluationState<E> {
    /// Not settled yet.
    #[default]
    Pending,
    /// Settled with a final outcome.
    Settled(Outcome<E>),
}

impl<E> EvaluationState<E> {
    /// Check if the evaluation settled and passed.
    pub fn is_passing(&self) -> bool {
        matches!(self, Self::Settled(Ok(())))
    }

    /// Check if the evaluation has settled.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }
}

/// Where the scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// No rules; trivially valid.
    Empty,
    /// The first relevant evaluation is still pending.
    Waiting(usize),
    /// The first relevant evaluation has settled.
    Decided(usize),
}

/// Ordered settlement record for one pass.
///
/// Settlements are fed in as they happen via [`settle`](Self::settle) and
/// the pass is decided once [`decision`](Self::decision) returns `Some`.
/// Only the first settlement per index counts.
#[derive(Debug, Clone)]
pub struct Settlements<E> {
    states: Vec<EvaluationState<E>>,
}

impl<E> Settlements<E> {
    /// Create a record with `len` pending evaluations.
    pub fn new(len: usize) -> Self {
        Self {
            states: std::iter::repeat_with(|| EvaluationState::Pending)
                .take(len)
                .collect(),
        }
    }

    /// Number of tracked evaluations.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check if the pass has no evaluations.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State of the evaluation at `index`.
    pub fn state(&self, index: usize) -> Option<&EvaluationState<E>> {
        self.states.get(index)
    }

    /// Record the settlement of the evaluation at `index`.
    ///
    /// Returns `false` when the settlement was ignored, either because the
    /// evaluation had already settled or because `index` is out of range.
    pub fn settle(&mut self, index: usize, outcome: Outcome<E>) -> bool {
        match self.states.get_mut(index) {
            Some(state) if !state.is_settled() => {
                *state = EvaluationState::Settled(outcome);
                true
            }
            Some(_) => {
                log::trace!("ignoring repeated settlement of rule {}", index);
                false
            }
            None => {
                log::warn!(
                    "ignoring settlement for rule {} of a {}-rule pass",
                    index,
                    self.states.len()
                );
                false
            }
        }
    }

    fn scan(&self) -> Scan {
        let len = self.states.len();
        if len == 0 {
            return Scan::Empty;
        }

        let mut index = 0;
        while index < len && self.states[index].is_passing() {
            index += 1;
        }

        // Everything passed: the last evaluation stands for the pass.
        let first_relevant = index.min(len - 1);
        if self.states[first_relevant].is_settled() {
            Scan::Decided(first_relevant)
        } else {
            Scan::Waiting(first_relevant)
        }
    }

    /// The decided outcome, if the pass can be decided yet.
    pub fn decision(&self) -> Option<Result<(), &RuleError<E>>> {
        match self.scan() {
            Scan::Empty => Some(Ok(())),
            Scan::Waiting(_) => None,
            Scan::Decided(index) => match &self.states[index] {
                EvaluationState::Settled(outcome) => Some(outcome.as_ref().map(|_| ())),
                EvaluationState::Pending => None,
            },
        }
    }

    /// Index of the evaluation the scan currently stops at.
    ///
    /// `None` for an empty pass.
    pub fn first_relevant(&self) -> Option<usize> {
        match self.scan() {
            Scan::Empty => None,
            Scan::Waiting(index) | Scan::Decided(index) => Some(index),
        }
    }

    /// Check if the pass is decided.
    pub fn is_decided(&self) -> bool {
        self.decision().is_some()
    }

    /// Consume the record and take the decided outcome.
    ///
    /// Hands the record back unchanged when the pass is still undecided.
    pub fn into_decision(mut self) -> Result<Outcome<E>, Self> {
        match self.scan() {
            Scan::Empty => Ok(Ok(())),
            Scan::Waiting(_) => Err(self),
            Scan::Decided(index) => match self.states.swap_remove(index) {
                EvaluationState::Settled(outcome) => Ok(outcome),
                EvaluationState::Pending => unreachable!("decided evaluation is settled"),
            },
        }
    }
}

/// Drive evaluations to a decision.
///
/// Evaluations are polled together from a single task, so each scan runs
/// atomically with respect to the settlements that trigger it. Once the
/// pass is decided, the remaining evaluations are dropped unpolled.
pub async fn settle_in_order<E>(evaluations: Vec<Evaluation<E>>) -> Outcome<E> {
    let mut settlements = Settlements::new(evaluations.len());
    let mut in_flight: FuturesUnordered<_> = evaluations
        .into_iter()
        .enumerate()
        .map(|(index, evaluation)| evaluation.map(move |outcome| (index, outcome)))
        .collect();

    loop {
        if let Some(index) = settlements.first_relevant() {
            log::trace!("scan stopped at rule {}", index);
        }
        settlements = match settlements.into_decision() {
            Ok(outcome) => {
                if !in_flight.is_empty() {
                    log::debug!("pass decided, dropping {} pending rules", in_flight.len());
                }
                return outcome;
            }
            Err(undecided) => undecided,
        };

        match in_flight.next().await {
            Some((index, outcome)) => {
                settlements.settle(index, outcome);
            }
            None => unreachable!("every rule settled without deciding the pass"),
        }
    }
}

/// Resolves a value against an ordered rule list.
///
/// # Example
///
/// ```
/// use rulepass::{Rule, RuleError, SequentialResolver};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let resolver: SequentialResolver<String> = SequentialResolver::new(vec![
///     Rule::check(|v: &String| !v.is_empty(), "required"),
///     Rule::check(|v: &String| v.len() >= 3, "too short"),
/// ]);
///
/// let outcome = resolver.resolve(&"x".to_string()).await;
/// assert_eq!(outcome, Err(RuleError::Failed("too short".to_string())));
/// # }
/// ```
pub struct SequentialResolver<V, E = String> {
    rules: RuleList<V, E>,
}

impl<V, E> SequentialResolver<V, E>
where
    V: 'static,
    E: Send + 'static,
{
    /// Create a resolver over `rules`.
    pub fn new(rules: impl Into<RuleList<V, E>>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    /// The rules this resolver judges with.
    pub fn rules(&self) -> &RuleList<V, E> {
        &self.rules
    }

    /// Start every rule against `value` and resolve to the decisive outcome.
    ///
    /// All rules are invoked before this returns; the returned future only
    /// waits for their settlements and borrows neither `self` nor `value`.
    pub fn resolve(&self, value: &V) -> BoxFuture<'static, Outcome<E>> {
        let evaluations: Vec<Evaluation<E>> =
            self.rules.iter().map(|rule| evaluate(rule, value)).collect();
        log::trace!("started {} rule evaluations", evaluations.len());
        Box::pin(settle_in_order(evaluations))
    }
}

impl<V, E> Clone for SequentialResolver<V, E> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
        }
    }
}

impl<V, E> std::fmt::Debug for SequentialResolver<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialResolver")
            .field("rules", &self.rules)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(msg: &str) -> Outcome<String> {
        Err(RuleError::Failed(msg.to_string()))
    }

    /// Every ordering of `0..n`.
    fn permutations(n: usize) -> Vec<Vec<usize>> {
        if n == 0 {
            return vec![Vec::new()];
        }
        let mut result = Vec::new();
        for rest in permutations(n - 1) {
            for slot in 0..=rest.len() {
                let mut order = rest.clone();
                order.insert(slot, n - 1);
                result.push(order);
            }
        }
        result
    }

    /// Feed outcomes in `order`, returning the first decision observed.
    fn decide_in_order(outcomes: &[Outcome<String>], order: &[usize]) -> Outcome<String> {
        let mut settlements = Settlements::new(outcomes.len());
        for &index in order {
            settlements.settle(index, outcomes[index].clone());
            if let Some(decision) = settlements.decision() {
                return decision.map_err(Clone::clone);
            }
        }
        panic!("undecided after all settlements");
    }

    #[test]
    fn test_empty_pass_is_decided_valid() {
        let settlements: Settlements<String> = Settlements::new(0);
        assert_eq!(settlements.decision(), Some(Ok(())));
        assert_eq!(settlements.first_relevant(), None);
    }

    #[test]
    fn test_pending_first_rule_blocks_later_failure() {
        let mut settlements = Settlements::new(2);
        settlements.settle(1, failed("fast"));
        assert_eq!(settlements.decision(), None);
        assert_eq!(settlements.first_relevant(), Some(0));

        settlements.settle(0, failed("slow"));
        assert_eq!(
            settlements.decision(),
            Some(Err(&RuleError::Failed("slow".to_string())))
        );
    }

    #[test]
    fn test_failure_decides_without_waiting_for_later_rules() {
        let mut settlements = Settlements::new(3);
        settlements.settle(0, Ok(()));
        settlements.settle(1, failed("second"));
        assert!(settlements.is_decided());
        assert_eq!(settlements.state(2), Some(&EvaluationState::Pending));
        assert_eq!(settlements.into_decision().ok(), Some(failed("second")));
    }

    #[test]
    fn test_all_pass_needs_every_settlement() {
        let mut settlements: Settlements<String> = Settlements::new(3);
        settlements.settle(2, Ok(()));
        settlements.settle(0, Ok(()));
        assert!(!settlements.is_decided());
        assert_eq!(settlements.first_relevant(), Some(1));

        settlements.settle(1, Ok(()));
        assert_eq!(settlements.decision(), Some(Ok(())));
        assert_eq!(settlements.first_relevant(), Some(2));
    }

    #[test]
    fn test_repeated_settlement_is_ignored() {
        let mut settlements = Settlements::new(1);
        assert!(settlements.settle(0, Ok(())));
        assert!(!settlements.settle(0, failed("late")));
        assert_eq!(settlements.decision(), Some(Ok(())));
    }

    #[test]
    fn test_out_of_range_settlement_is_ignored() {
        let mut settlements = Settlements::new(1);
        assert!(!settlements.settle(4, failed("nope")));
        assert_eq!(settlements.decision(), None);
    }

    #[test]
    fn test_undecided_record_is_handed_back() {
        let settlements: Settlements<String> = Settlements::new(2);
        let settlements = settlements.into_decision().unwrap_err();
        assert_eq!(settlements.len(), 2);
    }

    #[test]
    fn test_decision_is_independent_of_settlement_order() {
        let cases: Vec<(Vec<Outcome<String>>, Outcome<String>)> = vec![
            (vec![Ok(()), Ok(()), Ok(()), Ok(())], Ok(())),
            (
                vec![Ok(()), failed("b"), Ok(()), failed("d")],
                failed("b"),
            ),
            (
                vec![failed("a"), failed("b"), failed("c"), failed("d")],
                failed("a"),
            ),
            (vec![Ok(()), Ok(()), Ok(()), failed("d")], failed("d")),
            (
                vec![
                    Ok(()),
                    Err(RuleError::Fault {
                        message: "boom".to_string(),
                    }),
                    failed("c"),
                    Ok(()),
                ],
                Err(RuleError::Fault {
                    message: "boom".to_string(),
                }),
            ),
        ];

        for (outcomes, expected) in cases {
            for order in permutations(outcomes.len()) {
                assert_eq!(
                    decide_in_order(&outcomes, &order),
                    expected,
                    "outcomes {:?} settled in order {:?}",
                    outcomes,
                    order
                );
            }
        }
    }

    #[tokio::test]
    async fn test_resolve_empty_list_is_valid() {
        let resolver: SequentialResolver<String> = SequentialResolver::new(Vec::new());
        assert_eq!(resolver.resolve(&"anything".to_string()).await, Ok(()));
    }

    #[tokio::test]
    async fn test_resolve_stops_polling_once_decided() {
        let resolver: SequentialResolver<u32> = SequentialResolver::new(vec![
            crate::Rule::new(|_| Err("first".to_string())),
            crate::Rule::new_async(|_| futures::future::pending()),
        ]);
        assert_eq!(resolver.resolve(&1).await, failed("first"));
    }
}
