//! Turns one rule invocation into an awaitable evaluation.

use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;
use futures::future;

use crate::error::{RuleError, extract_panic_message};
use crate::rule::{BoxFuture, Outcome, Rule, RuleOutput};

/// The in-flight judgement of one rule against one value.
///
/// Always settles exactly once with an [`Outcome`]; it never panics.
pub type Evaluation<E> = BoxFuture<'static, Outcome<E>>;

/// Start evaluating `rule` against `value`.
///
/// Synchronous answers come back as an already-settled evaluation and
/// asynchronous ones are passed through. A panic, whether raised by the
/// call itself or while the returned future is polled, settles the
/// evaluation with [`RuleError::Fault`], which callers rank exactly like a
/// declared failure. Nothing is retried.
pub fn evaluate<V, E>(rule: &Rule<V, E>, value: &V) -> Evaluation<E>
where
    V: 'static,
    E: Send + 'static,
{
    match panic::catch_unwind(AssertUnwindSafe(|| rule.invoke(value))) {
        Ok(RuleOutput::Ready(outcome)) => Box::pin(future::ready(outcome)),
        Ok(RuleOutput::Pending(fut)) => Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = extract_panic_message(&*panic);
                    log::debug!("async rule panicked: {}", message);
                    Err(RuleError::Fault { message })
                }
            }
        }),
        Err(panic) => {
            let message = extract_panic_message(&*panic);
            log::debug!("rule panicked: {}", message);
            Box::pin(future::ready(Err(RuleError::Fault { message })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_pass_settles_ok() {
        let rule: Rule<u32> = Rule::new(|_| Ok(()));
        assert_eq!(evaluate(&rule, &1).await, Ok(()));
    }

    #[tokio::test]
    async fn test_sync_failure_is_wrapped() {
        let rule: Rule<u32> = Rule::new(|v| Err(format!("bad {}", v)));
        assert_eq!(
            evaluate(&rule, &7).await,
            Err(RuleError::Failed("bad 7".to_string()))
        );
    }

    #[tokio::test]
    async fn test_async_rule_passes_through() {
        let rule: Rule<u32> = Rule::new_async(|v| async move {
            tokio::task::yield_now().await;
            if v > 3 { Ok(()) } else { Err("too small".to_string()) }
        });
        assert_eq!(evaluate(&rule, &4).await, Ok(()));
        assert_eq!(
            evaluate(&rule, &2).await,
            Err(RuleError::Failed("too small".to_string()))
        );
    }

    #[tokio::test]
    async fn test_panic_during_call_becomes_fault() {
        let rule: Rule<u32> = Rule::new(|_| panic!("boom"));
        let outcome = evaluate(&rule, &0).await;
        assert_eq!(
            outcome,
            Err(RuleError::Fault {
                message: "boom".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_panic_while_polling_becomes_fault() {
        let rule: Rule<u32> = Rule::new_async(|v| async move {
            tokio::task::yield_now().await;
            if v == 0 {
                panic!("late {}", "boom");
            }
            Ok(())
        });
        let outcome = evaluate(&rule, &0).await;
        assert!(matches!(outcome, Err(RuleError::Fault { ref message }) if message == "late boom"));
    }
}
