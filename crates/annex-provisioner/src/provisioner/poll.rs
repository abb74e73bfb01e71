use std::future::Future;
use std::time::Duration;

use crate::provisioner::ProvisionResult;

#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The value returned by the `polls`-th query satisfied the predicate.
    Ready { value: T, polls: u32 },
    /// No value satisfied the predicate within the budget.
    Exhausted { polls: u32 },
}

/// Runs `query` until its result satisfies `predicate`, at most `budget` times.
///
/// Successive queries are `interval` apart; there is no wait before the first query and after
/// the last one. A failed query is logged and counts as an unsuccessful one.
/// The query receives the (1-based) index of the current poll.
pub async fn poll_until<T, Q, Fut, P>(
    interval: Duration,
    budget: u32,
    mut query: Q,
    predicate: P,
) -> PollOutcome<T>
where
    Q: FnMut(u32) -> Fut,
    Fut: Future<Output = ProvisionResult<T>>,
    P: Fn(&T) -> bool,
{
    for poll in 1..=budget {
        if poll > 1 {
            tokio::time::sleep(interval).await;
        }
        match query(poll).await {
            Ok(value) if predicate(&value) => return PollOutcome::Ready { value, polls: poll },
            Ok(_) => {}
            Err(error) => log::warn!("Status check {poll}/{budget} failed: {error:?}"),
        }
    }
    PollOutcome::Exhausted { polls: budget }
}
