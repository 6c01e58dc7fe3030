//! Optimistic commit loop shared by the services.

use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStoreError;

/// Service errors that can carry a storage failure.
pub(crate) trait PersistenceError {
    fn persistence(message: String) -> Self;
}

/// A commit attempt that did not go through.
#[derive(Debug)]
pub(crate) enum Attempt<E> {
    /// Another writer committed first; retry against fresh state.
    Conflict(String),
    Failed(E),
}

impl<E: PersistenceError> From<EventStoreError> for Attempt<E> {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => Attempt::Conflict(msg),
            other => Attempt::Failed(E::persistence(other.to_string())),
        }
    }
}

impl<E: PersistenceError> From<DispatchError> for Attempt<E> {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Concurrency(msg) => Attempt::Conflict(msg),
            other => Attempt::Failed(E::persistence(other.to_string())),
        }
    }
}

/// Run `attempt` until it succeeds, fails for a reason other than a
/// conflict, or `max_attempts` conflicts have happened.
pub(crate) fn commit_with_retry<T, E>(
    operation: &'static str,
    max_attempts: u32,
    mut attempt: impl FnMut() -> Result<T, Attempt<E>>,
    exhausted: impl FnOnce(u32) -> E,
) -> Result<T, E> {
    let max = max_attempts.max(1);

    for n in 1..=max {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(Attempt::Failed(err)) => return Err(err),
            Err(Attempt::Conflict(reason)) => {
                tracing::debug!(operation, attempt = n, %reason, "commit conflict, retrying against fresh state");
            }
        }
    }

    tracing::warn!(operation, attempts = max, "giving up after repeated commit conflicts");
    Err(exhausted(max))
}
