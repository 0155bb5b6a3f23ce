//! Cancellable operation with a deadline
//!
//! Both the whole-request timeout and the per-chunk stall timeout are one
//! race between the operation, a timer and the session's cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Which side of a race finished first
#[derive(Debug, PartialEq, Eq)]
pub enum Raced<T> {
    Ready(T),
    TimedOut,
    Cancelled,
}

/// Await `operation` until it completes, `limit` elapses or `token` fires
///
/// Cancellation wins ties. The losing futures are dropped before returning,
/// which releases the timer and any in-flight read.
pub async fn race<F>(operation: F, limit: Duration, token: &CancellationToken) -> Raced<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Raced::Cancelled,
        result = tokio::time::timeout(limit, operation) => match result {
            Ok(value) => Raced::Ready(value),
            Err(_) => Raced::TimedOut,
        },
    }
}
