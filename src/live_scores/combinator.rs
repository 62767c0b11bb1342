//! Combinators over lists of source attempts.
//!
//! Futures are lazy, so building the attempt list does no I/O. The race polls
//! every attempt at once and returns on the first success; dropping the
//! remaining futures cancels the losers. The chain polls attempts one after
//! another and stops at the first success.

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use tracing::debug;

/// Why one source did not produce a usable result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source_name: String,
    pub reason: String,
}

impl SourceFailure {
    pub fn new(source_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        SourceFailure {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_name, self.reason)
    }
}

pub type Attempt<'a, T> = BoxFuture<'a, Result<T, SourceFailure>>;

/// The winning attempt, its position in the list, and the failures seen
/// before it won.
#[derive(Debug)]
pub struct Settled<T> {
    pub rank: usize,
    pub value: T,
    pub failures: Vec<SourceFailure>,
}

/// Run all attempts concurrently and return the first success.
pub async fn race_first_success<T>(attempts: Vec<Attempt<'_, T>>) -> Result<Settled<T>, Vec<SourceFailure>> {
    let mut pending: FuturesUnordered<_> = attempts
        .into_iter()
        .enumerate()
        .map(|(rank, attempt)| async move { (rank, attempt.await) })
        .collect();

    let mut failures = Vec::new();
    while let Some((rank, outcome)) = pending.next().await {
        match outcome {
            Ok(value) => {
                if !pending.is_empty() {
                    debug!("Race won by attempt #{}; cancelling {} slower attempt(s)", rank, pending.len());
                }
                return Ok(Settled {
                    rank,
                    value,
                    failures,
                });
            }
            Err(failure) => {
                debug!("Race attempt failed: {}", failure);
                failures.push(failure);
            }
        }
    }
    Err(failures)
}

/// Run attempts in priority order, stopping at the first success.
pub async fn first_usable<T>(attempts: Vec<Attempt<'_, T>>) -> Result<Settled<T>, Vec<SourceFailure>> {
    let mut failures = Vec::new();
    for (rank, attempt) in attempts.into_iter().enumerate() {
        match attempt.await {
            Ok(value) => {
                return Ok(Settled {
                    rank,
                    value,
                    failures,
                })
            }
            Err(failure) => {
                debug!("Chain attempt #{} failed: {}", rank, failure);
                failures.push(failure);
            }
        }
    }
    Err(failures)
}

/// "a: timed out; b: returned 503"
pub fn describe_failures(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn after(ms: u64, outcome: Result<&'static str, &'static str>) -> Attempt<'static, &'static str> {
        async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            outcome.map_err(|reason| SourceFailure::new("src", reason))
        }
        .boxed()
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_returns_fastest_success() {
        let settled = race_first_success(vec![after(500, Ok("slow")), after(10, Ok("fast"))])
            .await
            .unwrap();
        assert_eq!(settled.value, "fast");
        assert_eq!(settled.rank, 1);
        assert!(settled.failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_skips_failures() {
        let settled = race_first_success(vec![after(5, Err("boom")), after(50, Ok("late but fine"))])
            .await
            .unwrap();
        assert_eq!(settled.value, "late but fine");
        assert_eq!(settled.failures.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_all_fail() {
        let failures = race_first_success(vec![after(5, Err("a")), after(6, Err("b"))])
            .await
            .unwrap_err();
        assert_eq!(failures.len(), 2);
        assert_eq!(describe_failures(&failures), "src: a; src: b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_cancels_losers() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let loser: Attempt<'static, &'static str> = async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            flag.store(true, Ordering::SeqCst);
            Ok("loser")
        }
        .boxed();
        let settled = race_first_success(vec![loser, after(1, Ok("winner"))]).await.unwrap();
        assert_eq!(settled.value, "winner");
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_chain_stops_at_first_success() {
        let polled = Arc::new(AtomicUsize::new(0));
        let attempt = |outcome: Result<&'static str, &'static str>| -> Attempt<'static, &'static str> {
            let polled = Arc::clone(&polled);
            async move {
                polled.fetch_add(1, Ordering::SeqCst);
                outcome.map_err(|reason| SourceFailure::new("mirror", reason))
            }
            .boxed()
        };
        let settled = first_usable(vec![attempt(Err("stale")), attempt(Ok("second")), attempt(Ok("third"))])
            .await
            .unwrap();
        assert_eq!(settled.value, "second");
        assert_eq!(settled.rank, 1);
        assert_eq!(settled.failures, vec![SourceFailure::new("mirror", "stale")]);
        assert_eq!(polled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_chain_empty_list_fails() {
        let result = first_usable::<()>(vec![]).await;
        assert!(result.unwrap_err().is_empty());
    }
}
