//! Best-effort parallel fan-out.
//!
//! One request often needs the same upstream call for many wallets or slugs.
//! The batch is awaited jointly and completes only once every call has
//! settled; a single failing call never aborts its siblings.

use futures_util::future::join_all;
use std::future::Future;
use std::time::Duration;

/// Explicit tagged result for one call in a batch. Callers must handle the
/// failure branch; [`FetchOutcome::into_option`] implements the
/// degrade-to-empty policy where that is the documented behavior.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Fetched(T),
    Failed { reason: String },
}

impl<T> FetchOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Fetched(v) => Some(v),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Fetched(_) => None,
            Self::Failed { reason } => Some(reason),
        }
    }
}

/// Run `op` once per item, each wrapped in `timeout`, and await the whole
/// batch. Output slots are keyed by the input item, in input order.
pub async fn best_effort_join<K, T, F, Fut>(
    items: Vec<K>,
    timeout: Duration,
    op: F,
) -> Vec<(K, FetchOutcome<T>)>
where
    K: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let futures = items.into_iter().map(|key| {
        let fut = op(key.clone());
        async move {
            let outcome = match tokio::time::timeout(timeout, fut).await {
                Ok(Ok(value)) => FetchOutcome::Fetched(value),
                Ok(Err(err)) => FetchOutcome::Failed {
                    reason: err.to_string(),
                },
                Err(_) => FetchOutcome::Failed {
                    reason: format!("timed out after {}s", timeout.as_secs()),
                },
            };
            if !outcome.is_fetched() {
                metrics::counter!("arena_fetch_failures_total").increment(1);
            }
            (key, outcome)
        }
    });
    join_all(futures).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn test_all_success_preserves_order() {
        let results = best_effort_join(vec![1u32, 2, 3], Duration::from_secs(5), |n| async move {
            Ok(n * 10)
        })
        .await;

        let values: Vec<(u32, u32)> = results
            .into_iter()
            .map(|(k, o)| (k, o.into_option().unwrap()))
            .collect();
        assert_eq!(values, vec![(1, 10), (2, 20), (3, 30)]);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_one_slot() {
        let results = best_effort_join(
            vec!["a", "b", "c"],
            Duration::from_secs(5),
            |key| async move {
                if key == "b" {
                    Err(anyhow!("upstream exploded"))
                } else {
                    Ok(key.len())
                }
            },
        )
        .await;

        assert!(results[0].1.is_fetched());
        assert_eq!(
            results[1].1.failure_reason(),
            Some("upstream exploded".to_string()).as_deref()
        );
        assert!(results[2].1.is_fetched());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out_without_blocking_batch() {
        let results = best_effort_join(vec![0u8, 1], Duration::from_secs(2), |key| async move {
            if key == 0 {
                futures_util::future::pending::<()>().await;
                unreachable!()
            }
            Ok(key)
        })
        .await;

        assert!(results[0]
            .1
            .failure_reason()
            .unwrap()
            .contains("timed out"));
        assert!(results[1].1.is_fetched());
    }

    #[tokio::test]
    async fn test_empty_batch_is_empty() {
        let results =
            best_effort_join(Vec::<u8>::new(), Duration::from_secs(1), |n| async move {
                Ok(n)
            })
            .await;
        assert!(results.is_empty());
    }
}
