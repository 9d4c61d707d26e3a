//! Bounded, deadline-limited fan-out over pairs.
//!
//! At most `max_concurrency` pair tasks run at once. When the deadline passes,
//! unfinished pairs are reported as `Pending` and their tasks are detached:
//! they keep running (and may still warm the cache) but their results are
//! discarded.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fxpulse_market_data::Pair;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub max_concurrency: usize,
    pub deadline: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            deadline: Duration::from_secs(15),
        }
    }
}

/// Per-pair result of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchOutcome<T> {
    Fetched(T),
    Failed(String),
    /// Still running when the deadline passed.
    Pending,
}

impl<T> BatchOutcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Fetched(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem<T> {
    pub symbol: String,
    pub outcome: BatchOutcome<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport<T> {
    /// One entry per requested pair, in request order.
    pub items: Vec<BatchItem<T>>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub deadline_hit: bool,
}

impl<T> BatchReport<T> {
    pub fn fetched(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items
            .iter()
            .filter_map(|item| item.outcome.value().map(|v| (item.symbol.as_str(), v)))
    }

    pub fn get(&self, symbol: &str) -> Option<&BatchOutcome<T>> {
        self.items
            .iter()
            .find(|item| item.symbol == symbol)
            .map(|item| &item.outcome)
    }

    pub fn fetched_count(&self) -> usize {
        self.count(|o| matches!(o, BatchOutcome::Fetched(_)))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, BatchOutcome::Failed(_)))
    }

    pub fn pending_count(&self) -> usize {
        self.count(|o| matches!(o, BatchOutcome::Pending))
    }

    fn count(&self, pred: impl Fn(&BatchOutcome<T>) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.outcome)).count()
    }
}

/// Run `task` for every pair under `config`.
pub async fn run_batch<T, F, Fut>(pairs: &[Pair], config: BatchConfig, task: F) -> BatchReport<T>
where
    T: Send + 'static,
    F: Fn(Pair) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let started_at = Utc::now();
    let started = Instant::now();
    let deadline = tokio::time::Instant::now() + config.deadline;
    let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));

    let mut outcomes: Vec<Option<BatchOutcome<T>>> = (0..pairs.len()).map(|_| None).collect();
    let mut set = JoinSet::new();

    for (index, pair) in pairs.iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let fut = task(pair.clone());
        set.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => fut.await,
                Err(_) => Err(crate::errors::Error::Unexpected(
                    "batch semaphore closed".to_string(),
                )),
            };
            (index, result)
        });
    }

    let mut deadline_hit = false;
    loop {
        match tokio::time::timeout_at(deadline, set.join_next()).await {
            Ok(Some(Ok((index, result)))) => {
                outcomes[index] = Some(match result {
                    Ok(value) => BatchOutcome::Fetched(value),
                    Err(e) => {
                        warn!("Batch task for {} failed: {}", pairs[index].symbol, e);
                        BatchOutcome::Failed(e.to_string())
                    }
                });
            }
            Ok(Some(Err(join_error))) => {
                warn!("Batch task aborted: {}", join_error);
            }
            Ok(None) => break,
            Err(_) => {
                deadline_hit = true;
                break;
            }
        }
    }

    if deadline_hit {
        let unfinished = set.len();
        set.detach_all();
        warn!(
            "Batch deadline of {:?} reached with {} pair(s) unfinished",
            config.deadline, unfinished
        );
    }

    let items = pairs
        .iter()
        .zip(outcomes)
        .map(|(pair, outcome)| BatchItem {
            symbol: pair.symbol.to_string(),
            // a task that panicked never reports its index
            outcome: outcome.unwrap_or_else(|| {
                if deadline_hit {
                    BatchOutcome::Pending
                } else {
                    BatchOutcome::Failed("task aborted".to_string())
                }
            }),
        })
        .collect::<Vec<_>>();

    let report = BatchReport {
        items,
        started_at,
        elapsed_ms: started.elapsed().as_millis() as u64,
        deadline_hit,
    };
    debug!(
        "Batch of {} finished in {} ms: {} fetched, {} failed, {} pending",
        pairs.len(),
        report.elapsed_ms,
        report.fetched_count(),
        report.failed_count(),
        report.pending_count()
    );
    report
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use fxpulse_market_data::catalog;

    use super::*;
    use crate::errors::Error;

    fn pairs(symbols: &[&str]) -> Vec<Pair> {
        symbols
            .iter()
            .map(|s| catalog::lookup(s).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_all_pairs_fetched_in_order() {
        let pairs = pairs(&["EURUSD", "GBPUSD", "BTCUSD"]);
        let report = run_batch(&pairs, BatchConfig::default(), |pair| async move {
            Ok(pair.symbol.len())
        })
        .await;

        assert!(!report.deadline_hit);
        assert_eq!(report.fetched_count(), 3);
        let symbols: Vec<&str> = report.items.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["EURUSD", "GBPUSD", "BTCUSD"]);
    }

    #[tokio::test]
    async fn test_failures_are_reported_per_pair() {
        let pairs = pairs(&["EURUSD", "USDJPY"]);
        let report = run_batch(&pairs, BatchConfig::default(), |pair| async move {
            if pair.is_jpy() {
                Err(Error::Unexpected("boom".to_string()))
            } else {
                Ok(1u8)
            }
        })
        .await;

        assert_eq!(report.get("EURUSD"), Some(&BatchOutcome::Fetched(1)));
        assert!(matches!(
            report.get("USDJPY"),
            Some(BatchOutcome::Failed(msg)) if msg.contains("boom")
        ));
    }

    #[tokio::test]
    async fn test_deadline_marks_slow_pairs_pending() {
        let pairs = pairs(&["EURUSD", "GBPUSD"]);
        let config = BatchConfig {
            max_concurrency: 2,
            deadline: Duration::from_millis(100),
        };
        let started = Instant::now();
        let report = run_batch(&pairs, config, |pair| async move {
            if pair.symbol == "GBPUSD" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(())
        })
        .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(report.deadline_hit);
        assert_eq!(report.get("EURUSD"), Some(&BatchOutcome::Fetched(())));
        assert_eq!(report.get("GBPUSD"), Some(&BatchOutcome::Pending));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pairs = pairs(&["EURUSD", "GBPUSD", "USDJPY", "USDCHF", "AUDUSD", "USDCAD"]);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let config = BatchConfig {
            max_concurrency: 2,
            deadline: Duration::from_secs(10),
        };

        let report = run_batch(&pairs, config, |_pair| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(report.fetched_count(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report: BatchReport<()> =
            run_batch(&[], BatchConfig::default(), |_| async { Ok(()) }).await;
        assert!(report.items.is_empty());
        assert!(!report.deadline_hit);
    }
}
