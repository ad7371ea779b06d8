//! Bounded concurrent fan-out of independent lookups inside one node.
//!
//! At most `cap` futures are polled at a time; results come back in request
//! order regardless of completion order. Dropping the returned future (for
//! instance on a node deadline) drops every outstanding call with it.

use futures::StreamExt;
use futures::stream;
use std::future::Future;
use tripclaw_core::checkpoint::ItemFailure;
use tripclaw_core::error::NodeError;

/// Per-item outcomes of a fan-out, in request order.
#[derive(Debug)]
pub struct FanOutResults<T> {
    pub items: Vec<(String, Result<T, String>)>,
}

impl<T> FanOutResults<T> {
    pub fn attempted(&self) -> usize {
        self.items.len()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|(_, r)| r.is_ok()).count()
    }

    /// Split into successes and failures, preserving order within each.
    pub fn partition(self) -> (Vec<(String, T)>, Vec<ItemFailure>) {
        let mut ok = Vec::new();
        let mut failed = Vec::new();
        for (item, result) in self.items {
            match result {
                Ok(value) => ok.push((item, value)),
                Err(detail) => failed.push(ItemFailure { item, detail }),
            }
        }
        (ok, failed)
    }

    /// Like [`partition`](Self::partition), but a fan-out where every item
    /// failed is a node failure. An empty fan-out is not.
    pub fn require_any(self) -> Result<(Vec<(String, T)>, Vec<ItemFailure>), NodeError> {
        let attempted = self.attempted();
        let (ok, failed) = self.partition();
        if attempted > 0 && ok.is_empty() {
            let detail = failed
                .iter()
                .map(|f| format!("{}: {}", f.item, f.detail))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(NodeError::AllItemsFailed { attempted, detail });
        }
        Ok((ok, failed))
    }
}

/// Run labelled calls with at most `cap` in flight.
pub async fn fan_out<T, Fut>(cap: usize, calls: Vec<(String, Fut)>) -> FanOutResults<T>
where
    Fut: Future<Output = Result<T, String>>,
{
    let items: Vec<(String, Result<T, String>)> = stream::iter(
        calls
            .into_iter()
            .map(|(label, call)| async move { (label, call.await) }),
    )
    .buffered(cap.max(1))
    .collect()
    .await;
    FanOutResults { items }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn two_of_three_is_partial_success() {
        let calls: Vec<(String, _)> = ["a", "b", "c"]
            .into_iter()
            .map(|k| {
                (k.to_string(), async move {
                    if k == "b" { Err("boom".to_string()) } else { Ok(k.len()) }
                })
            })
            .collect();
        let (ok, failed) = fan_out(3, calls).await.require_any().unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(failed, vec![ItemFailure { item: "b".into(), detail: "boom".into() }]);
    }

    #[tokio::test]
    async fn zero_of_three_fails_node() {
        let calls: Vec<(String, _)> = (0..3)
            .map(|i| (format!("k{i}"), async move { Err::<(), _>(format!("down {i}")) }))
            .collect();
        let err = fan_out(3, calls).await.require_any().unwrap_err();
        assert!(matches!(err, NodeError::AllItemsFailed { attempted: 3, .. }));
    }

    #[tokio::test]
    async fn empty_fan_out_is_ok() {
        let calls: Vec<(String, std::future::Ready<Result<(), String>>)> = Vec::new();
        let (ok, failed) = fan_out(3, calls).await.require_any().unwrap();
        assert!(ok.is_empty() && failed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn order_preserved_and_concurrency_capped() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let calls: Vec<(String, _)> = (0..6u64)
            .map(|i| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                (format!("item{i}"), async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    // Later items finish first.
                    tokio::time::sleep(Duration::from_millis(100 - i * 10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(i)
                })
            })
            .collect();

        let results = fan_out(2, calls).await;
        let values: Vec<u64> = results.items.into_iter().map(|(_, r)| r.unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4, 5]);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
