//! Analytics tracker: records per-call compaction metrics under a
//! reader/writer discipline. `record` calls form a total order consistent
//! with real time.

use crate::compactor::CompactionInfo;
use std::time::SystemTime;
use tokio::sync::RwLock;

/// One recorded compaction event.
#[derive(Debug, Clone)]
pub struct AnalyticsRecord {
    pub recorded_at: SystemTime,
    pub info: CompactionInfo,
}

#[derive(Debug, Default)]
struct Totals {
    calls: u64,
    original_messages: u64,
    compacted_messages: u64,
    dropped_messages: u64,
    tokens_saved: i64,
}

/// Running aggregate of compaction outcomes, plus the full event log.
pub struct AnalyticsTracker {
    records: RwLock<Vec<AnalyticsRecord>>,
    totals: RwLock<Totals>,
}

impl Default for AnalyticsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsTracker {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            totals: RwLock::new(Totals::default()),
        }
    }

    /// Records a single compaction outcome.
    pub async fn record(&self, info: CompactionInfo) {
        let mut totals = self.totals.write().await;
        totals.calls += 1;
        totals.original_messages += info.original_count as u64;
        totals.compacted_messages += info.compacted_count as u64;
        totals.dropped_messages += info.dropped_count as u64;
        totals.tokens_saved += info.tokens_saved;
        drop(totals);

        self.records.write().await.push(AnalyticsRecord {
            recorded_at: SystemTime::now(),
            info,
        });
    }

    /// Total number of `compact` calls recorded.
    pub async fn call_count(&self) -> u64 {
        self.totals.read().await.calls
    }

    /// Sum of `tokens_saved` across every recorded call; may be negative.
    pub async fn total_tokens_saved(&self) -> i64 {
        self.totals.read().await.tokens_saved
    }

    /// Mean compression ratio across every recorded call, or `1.0` if none.
    pub async fn mean_compression_ratio(&self) -> f64 {
        let records = self.records.read().await;
        if records.is_empty() {
            return 1.0;
        }
        let sum: f64 = records.iter().map(|r| r.info.compression_ratio).sum();
        sum / records.len() as f64
    }

    /// Full event log in recording order.
    pub async fn history(&self) -> Vec<AnalyticsRecord> {
        self.records.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(tokens_saved: i64, ratio: f64) -> CompactionInfo {
        CompactionInfo {
            original_count: 10,
            compacted_count: 5,
            dropped_count: 5,
            anchor_count: 1,
            tokens_saved,
            compression_ratio: ratio,
        }
    }

    #[tokio::test]
    async fn test_record_increments_call_count() {
        let tracker = AnalyticsTracker::new();
        tracker.record(info(100, 0.5)).await;
        tracker.record(info(50, 0.8)).await;
        assert_eq!(tracker.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_total_tokens_saved_accumulates_and_can_be_negative() {
        let tracker = AnalyticsTracker::new();
        tracker.record(info(100, 0.5)).await;
        tracker.record(info(-20, 1.1)).await;
        assert_eq!(tracker.total_tokens_saved().await, 80);
    }

    #[tokio::test]
    async fn test_history_preserves_record_order() {
        let tracker = AnalyticsTracker::new();
        tracker.record(info(1, 1.0)).await;
        tracker.record(info(2, 1.0)).await;
        tracker.record(info(3, 1.0)).await;
        let history = tracker.history().await;
        let saved: Vec<i64> = history.iter().map(|r| r.info.tokens_saved).collect();
        assert_eq!(saved, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_mean_compression_ratio_default_is_one() {
        let tracker = AnalyticsTracker::new();
        assert_eq!(tracker.mean_compression_ratio().await, 1.0);
    }
}
