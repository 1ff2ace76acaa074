// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use stream_sentiment::config::SnapshotOrdering;
use stream_sentiment::scoring::Scorer;
use stream_sentiment::sinks::mock::{MockBatchSink, MockSnapshotSink};
use stream_sentiment::{Aggregator, BatchDispatcher, SnapshotDispatcher};

/// Scorer returning queued results in order, recording the texts it saw.
pub struct QueueScorer {
    script: Mutex<VecDeque<Result<f64>>>,
    fallback: Option<f64>,
    pub seen: Mutex<Vec<String>>,
}

impl QueueScorer {
    pub fn new(script: Vec<Result<f64>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Always succeeds with `score` once the script runs dry.
    pub fn constant(score: f64) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(score),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait::async_trait]
impl Scorer for QueueScorer {
    async fn score(&self, text: &str) -> Result<f64> {
        self.seen.lock().push(text.to_string());
        match self.script.lock().pop_front() {
            Some(r) => r,
            None => self.fallback.ok_or_else(|| anyhow!("script exhausted")),
        }
    }

    fn name(&self) -> &'static str {
        "queue"
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

pub struct Harness {
    pub aggregator: Aggregator,
    pub batch_sink: Arc<MockBatchSink>,
    pub snapshot_sink: Arc<MockSnapshotSink>,
}

pub fn harness(
    scorer: Arc<QueueScorer>,
    interval_secs: i64,
    capacity: usize,
    flush_threshold: usize,
    ordering: SnapshotOrdering,
) -> Harness {
    let batch_sink = Arc::new(MockBatchSink::new());
    let snapshot_sink = Arc::new(MockSnapshotSink::new());
    let aggregator = Aggregator::new(
        scorer,
        capacity,
        Duration::seconds(interval_secs),
        BatchDispatcher::new(batch_sink.clone(), flush_threshold),
        SnapshotDispatcher::new(snapshot_sink.clone(), ordering),
    );
    Harness {
        aggregator,
        batch_sink,
        snapshot_sink,
    }
}
