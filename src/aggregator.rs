//! # Throttled Aggregator
//! Gates the event stream down to one scoring call per sample interval,
//! keeps the bounded score history, and hands each new sample to the batch
//! and snapshot dispatchers without waiting on them.
//!
//! All state here (window, throttle clock) is owned by one `&mut self`
//! caller: the ingestion loop. Only the batch cache is shared, and that lives
//! behind the dispatcher.

use std::time::Instant;

use chrono::Duration;
use metrics::{counter, gauge, histogram};

use crate::config::{PipelineConfig, ScoringFailurePolicy};
use crate::ingest::types::Event;
use crate::metrics as m;
use crate::scoring::DynScorer;
use crate::sinks::{BatchDispatcher, BatchRow, SnapshotDispatcher};
use crate::throttle::ThrottleClock;
use crate::window::SlidingWindow;

/// What `accept` did with an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// Arrived before the next eligible time; nothing happened.
    Throttled,
    /// The scorer errored; window and cache untouched.
    ScoringFailed,
    /// Scored and dispatched.
    Scored(f64),
}

pub struct Aggregator {
    scorer: DynScorer,
    window: SlidingWindow,
    throttle: ThrottleClock,
    batch: BatchDispatcher,
    snapshot: SnapshotDispatcher,
    on_failure: ScoringFailurePolicy,
}

impl Aggregator {
    pub fn new(
        scorer: DynScorer,
        window_capacity: usize,
        sample_interval: Duration,
        batch: BatchDispatcher,
        snapshot: SnapshotDispatcher,
    ) -> Self {
        m::ensure_described();
        Self {
            scorer,
            window: SlidingWindow::with_capacity(window_capacity),
            throttle: ThrottleClock::new(sample_interval),
            batch,
            snapshot,
            on_failure: ScoringFailurePolicy::default(),
        }
    }

    pub fn from_config(
        cfg: &PipelineConfig,
        scorer: DynScorer,
        batch: BatchDispatcher,
        snapshot: SnapshotDispatcher,
    ) -> Self {
        Self::new(
            scorer,
            cfg.window_capacity(),
            cfg.sample_interval(),
            batch,
            snapshot,
        )
        .with_failure_policy(cfg.on_scoring_failure)
    }

    pub fn with_failure_policy(mut self, policy: ScoringFailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Handle one event. Only the scoring call is awaited; sink I/O runs on
    /// spawned tasks.
    pub async fn accept(&mut self, event: Event) -> Outcome {
        let now = event.received_at;
        if !self.throttle.is_open(now) {
            counter!(m::EVENTS_THROTTLED_TOTAL).increment(1);
            return Outcome::Throttled;
        }

        counter!(m::SCORING_CALLS_TOTAL).increment(1);
        let started = Instant::now();
        let result = self.scorer.score(&event.text).await;
        histogram!(m::SCORING_DURATION_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        let score = match result {
            Ok(s) => s,
            Err(e) => {
                counter!(m::SCORING_ERRORS_TOTAL).increment(1);
                tracing::warn!(scorer = self.scorer.name(), error = ?e, "analyze error");
                if self.on_failure == ScoringFailurePolicy::Advance {
                    self.throttle.advance(now);
                }
                return Outcome::ScoringFailed;
            }
        };
        tracing::info!(score, "sentiment");

        self.window.push(score);
        self.throttle.advance(now);
        gauge!(m::WINDOW_LEN).set(self.window.len() as f64);
        gauge!(m::LAST_SCORE).set(score);

        self.batch.add(BatchRow {
            score,
            timestamp: now,
        });
        self.snapshot.publish(self.window.to_vec(), now);

        Outcome::Scored(score)
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn throttle(&self) -> &ThrottleClock {
        &self.throttle
    }

    pub fn batch(&self) -> &BatchDispatcher {
        &self.batch
    }

    pub fn snapshot(&self) -> &SnapshotDispatcher {
        &self.snapshot
    }
}
