use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const EVENTS_TOTAL: &str = "stream_events_total";
pub const EVENTS_THROTTLED_TOTAL: &str = "stream_events_throttled_total";
pub const EVENTS_EMPTY_TOTAL: &str = "stream_events_empty_total";
pub const WARNINGS_TOTAL: &str = "stream_warnings_total";
pub const SCORING_CALLS_TOTAL: &str = "scoring_calls_total";
pub const SCORING_ERRORS_TOTAL: &str = "scoring_errors_total";
pub const SCORING_DURATION_MS: &str = "scoring_duration_ms";
pub const WINDOW_LEN: &str = "sentiment_window_len";
pub const LAST_SCORE: &str = "sentiment_last_score";
pub const SNAPSHOT_WRITES_TOTAL: &str = "snapshot_writes_total";
pub const SNAPSHOT_WRITE_ERRORS_TOTAL: &str = "snapshot_write_errors_total";
pub const SNAPSHOT_STALE_SKIPPED_TOTAL: &str = "snapshot_stale_skipped_total";
pub const BATCH_FLUSHES_TOTAL: &str = "batch_flushes_total";
pub const BATCH_FLUSH_ERRORS_TOTAL: &str = "batch_flush_errors_total";
pub const BATCH_ROWS_DROPPED_TOTAL: &str = "batch_rows_dropped_total";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(EVENTS_TOTAL, "Events delivered by the stream.");
        describe_counter!(
            EVENTS_THROTTLED_TOTAL,
            "Events skipped because the throttle interval had not elapsed."
        );
        describe_counter!(EVENTS_EMPTY_TOTAL, "Events dropped as empty after normalization.");
        describe_counter!(WARNINGS_TOTAL, "Out-of-band warnings from the stream.");
        describe_counter!(SCORING_CALLS_TOTAL, "Scoring calls issued.");
        describe_counter!(SCORING_ERRORS_TOTAL, "Scoring calls that failed.");
        describe_histogram!(SCORING_DURATION_MS, "Scoring call latency in milliseconds.");
        describe_gauge!(WINDOW_LEN, "Scores currently held in the sliding window.");
        describe_gauge!(LAST_SCORE, "Most recent sentiment score.");
        describe_counter!(SNAPSHOT_WRITES_TOTAL, "Successful snapshot writes.");
        describe_counter!(SNAPSHOT_WRITE_ERRORS_TOTAL, "Failed snapshot writes.");
        describe_counter!(
            SNAPSHOT_STALE_SKIPPED_TOTAL,
            "Snapshot writes skipped because a newer generation was already stored."
        );
        describe_counter!(BATCH_FLUSHES_TOTAL, "Successful batch flushes.");
        describe_counter!(BATCH_FLUSH_ERRORS_TOTAL, "Failed batch flushes.");
        describe_counter!(BATCH_ROWS_DROPPED_TOTAL, "Rows discarded by failed flushes.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}
