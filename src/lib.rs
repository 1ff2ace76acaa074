// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod scoring;
pub mod sinks;
pub mod throttle;
pub mod window;

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::sinks::memory::MemorySnapshotSink;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{Aggregator, Outcome};
pub use crate::ingest::types::{Event, EventSource, StreamMessage};
pub use crate::sinks::{BatchDispatcher, BatchRow, SnapshotDispatcher, SnapshotPayload};

/// Everything the binary needs after wiring collaborators from config.
pub struct Pipeline {
    pub aggregator: Aggregator,
    /// Set when the snapshot sink is in-memory, for the read API.
    pub snapshot_memory: Option<Arc<MemorySnapshotSink>>,
}

/// Build scorer, sinks, dispatchers and the aggregator from `cfg`.
pub fn build_pipeline(cfg: &PipelineConfig) -> anyhow::Result<Pipeline> {
    let scorer = scoring::build_scorer(&cfg.scorer)?;
    let (snapshot_sink, snapshot_memory) = sinks::build_snapshot_sink(&cfg.snapshot)?;
    let batch_sink = sinks::build_batch_sink(&cfg.batch)?;

    let batch = BatchDispatcher::new(batch_sink, cfg.flush_threshold);
    let snapshot = SnapshotDispatcher::new(snapshot_sink, cfg.snapshot_ordering);
    let aggregator = Aggregator::from_config(cfg, scorer, batch, snapshot);

    tracing::info!(
        scorer = cfg.scorer_name(),
        window_capacity = aggregator.window().capacity(),
        "pipeline built"
    );
    Ok(Pipeline {
        aggregator,
        snapshot_memory,
    })
}
