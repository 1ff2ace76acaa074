pub mod pipeline;

pub use pipeline::{
    BatchSinkConfig, PipelineConfig, ScorerConfig, ScoringFailurePolicy, SnapshotOrdering,
    SnapshotSinkConfig,
};
