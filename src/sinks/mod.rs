//! Output side: sink traits, wire types, and the two dispatchers that feed
//! them off the ingestion path.

pub mod batch;
pub mod file;
pub mod http;
pub mod memory;
pub mod mock;
pub mod snapshot;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{BatchSinkConfig, SnapshotSinkConfig};

pub use batch::BatchDispatcher;
pub use snapshot::SnapshotDispatcher;

/// Full window state, written wholesale (replace, not merge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub timestamp: DateTime<Utc>,
    /// Oldest first.
    pub data: Vec<f64>,
}

/// One scored sample for the append-only store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchRow {
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

/// Last-write-wins destination for the current window.
#[async_trait::async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn write(&self, payload: &SnapshotPayload) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Append-only destination for scored rows.
#[async_trait::async_trait]
pub trait BatchSink: Send + Sync {
    async fn append_rows(&self, rows: &[BatchRow]) -> Result<()>;
    fn name(&self) -> &'static str;
}

pub type DynSnapshotSink = Arc<dyn SnapshotSink>;
pub type DynBatchSink = Arc<dyn BatchSink>;

/// Build the configured snapshot sink. The in-memory sink is also returned
/// separately so the read API can serve it.
pub fn build_snapshot_sink(
    cfg: &SnapshotSinkConfig,
) -> Result<(DynSnapshotSink, Option<Arc<memory::MemorySnapshotSink>>)> {
    let mut readable = None;
    let sink: DynSnapshotSink = match cfg {
        SnapshotSinkConfig::File { path } => Arc::new(file::FileSnapshotSink::new(path.clone())),
        SnapshotSinkConfig::Http { url, bearer_token } => Arc::new(http::HttpSnapshotSink::new(
            url.clone(),
            bearer_token.clone(),
        )?),
        SnapshotSinkConfig::Memory => {
            let mem = Arc::new(memory::MemorySnapshotSink::new());
            readable = Some(mem.clone());
            mem
        }
    };
    Ok((sink, readable))
}

pub fn build_batch_sink(cfg: &BatchSinkConfig) -> Result<DynBatchSink> {
    let sink: DynBatchSink = match cfg {
        BatchSinkConfig::Jsonl { path } => Arc::new(file::JsonlBatchSink::new(path.clone())),
        BatchSinkConfig::Http { url, bearer_token } => Arc::new(http::HttpBatchSink::new(
            url.clone(),
            bearer_token.clone(),
        )?),
    };
    Ok(sink)
}
