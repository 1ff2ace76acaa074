//! Replace-on-write dispatcher for the latest window snapshot.
//!
//! Every publish runs on its own task. In `Unordered` mode writes may finish
//! out of order, so the stored snapshot can trail by one generation. In
//! `Monotonic` mode each publish carries a sequence number and writes go
//! through an async mutex holding the last stored sequence; anything not
//! newer is skipped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use super::{DynSnapshotSink, SnapshotPayload};
use crate::config::SnapshotOrdering;
use crate::metrics as m;

#[derive(Clone)]
pub struct SnapshotDispatcher {
    sink: DynSnapshotSink,
    ordering: SnapshotOrdering,
    next_seq: Arc<AtomicU64>,
    committed: Arc<AsyncMutex<u64>>,
}

impl SnapshotDispatcher {
    pub fn new(sink: DynSnapshotSink, ordering: SnapshotOrdering) -> Self {
        Self {
            sink,
            ordering,
            next_seq: Arc::new(AtomicU64::new(1)),
            committed: Arc::new(AsyncMutex::new(0)),
        }
    }

    /// Write `window` stamped with `timestamp` in the background.
    pub fn publish(&self, window: Vec<f64>, timestamp: DateTime<Utc>) -> JoinHandle<()> {
        let payload = SnapshotPayload {
            timestamp,
            data: window,
        };
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let sink = self.sink.clone();

        match self.ordering {
            SnapshotOrdering::Unordered => tokio::spawn(async move {
                write_once(&sink, &payload, seq).await;
            }),
            SnapshotOrdering::Monotonic => {
                let committed = self.committed.clone();
                tokio::spawn(async move {
                    let mut last = committed.lock().await;
                    if seq <= *last {
                        counter!(m::SNAPSHOT_STALE_SKIPPED_TOTAL).increment(1);
                        tracing::debug!(seq, committed = *last, "stale snapshot skipped");
                        return;
                    }
                    if write_once(&sink, &payload, seq).await {
                        *last = seq;
                    }
                })
            }
        }
    }

    pub fn ordering(&self) -> SnapshotOrdering {
        self.ordering
    }
}

async fn write_once(sink: &DynSnapshotSink, payload: &SnapshotPayload, seq: u64) -> bool {
    match sink.write(payload).await {
        Ok(()) => {
            counter!(m::SNAPSHOT_WRITES_TOTAL).increment(1);
            tracing::info!(sink = sink.name(), seq, points = payload.data.len(), "snapshot updated");
            true
        }
        Err(e) => {
            counter!(m::SNAPSHOT_WRITE_ERRORS_TOTAL).increment(1);
            tracing::warn!(sink = sink.name(), seq, error = ?e, "snapshot write failed");
            false
        }
    }
}
