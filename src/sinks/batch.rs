//! Accumulate-then-flush dispatcher for the durable row store.
//!
//! Rows are cached until `flush_threshold` is reached, then the whole cache
//! is detached under the lock (`mem::take`, never copy-then-clear) and shipped
//! from a spawned task. Rows added while a flush is in flight land in the
//! fresh cache, so overlapping flushes neither lose nor duplicate anything.
//! A failed flush is logged and its rows are dropped (at-most-once).

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use metrics::counter;
use tokio::task::JoinHandle;

use super::{BatchRow, DynBatchSink};
use crate::metrics as m;

#[derive(Clone)]
pub struct BatchDispatcher {
    cache: Arc<Mutex<Vec<BatchRow>>>,
    sink: DynBatchSink,
    flush_threshold: usize,
}

impl BatchDispatcher {
    pub fn new(sink: DynBatchSink, flush_threshold: usize) -> Self {
        let flush_threshold = flush_threshold.max(1);
        Self {
            cache: Arc::new(Mutex::new(Vec::with_capacity(flush_threshold))),
            sink,
            flush_threshold,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BatchRow>> {
        // rows are plain data; a poisoned guard is still consistent
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cache `row`; once the threshold is reached, detach the cache and
    /// flush it in the background. Returns the flush task, if one started.
    pub fn add(&self, row: BatchRow) -> Option<JoinHandle<()>> {
        let detached = {
            let mut cache = self.lock();
            cache.push(row);
            if cache.len() >= self.flush_threshold {
                Some(std::mem::replace(
                    &mut *cache,
                    Vec::with_capacity(self.flush_threshold),
                ))
            } else {
                None
            }
        };
        detached.map(|rows| self.spawn_flush(rows))
    }

    /// Detach whatever is cached and flush it in the background.
    pub fn flush(&self) -> Option<JoinHandle<()>> {
        let rows = self.detach();
        if rows.is_empty() {
            return None;
        }
        Some(self.spawn_flush(rows))
    }

    /// Detach and flush inline. Used for the best-effort drain at shutdown.
    /// Returns the number of rows written.
    pub async fn flush_pending(&self) -> Result<usize> {
        let rows = self.detach();
        if rows.is_empty() {
            return Ok(0);
        }
        let n = rows.len();
        ship(self.sink.clone(), rows).await?;
        Ok(n)
    }

    /// Rows currently cached (not yet detached).
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Copy of the cached rows, oldest first.
    pub fn pending_rows(&self) -> Vec<BatchRow> {
        self.lock().clone()
    }

    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }

    fn detach(&self) -> Vec<BatchRow> {
        std::mem::take(&mut *self.lock())
    }

    fn spawn_flush(&self, rows: Vec<BatchRow>) -> JoinHandle<()> {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            // errors are already logged and counted
            let _ = ship(sink, rows).await;
        })
    }
}

async fn ship(sink: DynBatchSink, rows: Vec<BatchRow>) -> Result<()> {
    let n = rows.len();
    match sink.append_rows(&rows).await {
        Ok(()) => {
            counter!(m::BATCH_FLUSHES_TOTAL).increment(1);
            tracing::info!(sink = sink.name(), rows = n, "batch flushed");
            Ok(())
        }
        Err(e) => {
            counter!(m::BATCH_FLUSH_ERRORS_TOTAL).increment(1);
            counter!(m::BATCH_ROWS_DROPPED_TOTAL).increment(n as u64);
            tracing::warn!(sink = sink.name(), rows = n, error = ?e, "batch flush failed; rows dropped");
            Err(e)
        }
    }
}
