// src/sinks/mock.rs
// Recording sinks for tests and dry runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::Semaphore;

use super::{BatchRow, BatchSink, SnapshotPayload, SnapshotSink};

/// Records every successful `append_rows` call.
/// Optionally gated: calls wait for [`MockBatchSink::release`] before completing.
pub struct MockBatchSink {
    calls: Mutex<Vec<Vec<BatchRow>>>,
    fail_remaining: AtomicUsize,
    gate: Option<Semaphore>,
}

impl MockBatchSink {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_remaining: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Every call blocks until a permit is released.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    /// Let `n` blocked calls proceed.
    pub fn release(&self, n: usize) {
        if let Some(g) = &self.gate {
            g.add_permits(n);
        }
    }

    /// Fail the next `n` calls.
    pub fn fail_next(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Vec<BatchRow>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// All rows received so far, flattened in call order.
    pub fn rows(&self) -> Vec<BatchRow> {
        self.calls().into_iter().flatten().collect()
    }

    /// Poll until at least `n` calls were recorded or `timeout` passes.
    pub async fn wait_for_calls(&self, n: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.calls().len() >= n).await
    }
}

impl Default for MockBatchSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BatchSink for MockBatchSink {
    async fn append_rows(&self, rows: &[BatchRow]) -> Result<()> {
        if let Some(g) = &self.gate {
            g.acquire().await.map_err(|e| anyhow!("gate closed: {e}"))?.forget();
        }
        if take_failure(&self.fail_remaining) {
            return Err(anyhow!("mock batch sink failure"));
        }
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(rows.to_vec());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Records every successful snapshot write. Per-call delays can be queued to
/// force out-of-order completion.
pub struct MockSnapshotSink {
    writes: Mutex<Vec<SnapshotPayload>>,
    fail_remaining: AtomicUsize,
    delays: Mutex<VecDeque<Duration>>,
}

impl MockSnapshotSink {
    pub fn new() -> Self {
        Self {
            writes: Mutex::new(Vec::new()),
            fail_remaining: AtomicUsize::new(0),
            delays: Mutex::new(VecDeque::new()),
        }
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Delays applied to subsequent writes, in call order.
    pub fn push_delays(&self, delays: impl IntoIterator<Item = Duration>) {
        self.delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(delays);
    }

    pub fn writes(&self) -> Vec<SnapshotPayload> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last(&self) -> Option<SnapshotPayload> {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    pub async fn wait_for_writes(&self, n: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.writes().len() >= n).await
    }
}

impl Default for MockSnapshotSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SnapshotSink for MockSnapshotSink {
    async fn write(&self, payload: &SnapshotPayload) -> Result<()> {
        let delay = self
            .delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if take_failure(&self.fail_remaining) {
            return Err(anyhow!("mock snapshot sink failure"));
        }
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(payload.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

async fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if done() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
