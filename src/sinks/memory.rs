use std::sync::RwLock;

use anyhow::Result;

use super::{SnapshotPayload, SnapshotSink};

/// Keeps the latest snapshot in process for the `/snapshot` endpoint.
#[derive(Debug, Default)]
pub struct MemorySnapshotSink {
    latest: RwLock<Option<SnapshotPayload>>,
}

impl MemorySnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<SnapshotPayload> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl SnapshotSink for MemorySnapshotSink {
    async fn write(&self, payload: &SnapshotPayload) -> Result<()> {
        *self.latest.write().unwrap_or_else(|e| e.into_inner()) = Some(payload.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
