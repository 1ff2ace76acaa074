// src/sinks/file.rs
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{BatchRow, BatchSink, SnapshotPayload, SnapshotSink};

/// Snapshot file replaced atomically (write temp, then rename).
pub struct FileSnapshotSink {
    path: PathBuf,
    tmp_seq: AtomicU64,
}

impl FileSnapshotSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            tmp_seq: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl SnapshotSink for FileSnapshotSink {
    async fn write(&self, payload: &SnapshotPayload) -> Result<()> {
        ensure_parent(&self.path).await?;
        let json = serde_json::to_vec(payload).context("encoding snapshot")?;
        // temp name is unique per write
        let n = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.path.with_extension(format!("json.{n}.tmp"));
        fs::write(&tmp, &json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Newline-delimited JSON file, one row per line, append-only.
pub struct JsonlBatchSink {
    path: PathBuf,
}

impl JsonlBatchSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait::async_trait]
impl BatchSink for JsonlBatchSink {
    async fn append_rows(&self, rows: &[BatchRow]) -> Result<()> {
        ensure_parent(&self.path).await?;
        let mut buf = Vec::with_capacity(rows.len() * 64);
        for r in rows {
            serde_json::to_writer(&mut buf, r).context("encoding row")?;
            buf.push(b'\n');
        }
        // single write per batch; concurrent flushes must not interleave lines
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening {}", self.path.display()))?;
        f.write_all(&buf)
            .await
            .with_context(|| format!("appending to {}", self.path.display()))?;
        f.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
