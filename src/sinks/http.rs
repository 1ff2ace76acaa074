// src/sinks/http.rs
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;

use super::{BatchRow, BatchSink, SnapshotPayload, SnapshotSink};

/// Readers may cache the snapshot for just under one sample minute.
pub const SNAPSHOT_CACHE_CONTROL: &str = "max-age=59";

fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("stream-sentiment/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(15))
        .build()
        .context("building sink http client")
}

/// `PUT`s the whole payload to an object URL, replacing prior content.
pub struct HttpSnapshotSink {
    url: String,
    bearer_token: Option<String>,
    client: Client,
}

impl HttpSnapshotSink {
    pub fn new(url: String, bearer_token: Option<String>) -> Result<Self> {
        Ok(Self {
            url,
            bearer_token,
            client: http_client()?,
        })
    }
}

#[async_trait::async_trait]
impl SnapshotSink for HttpSnapshotSink {
    async fn write(&self, payload: &SnapshotPayload) -> Result<()> {
        let body = serde_json::to_vec(payload).context("encoding snapshot")?;
        let mut req = self
            .client
            .put(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(CACHE_CONTROL, SNAPSHOT_CACHE_CONTROL)
            .body(body);
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        req.send()
            .await
            .context("snapshot put")?
            .error_for_status()
            .context("snapshot put non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[derive(Serialize)]
struct InsertRow<'a> {
    json: &'a BatchRow,
}

#[derive(Serialize)]
struct InsertAll<'a> {
    rows: Vec<InsertRow<'a>>,
}

fn insert_body(rows: &[BatchRow]) -> InsertAll<'_> {
    InsertAll {
        rows: rows.iter().map(|r| InsertRow { json: r }).collect(),
    }
}

/// `POST`s rows in streaming-insert shape: `{"rows":[{"json":{..}}, ..]}`.
pub struct HttpBatchSink {
    url: String,
    bearer_token: Option<String>,
    client: Client,
}

impl HttpBatchSink {
    pub fn new(url: String, bearer_token: Option<String>) -> Result<Self> {
        Ok(Self {
            url,
            bearer_token,
            client: http_client()?,
        })
    }
}

#[async_trait::async_trait]
impl BatchSink for HttpBatchSink {
    async fn append_rows(&self, rows: &[BatchRow]) -> Result<()> {
        let mut req = self.client.post(&self.url).json(&insert_body(rows));
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        req.send()
            .await
            .context("batch insert")?
            .error_for_status()
            .context("batch insert non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn insert_body_wraps_each_row() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let rows = [
            BatchRow {
                score: 0.3,
                timestamp: ts,
            },
            BatchRow {
                score: -0.1,
                timestamp: ts,
            },
        ];
        let v = serde_json::to_value(insert_body(&rows)).unwrap();
        assert_eq!(v["rows"].as_array().unwrap().len(), 2);
        assert_eq!(v["rows"][0]["json"]["score"], 0.3);
        assert_eq!(v["rows"][1]["json"]["timestamp"], "2024-03-01T08:30:00Z");
    }
}
