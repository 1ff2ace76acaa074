// src/ingest/types.rs
use chrono::{DateTime, Utc};

/// One text item from the stream, stamped with its arrival time.
///
/// `received_at` is taken by the adapter and drives throttling. `sent_at` is
/// whatever the producer claimed and is never trusted for timing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Event {
    pub text: String,
    pub received_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn new(text: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            received_at,
            sent_at: None,
        }
    }

    pub fn with_sent_at(mut self, sent_at: DateTime<Utc>) -> Self {
        self.sent_at = Some(sent_at);
        self
    }

    /// Event arriving right now.
    pub fn now(text: impl Into<String>) -> Self {
        Self::new(text, Utc::now())
    }
}

/// Everything a stream can deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Event(Event),
    /// Out-of-band notice (e.g. the producer falling behind). Logged only.
    Warning(String),
}

/// Push-style stream of text events. `next` yields `None` once the stream ends.
#[async_trait::async_trait]
pub trait EventSource: Send {
    async fn next(&mut self) -> Option<StreamMessage>;
    /// Stop delivering; later `next` calls return `None`.
    async fn stop(&mut self);
    fn name(&self) -> &'static str;
}
