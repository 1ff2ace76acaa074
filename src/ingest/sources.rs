// src/ingest/sources.rs
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;

use super::types::{Event, EventSource, StreamMessage};

/// Accepted JSON line shapes. Anything that is not JSON is taken as plain text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireLine {
    Warning {
        warning: String,
    },
    Event {
        text: String,
        #[serde(default, alias = "received_at")]
        sent_at: Option<DateTime<Utc>>,
    },
}

/// Parse one input line received at `now`; blank lines yield `None`.
/// A producer timestamp is kept as `sent_at` only.
pub fn parse_line(line: &str, now: DateTime<Utc>) -> Option<StreamMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') {
        if let Ok(wire) = serde_json::from_str::<WireLine>(trimmed) {
            return Some(match wire {
                WireLine::Warning { warning } => StreamMessage::Warning(warning),
                WireLine::Event { text, sent_at } => {
                    let event = Event::new(text, now);
                    StreamMessage::Event(match sent_at {
                        Some(ts) => event.with_sent_at(ts),
                        None => event,
                    })
                }
            });
        }
    }
    Some(StreamMessage::Event(Event::new(trimmed, now)))
}

/// Line-oriented source over any async reader (stdin, a file, a socket).
pub struct LineSource<R> {
    lines: Option<Lines<R>>,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Some(reader.lines()),
        }
    }
}

#[async_trait::async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for LineSource<R> {
    async fn next(&mut self) -> Option<StreamMessage> {
        loop {
            let lines = self.lines.as_mut()?;
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(msg) = parse_line(&line, Utc::now()) {
                        return Some(msg);
                    }
                }
                Ok(None) => {
                    self.lines = None;
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "line source read failed; closing");
                    self.lines = None;
                    return None;
                }
            }
        }
    }

    async fn stop(&mut self) {
        self.lines = None;
    }

    fn name(&self) -> &'static str {
        "lines"
    }
}

/// Source fed in-process through a bounded channel.
pub struct ChannelSource {
    rx: mpsc::Receiver<StreamMessage>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<StreamMessage>) -> Self {
        Self { rx }
    }

    /// Channel pair with the given buffer size.
    pub fn channel(buffer: usize) -> (mpsc::Sender<StreamMessage>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait::async_trait]
impl EventSource for ChannelSource {
    async fn next(&mut self) -> Option<StreamMessage> {
        self.rx.recv().await
    }

    async fn stop(&mut self) {
        self.rx.close();
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn parse_line_variants() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(parse_line("   ", now), None);
        assert_eq!(
            parse_line("hello there", now),
            Some(StreamMessage::Event(Event::new("hello there", now)))
        );
        assert_eq!(
            parse_line(r#"{"warning":"falling behind"}"#, now),
            Some(StreamMessage::Warning("falling behind".into()))
        );
        assert_eq!(
            parse_line(
                r#"{"text":"hi","received_at":"2024-02-02T10:00:00Z"}"#,
                now
            ),
            Some(StreamMessage::Event(
                Event::new("hi", now).with_sent_at(Utc.with_ymd_and_hms(2024, 2, 2, 10, 0, 0).unwrap())
            ))
        );
        // a far-future producer stamp never becomes the arrival time
        let Some(StreamMessage::Event(e)) = parse_line(
            r#"{"text":"skewed","sent_at":"9999-01-01T00:00:00Z"}"#,
            now,
        ) else {
            panic!("expected event");
        };
        assert_eq!(e.received_at, now);
        assert_eq!(e.sent_at.map(|t| t.year()), Some(9999));
        // JSON that fits neither shape is plain text
        assert_eq!(
            parse_line(r#"{"foo":1}"#, now),
            Some(StreamMessage::Event(Event::new(r#"{"foo":1}"#, now)))
        );
    }

    #[tokio::test]
    async fn line_source_skips_blanks_and_ends() {
        let input: &[u8] = b"first\n\n{\"warning\":\"stall\"}\nsecond\n";
        let mut src = LineSource::new(input);

        assert!(matches!(src.next().await, Some(StreamMessage::Event(e)) if e.text == "first"));
        assert_eq!(
            src.next().await,
            Some(StreamMessage::Warning("stall".into()))
        );
        assert!(matches!(src.next().await, Some(StreamMessage::Event(e)) if e.text == "second"));
        assert_eq!(src.next().await, None);
        assert_eq!(src.next().await, None);
    }

    #[tokio::test]
    async fn stopped_sources_yield_nothing() {
        let input: &[u8] = b"a\nb\n";
        let mut src = LineSource::new(input);
        src.stop().await;
        assert_eq!(src.next().await, None);

        let (tx, mut ch) = ChannelSource::channel(4);
        tx.send(StreamMessage::Warning("w".into())).await.unwrap();
        ch.stop().await;
        // buffered message still drains, then closed
        assert!(ch.next().await.is_some());
        assert_eq!(ch.next().await, None);
        assert!(tx.send(StreamMessage::Warning("late".into())).await.is_err());
    }
}
