// src/ingest/mod.rs
pub mod sources;
pub mod types;

use metrics::counter;
use once_cell::sync::OnceCell;
use tokio::sync::watch;

use crate::aggregator::{Aggregator, Outcome};
use crate::metrics as m;
use types::{EventSource, StreamMessage};

/// Character cap applied before scoring.
pub const MAX_TEXT_CHARS: usize = 1500;

/// Normalize text: decode entities, strip tags, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize typographic quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

/// Counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub events: u64,
    pub empty: u64,
    pub warnings: u64,
    pub throttled: u64,
    pub scored: u64,
    pub scoring_failed: u64,
}

/// Why the ingestion loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    SourceClosed,
}

/// Feed `source` into `aggregator` until the stream ends or `shutdown`
/// flips to `true`. The source is stopped on the way out.
pub async fn run<S: EventSource + ?Sized>(
    source: &mut S,
    aggregator: &mut Aggregator,
    mut shutdown: watch::Receiver<bool>,
) -> (IngestStats, StopReason) {
    m::ensure_described();
    let mut stats = IngestStats::default();
    tracing::info!(source = source.name(), "starting stream");

    let reason = loop {
        if *shutdown.borrow() {
            break StopReason::Shutdown;
        }

        let msg = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                // a dropped sender counts as shutdown too
                if changed.is_err() || *shutdown.borrow() {
                    break StopReason::Shutdown;
                }
                continue;
            }
            msg = source.next() => msg,
        };

        let Some(msg) = msg else {
            break StopReason::SourceClosed;
        };

        match msg {
            StreamMessage::Warning(w) => {
                stats.warnings += 1;
                counter!(m::WARNINGS_TOTAL).increment(1);
                tracing::warn!(source = source.name(), warning = %w, "stream warning");
            }
            StreamMessage::Event(mut ev) => {
                stats.events += 1;
                counter!(m::EVENTS_TOTAL).increment(1);
                ev.text = normalize_text(&ev.text);
                if ev.text.is_empty() {
                    stats.empty += 1;
                    counter!(m::EVENTS_EMPTY_TOTAL).increment(1);
                    continue;
                }
                match aggregator.accept(ev).await {
                    Outcome::Throttled => stats.throttled += 1,
                    Outcome::ScoringFailed => stats.scoring_failed += 1,
                    Outcome::Scored(_) => stats.scored += 1,
                }
            }
        }
    };

    tracing::info!(source = source.name(), ?reason, ?stats, "stopping stream");
    source.stop().await;
    (stats, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_ws_and_decodes() {
        let s = "  Hello,&nbsp;&nbsp; <b>world</b>!!  ";
        assert_eq!(normalize_text(s), "Hello, world !!");
    }

    #[test]
    fn normalize_keeps_comparisons_and_quotes() {
        assert_eq!(normalize_text("a < b and c > d"), "a < b and c > d");
        assert_eq!(
            normalize_text("\u{201C}quoted\u{201D} it\u{2019}s"),
            "\"quoted\" it's"
        );
    }

    #[test]
    fn normalize_caps_length() {
        let long = "x".repeat(MAX_TEXT_CHARS + 50);
        assert_eq!(normalize_text(&long).chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        assert!(normalize_text(" \n\t <br/> ").is_empty());
    }
}
