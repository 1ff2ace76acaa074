// tests/ingest_pipeline.rs
mod common;

use std::time::Duration as StdDuration;

use common::{at, harness, QueueScorer};
use stream_sentiment::config::{
    BatchSinkConfig, PipelineConfig, SnapshotOrdering, SnapshotSinkConfig,
};
use stream_sentiment::ingest::sources::{parse_line, ChannelSource, LineSource};
use stream_sentiment::ingest::{self, StopReason};
use stream_sentiment::{build_pipeline, BatchRow, Event, Outcome, SnapshotPayload, StreamMessage};
use tokio::sync::watch;

#[tokio::test]
async fn warnings_and_empty_events_never_reach_the_scorer() {
    let scorer = QueueScorer::constant(0.5);
    let mut h = harness(scorer.clone(), 20, 3, 100, SnapshotOrdering::Unordered);
    let (tx, mut source) = ChannelSource::channel(16);
    let (_stop_tx, stop_rx) = watch::channel(false);

    tx.send(StreamMessage::Warning("stall: 80% full".into()))
        .await
        .unwrap();
    tx.send(StreamMessage::Event(Event::new("  <p> </p> ", at(0))))
        .await
        .unwrap();
    tx.send(StreamMessage::Event(Event::new("<b>Great</b>&nbsp;news", at(1))))
        .await
        .unwrap();
    tx.send(StreamMessage::Event(Event::new("too soon", at(2))))
        .await
        .unwrap();
    drop(tx);

    let (stats, reason) = ingest::run(&mut source, &mut h.aggregator, stop_rx).await;

    assert_eq!(reason, StopReason::SourceClosed);
    assert_eq!(stats.warnings, 1);
    assert_eq!(stats.events, 3);
    assert_eq!(stats.empty, 1);
    assert_eq!(stats.scored, 1);
    assert_eq!(stats.throttled, 1);
    assert_eq!(scorer.seen.lock().clone(), vec!["Great news"]);
}

#[tokio::test]
async fn shutdown_signal_stops_an_idle_stream() {
    let scorer = QueueScorer::constant(0.1);
    let h = harness(scorer.clone(), 20, 3, 100, SnapshotOrdering::Unordered);
    let mut aggregator = h.aggregator;
    let (tx, mut source) = ChannelSource::channel(4);
    let (stop_tx, stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let out = ingest::run(&mut source, &mut aggregator, stop_rx).await;
        (out, aggregator)
    });

    tx.send(StreamMessage::Event(Event::new("hello", at(0))))
        .await
        .unwrap();
    tokio::time::sleep(StdDuration::from_millis(20)).await;
    stop_tx.send(true).unwrap();

    let ((stats, reason), aggregator) = tokio::time::timeout(StdDuration::from_secs(2), task)
        .await
        .expect("loop exits on shutdown")
        .unwrap();
    assert_eq!(reason, StopReason::Shutdown);
    assert_eq!(stats.scored, 1);
    assert_eq!(aggregator.window().to_vec(), vec![0.1]);

    // the source was stopped: nothing more is accepted
    assert!(tx
        .send(StreamMessage::Event(Event::new("late", at(40))))
        .await
        .is_err());
}

#[tokio::test]
async fn line_input_flows_through_to_file_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("out").join("last_hour.json");
    let rows_path = dir.path().join("out").join("scores.jsonl");

    let cfg = PipelineConfig {
        sample_interval_secs: 20,
        window_capacity: Some(3),
        flush_threshold: 2,
        snapshot: SnapshotSinkConfig::File {
            path: snapshot_path.clone(),
        },
        batch: BatchSinkConfig::Jsonl {
            path: rows_path.clone(),
        },
        ..Default::default()
    };
    let pipeline = build_pipeline(&cfg).unwrap();
    let mut aggregator = pipeline.aggregator;

    // producer stamps are 20s apart, but arrival time is what gates scoring
    let input = concat!(
        r#"{"text":"what a great day","received_at":"2024-06-01T12:00:00Z"}"#,
        "\n",
        "ignored, too soon",
        "\n",
        r#"{"warning":"falling behind"}"#,
        "\n",
        r#"{"text":"this is awful","sent_at":"2024-06-01T12:00:20Z"}"#,
        "\n",
    );
    let started = chrono::Utc::now();
    let mut source = LineSource::new(input.as_bytes());
    let (_stop_tx, stop_rx) = watch::channel(false);
    let (stats, reason) = ingest::run(&mut source, &mut aggregator, stop_rx).await;
    let finished = chrono::Utc::now();
    assert_eq!(reason, StopReason::SourceClosed);
    assert_eq!(stats.scored, 1);
    assert_eq!(stats.throttled, 2);
    assert_eq!(stats.warnings, 1);

    // the batch threshold is not reached; flush what is cached
    assert_eq!(aggregator.batch().flush_pending().await.unwrap(), 1);

    // the snapshot dispatch runs in the background; poll for it
    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(3);
    let snapshot = loop {
        let snap = std::fs::read_to_string(&snapshot_path)
            .ok()
            .and_then(|s| serde_json::from_str::<SnapshotPayload>(&s).ok());
        if let Some(s) = snap {
            break s;
        }
        assert!(tokio::time::Instant::now() < deadline, "snapshot not written");
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    };
    let rows: Vec<BatchRow> = std::fs::read_to_string(&rows_path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(snapshot.data.len(), 1);
    assert!(snapshot.data[0] > 0.0);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].score, snapshot.data[0]);
    assert!(rows[0].timestamp >= started && rows[0].timestamp <= finished);
}

#[tokio::test]
async fn future_dated_line_does_not_stall_scoring() {
    let scorer = QueueScorer::constant(0.1);
    let mut h = harness(scorer.clone(), 20, 3, 100, SnapshotOrdering::Unordered);

    let skewed = r#"{"text":"skewed","received_at":"9999-01-01T00:00:00Z"}"#;
    let Some(StreamMessage::Event(first)) = parse_line(skewed, at(0)) else {
        panic!("expected event");
    };
    assert_eq!(h.aggregator.accept(first).await, Outcome::Scored(0.1));
    assert_eq!(h.aggregator.throttle().next_eligible(), Some(at(20)));

    for k in 1..=99 {
        let line = format!(r#"{{"text":"event {k}"}}"#);
        let Some(StreamMessage::Event(ev)) = parse_line(&line, at(60 * k)) else {
            panic!("expected event");
        };
        assert_eq!(h.aggregator.accept(ev).await, Outcome::Scored(0.1), "event {k}");
    }
    assert_eq!(scorer.calls(), 100);
}

#[tokio::test]
async fn in_memory_snapshot_is_exposed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = PipelineConfig {
        snapshot: SnapshotSinkConfig::Memory,
        batch: BatchSinkConfig::Jsonl {
            path: dir.path().join("rows.jsonl"),
        },
        ..Default::default()
    };
    let pipeline = build_pipeline(&cfg).unwrap();
    let mem = pipeline.snapshot_memory.clone().expect("memory sink");
    let mut aggregator = pipeline.aggregator;

    aggregator.accept(Event::new("happy", at(0))).await;

    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(2);
    while mem.latest().is_none() {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
    let latest = mem.latest().unwrap();
    assert_eq!(latest.data.len(), 1);
    assert_eq!(latest.timestamp, at(0));
}
