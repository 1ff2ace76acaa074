//! Stream Sentiment — Binary Entrypoint
//! Reads text events from stdin (one per line, plain text or JSON), samples
//! them through the throttled aggregator, and runs until SIGINT/SIGTERM or
//! end of input.

use std::time::Duration;

use anyhow::{Context, Result};
use stream_sentiment::{
    api::{self, AppState},
    build_pipeline,
    config::PipelineConfig,
    ingest::{self, sources::LineSource},
    metrics::Metrics,
};
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How long in-flight scoring may run after the stop signal.
const INGEST_STOP_GRACE: Duration = Duration::from_secs(5);
/// Upper bound for the final best-effort batch flush.
const FINAL_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// `RUST_LOG` filter (default `stream_sentiment=info,warn`); `LOG_FORMAT=json`
/// switches to structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stream_sentiment=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("ctrl-c handler: {e:#}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler: {e:#}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}

fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let res = rt.block_on(run());
    // a blocked stdin read must not hold the process open
    rt.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    res
}

async fn run() -> Result<()> {
    let cfg = PipelineConfig::load_default().context("loading pipeline config")?;
    cfg.log_summary();

    let metrics = Metrics::init()?;
    let pipeline = build_pipeline(&cfg)?;
    let mut aggregator = pipeline.aggregator;
    let batch = aggregator.batch().clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if let Some(addr) = &cfg.server_addr {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        tracing::info!(%addr, "read api listening");
        let state = AppState {
            snapshot: pipeline.snapshot_memory.clone(),
            metrics: Some(metrics.handle.clone()),
        };
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let stop = async move {
                let _ = rx.wait_for(|stop| *stop).await;
            };
            if let Err(e) = api::serve(listener, state, stop).await {
                tracing::warn!("read api stopped: {e:#}");
            }
        });
    }

    let mut ingest_task = tokio::spawn(async move {
        let mut source = LineSource::new(BufReader::new(tokio::io::stdin()));
        ingest::run(&mut source, &mut aggregator, shutdown_rx).await
    });

    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("stopping stream");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(INGEST_STOP_GRACE, &mut ingest_task).await {
                Ok(Ok((stats, _))) => tracing::info!(?stats, "ingestion stopped"),
                Ok(Err(e)) => tracing::warn!("ingestion task failed: {e}"),
                Err(_) => {
                    tracing::warn!("ingestion did not stop in time; abandoning in-flight work");
                    ingest_task.abort();
                }
            }
        }
        res = &mut ingest_task => {
            match res {
                Ok((stats, reason)) => tracing::info!(?stats, ?reason, "input ended"),
                Err(e) => tracing::warn!("ingestion task failed: {e}"),
            }
            let _ = shutdown_tx.send(true);
        }
    }

    match tokio::time::timeout(FINAL_FLUSH_TIMEOUT, batch.flush_pending()).await {
        Ok(Ok(0)) => {}
        Ok(Ok(n)) => tracing::info!(rows = n, "flushed pending rows"),
        Ok(Err(e)) => tracing::warn!("final flush failed: {e:#}"),
        Err(_) => tracing::warn!("final flush timed out"),
    }

    Ok(())
}
