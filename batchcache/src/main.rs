use std::sync::Arc;

use anyhow::Context;
use batchcache::{
    BatchCache, CliArgs, Config, InMemoryWriterFactory, PutLine, is_ignorable, load_config,
};
use clap::Parser;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct IngestStats {
    lines: u64,
    written: u64,
    rejected: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log level comes from RUST_LOG, defaulting to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => {
            let config = load_config(path)
                .with_context(|| format!("failed to load configuration from {}", path))?;
            tracing::info!("Loaded configuration from {}", path);
            config
        }
        None => {
            tracing::info!("No configuration file provided, using defaults");
            Config::default()
        }
    };
    if let Some(flush_mode) = args.flush_mode {
        config.flush_mode = flush_mode;
    }

    let sink = InMemoryWriterFactory::new();
    let cache = BatchCache::open(config, Arc::new(sink.clone()))?;
    let mut registry = Registry::default();
    cache.register_metrics(&mut registry);

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut stats = IngestStats::default();
    tokio::select! {
        result = ingest(&cache, input, &mut stats) => {
            result?;
            tracing::info!("Reached end of input");
        }
        _ = shutdown_signal() => {}
    }

    let summary = cache.shutdown().await?;
    tracing::info!(
        buckets = summary.buckets,
        lines = stats.lines,
        written = stats.written,
        rejected = stats.rejected,
        windows = sink.windows().len(),
        points = sink.point_count(),
        "Ingestion complete"
    );

    let mut metrics = String::new();
    encode(&mut metrics, &registry).context("failed to encode metrics")?;
    print!("{}", metrics);
    Ok(())
}

/// Writes every put line from `input` through the cache. Bad lines and
/// rejected writes are logged and skipped.
async fn ingest<R>(cache: &BatchCache, input: R, stats: &mut IngestStats) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        stats.lines += 1;
        if is_ignorable(&line) {
            continue;
        }

        let put = match PutLine::parse(&line) {
            Ok(put) => put,
            Err(e) => {
                stats.rejected += 1;
                tracing::warn!(line = stats.lines, error = %e, "Skipping unparseable line");
                continue;
            }
        };

        match cache
            .write(&put.metric, put.tags, put.timestamp, &put.value)
            .await
        {
            Ok(_) => stats.written += 1,
            Err(e) => {
                stats.rejected += 1;
                tracing::warn!(line = stats.lines, error = %e, "Write rejected");
            }
        }
    }
    Ok(())
}

/// Listen for SIGTERM and SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
