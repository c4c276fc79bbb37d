//! `galileo` ingest binary.
//!
//! Accepts tracker connections and prints every decoded record to stdout as
//! one JSON object per line. Connection lifecycle goes to the log.

mod cli;

use std::{error::Error, sync::Arc, time::Duration};

use clap::Parser;
use galileo::{
    codec::RecoveryPolicy,
    frame::FramerConfig,
    record::{DeviceRecord, MarkerScan, RecordBoundaryStrategy, TagWalk},
    server::{IngestServer, ServerConfig},
    session::SessionConfig,
    sink::IngestEvent,
    tag::TagRegistry,
};
use serde::Serialize;
use tokio::sync::mpsc;

/// One stdout line.
#[derive(Serialize)]
struct RecordLine<'a> {
    connection: u64,
    #[serde(flatten)]
    record: &'a DeviceRecord,
}

fn server_config(cli: &cli::Cli) -> ServerConfig {
    let boundary: Arc<dyn RecordBoundaryStrategy> = match cli.boundary {
        cli::Boundary::MarkerScan => Arc::new(MarkerScan),
        cli::Boundary::TagWalk => Arc::new(TagWalk),
    };
    let policy = if cli.strict_framing {
        RecoveryPolicy::Disconnect
    } else {
        RecoveryPolicy::Resync
    };
    let session = SessionConfig::default()
        .framer(FramerConfig::default().max_body_length(cli.max_body_length))
        .max_buffered_bytes(cli.max_buffered_bytes)
        .malformed_length_policy(policy)
        .boundary(boundary);
    ServerConfig::default()
        .session(session)
        .read_timeout(Duration::from_secs(cli.read_timeout))
}

async fn print_events(mut rx: mpsc::Receiver<IngestEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            IngestEvent::Connected { connection, peer } => {
                tracing::info!(%connection, ?peer, "tracker connected");
            }
            IngestEvent::Record { connection, record } => {
                let line = RecordLine {
                    connection: connection.as_u64(),
                    record: &record,
                };
                match serde_json::to_string(&line) {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::warn!(%connection, error = %e, "failed to serialise record"),
                }
            }
            IngestEvent::Disconnected { connection, reason } => {
                tracing::info!(%connection, ?reason, "tracker disconnected");
            }
        }
    }
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn Error + Send + Sync>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(%addr, "serving Prometheus metrics");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing::warn!(%addr, "built without the metrics feature; ignoring --metrics-addr");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let tags = match &cli.tags {
        Some(path) => TagRegistry::galileosky_with_file(path)?,
        None => TagRegistry::galileosky(),
    };
    tracing::info!(tags = tags.len(), "tag table loaded");
    if let Some(addr) = cli.metrics_addr {
        install_metrics(addr)?;
    }

    let (tx, rx) = mpsc::channel(1024);
    let printer = tokio::spawn(print_events(rx));
    IngestServer::new(Arc::new(tags), tx)
        .with_config(server_config(&cli))
        .bind(cli.bind)?
        .run()
        .await?;
    printer.await?;
    Ok(())
}
