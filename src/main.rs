//! continuity-plane daemon.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                   CONTROL PLANE                      │
//!                 │                                                      │
//!   dependencies  │  ┌──────────────┐           ┌──────────────────┐     │
//!   ◀─── probe ───┼──│HealthMonitor │           │RedundancyManager │─────┼──▶ pools
//!                 │  └──────┬───────┘           └────────┬─────────┘     │   (primary /
//!                 │         │                            │               │    secondary)
//!                 │         ▼                            ▼               │
//!                 │  ┌─────────────────────────────────────────────┐     │
//!                 │  │                  EventBus                   │─────┼──▶ event log
//!                 │  └─────────────────────────────────────────────┘     │
//!                 │         ▲                            ▲               │
//!                 │         │                            │               │
//!   node groups   │  ┌──────┴───────────────┐   ┌────────┴─────────┐     │
//!   ◀─────────────┼──│HighAvailabilityManager│  │MultiRegionEngine │─────┼──▶ regions
//!                 │  └──────────────────────┘   └──────────────────┘     │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::broadcast::error::RecvError;

use continuity_plane::config::loader::load_config;
use continuity_plane::lifecycle::{wait_for_shutdown_signal, ControlPlane};
use continuity_plane::observability::{logging, metrics};
use continuity_plane::probe::{HttpProbe, Probe, TcpProbe};
use continuity_plane::ContinuityConfig;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProbeKind {
    /// Open a TCP connection to `host:port`
    Tcp,
    /// GET a health path and expect a 2xx
    Http,
}

#[derive(Parser)]
#[command(name = "continuity-plane")]
#[command(about = "Operational continuity control plane", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How dependency, instance, and region endpoints are probed
    #[arg(long, value_enum, default_value = "tcp")]
    probe: ProbeKind,

    /// Path requested by the HTTP probe
    #[arg(long, default_value = "/health")]
    http_path: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ContinuityConfig::default(),
    };

    if !logging::init_logging(&config.observability) {
        eprintln!("tracing subscriber already installed");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        probe = ?cli.probe,
        "continuity-plane starting"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let probe: Arc<dyn Probe> = match cli.probe {
        ProbeKind::Tcp => Arc::new(TcpProbe::new()),
        ProbeKind::Http => Arc::new(HttpProbe::new(cli.http_path.clone())),
    };
    // The daemon has no replication feed of its own; embedders with one call
    // ControlPlane::build with their Replicator.
    let mut plane = ControlPlane::without_replication(config, probe);

    let mut events = plane.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => tracing::info!(event = %json, "Control event"),
                    Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    plane.start().await;
    wait_for_shutdown_signal().await;
    plane.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
