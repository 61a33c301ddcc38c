//! Raster mosaic processor service.
//!
//! Keeps time-enabled GeoServer image mosaics current:
//! - Downloads new granules from each layer's upstream source
//! - Converts them to GeoTIFF and publishes them (creating mosaics on demand)
//! - Prunes superseded and expired granules by each layer's retention policy
//! - Refreshes tile caches and default styles

mod config;
mod convert;
mod download;
mod pipeline;
mod scheduler;
mod template;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::ProcessorSettings;
use download::DownloadConfig;
use pipeline::LayerProcessor;
use scheduler::Scheduler;

#[derive(Parser, Debug)]
#[command(name = "processor")]
#[command(about = "Publishes and prunes time-enabled raster mosaics")]
struct Args {
    /// Run once and exit (vs continuous scheduling)
    #[arg(long)]
    once: bool,

    /// Specific layer to process (default: all configured)
    #[arg(short, long)]
    layer: Option<String>,

    /// Configuration directory (contains layers/*.yaml)
    #[arg(long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Maximum download retry attempts
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting mosaic processor");

    if let Some(port) = args.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(addr = %addr, "Serving metrics");
    }

    let settings = ProcessorSettings::from_env();
    info!(
        geoserver = %settings.geoserver.url,
        workspace = %settings.geoserver.workspace,
        data_dir = %settings.data_dir.display(),
        tmp_dir = %settings.tmp_dir.display(),
        "Loaded settings"
    );
    tokio::fs::create_dir_all(&settings.tmp_dir).await?;

    let mut layers = config::load_layer_configs(&args.config_dir)?;
    if let (Some(name), false) = (&args.layer, args.once) {
        layers.retain(|l| l.name() == name);
    }
    if layers.is_empty() {
        info!(config_dir = %args.config_dir.display(), "No layers configured");
    }

    let download = DownloadConfig {
        max_retries: args.max_retries,
        initial_retry_delay: Duration::from_secs(2),
        ..Default::default()
    };
    let processor = LayerProcessor::new(&settings, download)?;
    let scheduler = Scheduler::new(processor, layers);

    if args.once {
        // Single run mode
        info!("Running single processing cycle");

        if let Some(layer) = &args.layer {
            scheduler.run_layer(layer).await?;
        } else {
            scheduler.run_all().await?;
        }
    } else {
        // Continuous mode
        info!("Starting continuous scheduling");

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let shutdown_rx = shutdown_tx.subscribe();

        // Handle Ctrl+C
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            shutdown_tx.send(()).ok();
        });

        scheduler.run_forever(shutdown_rx).await?;
    }

    info!("Mosaic processor stopped");
    Ok(())
}
