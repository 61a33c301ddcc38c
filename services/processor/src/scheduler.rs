//! Layer scheduler with per-layer run intervals.
//!
//! Layers run one at a time; a layer's next run never overlaps its previous
//! one.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::counter;
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use crate::config::LayerConfig;
use crate::pipeline::{LayerProcessor, RunSummary};

/// How often the scheduler checks for due layers.
const TICK: Duration = Duration::from_secs(60);

pub struct Scheduler {
    processor: LayerProcessor,
    layers: Vec<LayerConfig>,
}

impl Scheduler {
    pub fn new(processor: LayerProcessor, layers: Vec<LayerConfig>) -> Self {
        Self { processor, layers }
    }

    /// Run every enabled layer once. A failed layer does not stop the
    /// others, but the batch fails if any layer did.
    pub async fn run_all(&self) -> Result<()> {
        let mut total = 0;
        let mut failed = Vec::new();
        for layer in self.layers.iter().filter(|l| l.layer.enabled) {
            total += 1;
            if !self.run_config(layer).await {
                failed.push(layer.name());
            }
        }

        if !failed.is_empty() {
            anyhow::bail!(
                "{} of {} layers failed: {}",
                failed.len(),
                total,
                failed.join(", ")
            );
        }
        Ok(())
    }

    /// Run a single layer by name.
    #[instrument(skip(self))]
    pub async fn run_layer(&self, name: &str) -> Result<RunSummary> {
        let layer = self
            .layers
            .iter()
            .find(|l| l.name() == name)
            .with_context(|| format!("Layer '{}' not found", name))?;

        if !layer.layer.enabled {
            info!(layer = %name, "Layer is disabled, skipping");
            return Ok(RunSummary::default());
        }

        self.processor.run(layer, Utc::now()).await
    }

    /// Returns `false` if the run failed.
    async fn run_config(&self, layer: &LayerConfig) -> bool {
        info!(layer = %layer.name(), "Running layer");
        match self.processor.run(layer, Utc::now()).await {
            Ok(_) => true,
            Err(e) => {
                counter!("processor_runs_failed_total", "layer" => layer.name().to_string())
                    .increment(1);
                error!(layer = %layer.name(), error = %e, "Layer run failed");
                false
            }
        }
    }

    /// Run layers on their intervals until shutdown.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        // Track last run time per layer
        let mut last_run: HashMap<String, Instant> = HashMap::new();

        loop {
            for layer in &self.layers {
                if !layer.layer.enabled {
                    continue;
                }

                let due = match last_run.get(layer.name()) {
                    None => true,
                    Some(t) => t.elapsed() >= layer.run_interval(),
                };

                if due {
                    self.run_config(layer).await;
                    last_run.insert(layer.name().to_string(), Instant::now());
                }
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down scheduler");
                    break;
                }
                _ = tokio::time::sleep(TICK) => {}
            }
        }

        Ok(())
    }
}
