//! One processing run of a layer.
//!
//! For each candidate time not yet indexed: download, convert, place and
//! publish. Then sweep the layer relative to its newest granule, refresh the
//! tile cache and style when something was published, and clean the layer's
//! scratch files.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use geoserver::GeoServerClient;
use mosaic::{GranuleFiles, MosaicManager};
use mosaic_common::encode;

use crate::config::{LayerConfig, ProcessorSettings};
use crate::download::{DownloadConfig, Downloader};
use crate::template::render_url;

/// Counts from one run of a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: usize,
    pub already_indexed: usize,
    /// Not published upstream yet
    pub unavailable: usize,
    pub ingested: usize,
    /// Downloads or conversions that failed
    pub failed: usize,
    pub removed: usize,
}

enum Candidate {
    AlreadyIndexed,
    Unavailable,
    Failed,
    Published,
}

/// Processes layers against one GeoServer.
pub struct LayerProcessor {
    client: Arc<GeoServerClient>,
    manager: MosaicManager<GeoServerClient>,
    downloader: Downloader,
    tmp_dir: PathBuf,
}

impl LayerProcessor {
    pub fn new(settings: &ProcessorSettings, download: DownloadConfig) -> Result<Self> {
        let client = Arc::new(
            GeoServerClient::new(settings.geoserver.clone())
                .context("Failed to create GeoServer client")?,
        );
        let files = GranuleFiles::new(&settings.data_dir, settings.geoserver.workspace.clone());
        let manager =
            MosaicManager::new(client.clone(), files).with_publish_delay(settings.rsync_wait);
        let downloader = Downloader::new(DownloadConfig {
            output_dir: settings.tmp_dir.clone(),
            ..download
        })?;

        Ok(Self {
            client,
            manager,
            downloader,
            tmp_dir: settings.tmp_dir.clone(),
        })
    }

    /// Run `layer` at `now`. Scratch files are removed whatever the outcome.
    #[instrument(skip(self, layer), fields(layer = %layer.name()))]
    pub async fn run(&self, layer: &LayerConfig, now: DateTime<Utc>) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let result = self.process(layer, now, &mut summary).await;
        self.cleanup_temp(layer.name()).await;
        result.map(|()| summary)
    }

    async fn process(
        &self,
        layer: &LayerConfig,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let name = layer.name();
        let candidates = layer.schedule.candidates(now);
        summary.candidates = candidates.len();

        for ts in candidates {
            match self.ingest_candidate(layer, ts).await? {
                Candidate::AlreadyIndexed => summary.already_indexed += 1,
                Candidate::Unavailable => summary.unavailable += 1,
                Candidate::Failed => summary.failed += 1,
                Candidate::Published => {
                    summary.ingested += 1;
                    counter!("granules_ingested_total", "layer" => name.to_string()).increment(1);
                }
            }
        }

        let mosaic_layer = layer.mosaic_layer();
        let granules = self.manager.granules(name, mosaic_layer.archive_hours()).await?;

        // Sweep relative to the newest granule so the current image survives
        // even when upstream lags behind the wall clock
        match granules.last() {
            Some(newest) => {
                if let Some(report) = self.manager.maintain(&mosaic_layer, newest.timestamp).await? {
                    let removed = report.total().granules_removed;
                    summary.removed = removed;
                    counter!("granules_removed_total", "layer" => name.to_string())
                        .increment(removed as u64);
                }
            }
            None => debug!(layer = %name, "Layer holds no granules, skipping sweep"),
        }

        if summary.ingested > 0 {
            if let Err(e) = self.client.truncate_tile_cache(name).await {
                warn!(layer = %name, error = %e, "Failed to truncate tile cache");
            }
            if let Some(style) = &layer.style {
                if let Err(e) = self.apply_style(name, &style.name, &style.sld_path).await {
                    warn!(layer = %name, style = %style.name, error = %e, "Failed to apply style");
                }
            }
        }

        self.log_layer_summary(layer).await?;

        info!(
            layer = %name,
            candidates = summary.candidates,
            ingested = summary.ingested,
            already_indexed = summary.already_indexed,
            unavailable = summary.unavailable,
            failed = summary.failed,
            removed = summary.removed,
            "Layer run complete"
        );
        Ok(())
    }

    async fn ingest_candidate(&self, layer: &LayerConfig, ts: DateTime<Utc>) -> Result<Candidate> {
        let name = layer.name();
        if !self.manager.should_ingest(name, ts).await? {
            return Ok(Candidate::AlreadyIndexed);
        }

        let url = render_url(&layer.source.url_template, ts)?;
        let download_name = format!("{}_{}.download", name, ts.format("%Y%m%dT%H"));

        let downloaded = match self
            .downloader
            .fetch(&url, &download_name, layer.source.auth.as_ref())
            .await
        {
            Ok(Some(path)) => path,
            Ok(None) => {
                warn!(layer = %name, url = %url, "Granule not available upstream yet");
                return Ok(Candidate::Unavailable);
            }
            Err(e) => {
                warn!(layer = %name, url = %url, error = %e, "Granule download failed");
                counter!("granule_downloads_failed_total", "layer" => name.to_string())
                    .increment(1);
                return Ok(Candidate::Failed);
            }
        };

        let granule = match &layer.convert {
            Some(convert) => {
                let output = self.tmp_dir.join(encode(name, ts)?);
                if let Err(e) = convert.run(&downloaded, &output).await {
                    warn!(layer = %name, error = %e, "Granule conversion failed");
                    return Ok(Candidate::Failed);
                }
                output
            }
            None => downloaded,
        };

        self.manager.publish(name, ts, &granule).await?;
        Ok(Candidate::Published)
    }

    async fn apply_style(&self, layer: &str, style: &str, sld_path: &std::path::Path) -> Result<()> {
        let sld = tokio::fs::read_to_string(sld_path)
            .await
            .with_context(|| format!("Failed to read {}", sld_path.display()))?;
        self.client.ensure_default_style(layer, style, &sld).await?;
        Ok(())
    }

    async fn log_layer_summary(&self, layer: &LayerConfig) -> Result<()> {
        let mosaic_layer = layer.mosaic_layer();
        let granules = self
            .manager
            .granules(layer.name(), mosaic_layer.archive_hours())
            .await?;
        let archived = granules.iter().filter(|g| g.is_archive_hour).count();

        info!(
            layer = %layer.name(),
            granules = granules.len(),
            archive_granules = archived,
            oldest = ?granules.first().map(|g| g.timestamp),
            newest = ?granules.last().map(|g| g.timestamp),
            "Layer granules"
        );
        Ok(())
    }

    /// Remove scratch files belonging to `layer`.
    async fn cleanup_temp(&self, layer: &str) {
        let prefix = format!("{}_", layer);
        let mut entries = match tokio::fs::read_dir(&self.tmp_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.tmp_dir.display(), error = %e, "Failed to read temp directory");
                return;
            }
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let matches = entry
                .file_name()
                .to_str()
                .map(|n| n.starts_with(&prefix))
                .unwrap_or(false);
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if matches && is_file {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to remove temp file"),
                }
            }
        }

        if removed > 0 {
            debug!(layer = %layer, removed = removed, "Cleaned temp files");
        }
    }
}
