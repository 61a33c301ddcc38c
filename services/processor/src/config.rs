//! Processor settings and per-layer configuration.
//!
//! Settings come from the environment; layers are loaded from YAML files in
//! `{config_dir}/layers/`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use geoserver::GeoServerConfig;
use mosaic::MosaicLayer;
use mosaic_common::truncate_to_hour;
use retention::RetentionPolicy;

use crate::convert::ConvertConfig;

/// Runtime settings shared by every layer.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub geoserver: GeoServerConfig,
    /// Map server data directory; granules live under `{data_dir}/data/{ws}/{layer}`
    pub data_dir: PathBuf,
    /// Scratch directory for downloads and conversions
    pub tmp_dir: PathBuf,
    /// Wait between placing a granule and publishing it
    pub rsync_wait: Duration,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            geoserver: GeoServerConfig::default(),
            data_dir: PathBuf::from("/data/geodata"),
            tmp_dir: PathBuf::from("/tmp"),
            rsync_wait: Duration::ZERO,
        }
    }
}

impl ProcessorSettings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            geoserver: GeoServerConfig::from_env(),
            data_dir: std::env::var("GS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            tmp_dir: std::env::var("GS_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.tmp_dir),
            rsync_wait: std::env::var("RSYNC_WAIT_TIME")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.rsync_wait),
        }
    }
}

/// Root configuration loaded from a layer YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    pub layer: LayerInfo,
    pub source: SourceConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub convert: Option<ConvertConfig>,
    #[serde(default)]
    pub retention: Option<RetentionPolicy>,
    #[serde(default)]
    pub style: Option<StyleConfig>,
}

/// Layer identification.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerInfo {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Where granules are fetched from.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// URL with `{ts:<strftime>}` placeholders
    pub url_template: String,
    #[serde(default)]
    pub auth: Option<SourceAuth>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceAuth {
    pub user: String,
    pub password: String,
}

/// Publication cadence of the upstream product.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between runs
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Hours between consecutive granules
    #[serde(default = "default_cadence")]
    pub cadence_hours: u32,
    /// How far back to look for granules not ingested yet
    #[serde(default = "default_lookback")]
    pub lookback_hours: u32,
    /// Hours after the granule time that it becomes available upstream
    #[serde(default)]
    pub delay_hours: u32,
}

fn default_interval() -> u64 {
    3600
}

fn default_cadence() -> u32 {
    1
}

fn default_lookback() -> u32 {
    24
}

/// Upper bound for `lookback_hours` and `delay_hours`.
const MAX_SCHEDULE_HOURS: u32 = 24 * 366;

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            cadence_hours: default_cadence(),
            lookback_hours: default_lookback(),
            delay_hours: 0,
        }
    }
}

impl ScheduleConfig {
    /// Granule times worth trying at `now`, oldest first.
    ///
    /// The newest candidate is `now - delay_hours` aligned down to the
    /// cadence; older ones step back by the cadence while they stay within
    /// the lookback.
    pub fn candidates(&self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let cadence = ChronoDuration::hours(i64::from(self.cadence_hours.max(1)));
        let Some(delayed) = now.checked_sub_signed(ChronoDuration::hours(i64::from(self.delay_hours)))
        else {
            return Vec::new();
        };
        let latest = truncate_to_hour(delayed);
        let misalignment = (latest.timestamp() / 3600).rem_euclid(cadence.num_hours());
        let Some(latest) = latest.checked_sub_signed(ChronoDuration::hours(misalignment)) else {
            return Vec::new();
        };
        let earliest = latest
            .checked_sub_signed(ChronoDuration::hours(i64::from(self.lookback_hours)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut candidates = Vec::new();
        let mut next = Some(latest);
        while let Some(ts) = next.filter(|ts| *ts >= earliest) {
            candidates.push(ts);
            next = ts.checked_sub_signed(cadence);
        }
        candidates.reverse();
        candidates
    }
}

/// Default style applied to the layer.
#[derive(Debug, Clone, Deserialize)]
pub struct StyleConfig {
    pub name: String,
    /// SLD file, relative to the config directory
    pub sld_path: PathBuf,
}

impl LayerConfig {
    pub fn name(&self) -> &str {
        &self.layer.name
    }

    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_secs)
    }

    pub fn mosaic_layer(&self) -> MosaicLayer {
        MosaicLayer::new(self.layer.name.clone(), self.retention.clone())
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.layer.name.is_empty(), "layer.name must not be empty");
        anyhow::ensure!(
            self.source.url_template.contains("{ts:"),
            "source.url_template of '{}' has no {{ts:...}} placeholder",
            self.layer.name
        );
        anyhow::ensure!(
            self.schedule.cadence_hours > 0,
            "schedule.cadence_hours of '{}' must be positive",
            self.layer.name
        );
        anyhow::ensure!(
            self.schedule.lookback_hours <= MAX_SCHEDULE_HOURS
                && self.schedule.delay_hours <= MAX_SCHEDULE_HOURS,
            "schedule of '{}' reaches back more than {} hours",
            self.layer.name,
            MAX_SCHEDULE_HOURS
        );
        Ok(())
    }
}

/// Load all layer configurations from `{config_dir}/layers/*.yaml`.
///
/// Style paths are resolved against `config_dir`.
pub fn load_layer_configs(config_dir: &Path) -> Result<Vec<LayerConfig>> {
    let layers_dir = config_dir.join("layers");

    if !layers_dir.exists() {
        warn!(path = %layers_dir.display(), "Layers config directory not found");
        return Ok(Vec::new());
    }

    let mut configs = Vec::new();

    for entry in std::fs::read_dir(&layers_dir)
        .with_context(|| format!("Failed to read {}", layers_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.extension().map(|e| e == "yaml" || e == "yml").unwrap_or(false) {
            debug!(path = %path.display(), "Loading layer config");

            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let mut config: LayerConfig = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            config
                .validate()
                .with_context(|| format!("Invalid layer config {}", path.display()))?;

            if let Some(style) = config.style.as_mut() {
                style.sld_path = config_dir.join(&style.sld_path);
            }

            info!(
                layer = %config.layer.name,
                title = %config.layer.title,
                enabled = config.layer.enabled,
                retention = config.retention.is_some(),
                "Loaded layer config"
            );

            configs.push(config);
        }
    }

    // Sort by name for consistent ordering
    configs.sort_by(|a, b| a.layer.name.cmp(&b.layer.name));

    Ok(configs)
}
