//! GeoTIFF conversion through `gdal_translate`.

use std::ffi::OsString;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

const GDAL_TRANSLATE: &str = "gdal_translate";

/// How a downloaded file is turned into a granule GeoTIFF.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertConfig {
    /// Assigned spatial reference, e.g. `EPSG:4326`
    #[serde(default)]
    pub srs: Option<String>,
    #[serde(default)]
    pub nodata: Option<f64>,
    /// GeoTIFF creation options, e.g. `COMPRESS=DEFLATE`
    #[serde(default)]
    pub creation_options: Vec<String>,
}

impl ConvertConfig {
    pub fn gdal_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-of".into(), "GTiff".into()];
        if let Some(srs) = &self.srs {
            args.push("-a_srs".into());
            args.push(srs.into());
        }
        if let Some(nodata) = self.nodata {
            args.push("-a_nodata".into());
            args.push(nodata.to_string().into());
        }
        for option in &self.creation_options {
            args.push("-co".into());
            args.push(option.into());
        }
        args.push(input.into());
        args.push(output.into());
        args
    }

    /// Convert `input` into the GeoTIFF `output`.
    pub async fn run(&self, input: &Path, output: &Path) -> Result<()> {
        let args = self.gdal_args(input, output);
        debug!(input = %input.display(), output = %output.display(), "Running gdal_translate");

        let result = Command::new(GDAL_TRANSLATE)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", GDAL_TRANSLATE))?;

        if !result.status.success() {
            bail!(
                "{} failed ({}): {}",
                GDAL_TRANSLATE,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }
        Ok(())
    }
}
