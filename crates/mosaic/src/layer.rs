//! Mosaic layer definition.

use retention::RetentionPolicy;
use mosaic_common::ArchiveHour;

/// A named raster time series and how long its granules are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicLayer {
    pub name: String,
    /// `None` for layers that are never swept (static archives)
    pub retention: Option<RetentionPolicy>,
}

impl MosaicLayer {
    pub fn new(name: impl Into<String>, retention: Option<RetentionPolicy>) -> Self {
        Self {
            name: name.into(),
            retention,
        }
    }

    pub fn archive_hours(&self) -> &[ArchiveHour] {
        self.retention
            .as_ref()
            .map(|r| r.archive_hours.as_slice())
            .unwrap_or(&[])
    }
}
