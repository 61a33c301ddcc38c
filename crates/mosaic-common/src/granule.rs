//! Granule records and decoded granules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MosaicResult;
use crate::naming;
use crate::time::ArchiveHour;

/// One entry of a mosaic's granule index, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranuleRecord {
    /// Store-side identifier used to target a delete
    pub id: String,
    /// Filename (or relative path) of the granule file
    pub location: String,
}

impl GranuleRecord {
    pub fn new(id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
        }
    }

    /// Bare filename of the granule, without leading directories.
    pub fn filename(&self) -> &str {
        self.location.rsplit('/').next().unwrap_or(&self.location)
    }
}

/// A timestamped raster image belonging to one mosaic layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Granule {
    pub layer_name: String,
    pub timestamp: DateTime<Utc>,
    pub file_location: String,
    /// Whether the granule falls on one of the layer's archive hours
    pub is_archive_hour: bool,
}

impl Granule {
    /// Decode a granule from an index record.
    pub fn from_record(
        layer_name: &str,
        record: &GranuleRecord,
        archive_hours: &[ArchiveHour],
    ) -> MosaicResult<Self> {
        let timestamp = naming::decode(&record.location)?;
        Ok(Self {
            layer_name: layer_name.to_string(),
            timestamp,
            file_location: record.location.clone(),
            is_archive_hour: archive_hours.iter().any(|h| h.matches(timestamp)),
        })
    }
}
