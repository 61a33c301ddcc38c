//! Error types for mosaic lifecycle operations.

use thiserror::Error;

/// Result type alias using MosaicError.
pub type MosaicResult<T> = Result<T, MosaicError>;

/// Errors raised while naming, indexing, removing or publishing granules.
#[derive(Debug, Error)]
pub enum MosaicError {
    // === Naming ===
    #[error("Granule filename does not carry a timestamp: {0}")]
    MalformedName(String),

    #[error("Timestamp has sub-hour components and must be truncated first: {0}")]
    SubHourTimestamp(String),

    // === Index ===
    #[error("Granule index query timed out for layer '{layer}'")]
    IndexQueryTimeout { layer: String },

    #[error("Granule index query failed for layer '{layer}': {message}")]
    IndexQuery { layer: String, message: String },

    // === Mutation ===
    #[error("Failed to delete granule '{id}' from layer '{layer}': {message}")]
    RemoteDeleteFailure {
        layer: String,
        id: String,
        message: String,
    },

    #[error("Mosaic store for layer '{layer}' is still missing after bootstrap")]
    UploadConflict { layer: String },

    #[error("Failed to publish granule to layer '{layer}': {message}")]
    Upload { layer: String, message: String },

    #[error("Failed to bootstrap mosaic store '{layer}': {message}")]
    Bootstrap { layer: String, message: String },

    #[error("Map server request failed: {0}")]
    Remote(String),

    // === Local ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Granule location '{location}' resolves outside layer '{layer}'")]
    UnsafeLocation { layer: String, location: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MosaicError {
    /// Whether the condition is absorbed (logged and treated as empty)
    /// instead of failing the run.
    pub fn is_degradable(&self) -> bool {
        matches!(self, MosaicError::IndexQueryTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeouts_degrade() {
        let timeout = MosaicError::IndexQueryTimeout {
            layer: "gfms_current".to_string(),
        };
        assert!(timeout.is_degradable());

        let delete = MosaicError::RemoteDeleteFailure {
            layer: "gfms_current".to_string(),
            id: "gfms_current.1".to_string(),
            message: "500 Internal Server Error".to_string(),
        };
        assert!(!delete.is_degradable());
        assert!(!MosaicError::MalformedName("x.tif".to_string()).is_degradable());
    }

    #[test]
    fn test_error_messages_name_the_layer() {
        let err = MosaicError::UploadConflict {
            layer: "nasa_gpm_24hr".to_string(),
        };
        assert!(err.to_string().contains("nasa_gpm_24hr"));
    }
}
