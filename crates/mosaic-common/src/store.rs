//! Interface to the external mosaic store.

use std::path::Path;

use async_trait::async_trait;

use crate::error::MosaicResult;
use crate::granule::GranuleRecord;
use crate::selection::GranuleSelection;

/// Remote side of a mosaic: the granule index and the publication endpoint.
///
/// Implementations report a query that exceeded its time bound as
/// [`crate::MosaicError::IndexQueryTimeout`]; callers decide whether to
/// degrade it.
#[async_trait]
pub trait MosaicStore: Send + Sync {
    /// List indexed granules of `layer`, optionally restricted to `selection`.
    ///
    /// A layer that does not exist yet has no granules.
    async fn list_granules(
        &self,
        layer: &str,
        selection: Option<&GranuleSelection>,
    ) -> MosaicResult<Vec<GranuleRecord>>;

    /// Delete one granule's index record.
    async fn delete_granule(&self, layer: &str, id: &str) -> MosaicResult<()>;

    /// Announce a granule file, already in place on the map server's data
    /// directory, to the layer's mosaic.
    async fn publish_granule(&self, layer: &str, path: &Path) -> MosaicResult<()>;
}
