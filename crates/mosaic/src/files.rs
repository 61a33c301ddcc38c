//! Granule files on the map server's data directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::debug;

use mosaic_common::{MosaicError, MosaicResult};

/// Resolves and mutates granule files under
/// `{data_dir}/data/{workspace}/{layer}/{file}`.
#[derive(Debug, Clone)]
pub struct GranuleFiles {
    data_dir: PathBuf,
    workspace: String,
}

impl GranuleFiles {
    pub fn new(data_dir: impl Into<PathBuf>, workspace: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            workspace: workspace.into(),
        }
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn layer_dir(&self, layer: &str) -> PathBuf {
        self.data_dir.join("data").join(&self.workspace).join(layer)
    }

    /// Path of a granule given its index location. Locations must stay
    /// inside the layer directory: no `..` components, and absolute ones
    /// must already point under it.
    pub fn granule_path(&self, layer: &str, location: &str) -> MosaicResult<PathBuf> {
        let layer_dir = self.layer_dir(layer);
        let location_path = Path::new(location);

        let escapes = location_path
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        let path = layer_dir.join(location_path);
        if escapes || location.is_empty() || !path.starts_with(&layer_dir) || path == layer_dir {
            return Err(MosaicError::UnsafeLocation {
                layer: layer.to_string(),
                location: location.to_string(),
            });
        }
        Ok(path)
    }

    /// Delete a granule file. Returns `false` if it was already gone.
    pub async fn remove(&self, path: &Path) -> MosaicResult<bool> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted granule file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Granule file already absent");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move `source` to `dest`, creating parent directories.
    pub async fn place(&self, source: &Path, dest: &Path) -> MosaicResult<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        // rename fails across filesystems; fall back to copy+delete
        if fs::rename(source, dest).await.is_err() {
            fs::copy(source, dest).await?;
            fs::remove_file(source).await?;
        }

        debug!(source = %source.display(), dest = %dest.display(), "Placed granule file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::TempDataDir;

    #[test]
    fn test_granule_path_layout() {
        let files = GranuleFiles::new("/data/geodata", "geonode");
        assert_eq!(
            files
                .granule_path("gfms_current", "gfms_current_20240310T150000000Z.tif")
                .unwrap(),
            PathBuf::from("/data/geodata/data/geonode/gfms_current/gfms_current_20240310T150000000Z.tif")
        );
        assert_eq!(
            files
                .granule_path(
                    "gfms_current",
                    "/data/geodata/data/geonode/gfms_current/gfms_current_20240310T150000000Z.tif"
                )
                .unwrap(),
            PathBuf::from("/data/geodata/data/geonode/gfms_current/gfms_current_20240310T150000000Z.tif")
        );
    }

    #[test]
    fn test_granule_path_rejects_escaping_locations() {
        let files = GranuleFiles::new("/data/geodata", "geonode");
        for location in [
            "../../../../etc/passwd",
            "sub/../../gfms_other/gfms_other_20240310T150000000Z.tif",
            "/etc/passwd",
            "/data/geodata/data/geonode/other/other_20240310T150000000Z.tif",
            "",
        ] {
            let err = files.granule_path("gfms_current", location).unwrap_err();
            assert!(
                matches!(err, MosaicError::UnsafeLocation { .. }),
                "accepted {}",
                location
            );
        }
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_not_an_error() {
        let data = TempDataDir::new("geonode");
        let files = GranuleFiles::new(data.root(), data.workspace());

        let path = data.touch_granule("cmap", "cmap_19790101T000000000Z.tif");
        assert!(files.remove(&path).await.unwrap());
        assert!(!files.remove(&path).await.unwrap());
    }

    #[test]
    fn test_place_creates_layer_dir() {
        let data = TempDataDir::new("geonode");
        let files = GranuleFiles::new(data.root(), data.workspace());

        let source = data.scratch_file("converted.tif", b"II*\0");
        let dest = files.granule_path("cmap", "cmap_19790101T000000000Z.tif").unwrap();
        tokio_test::block_on(files.place(&source, &dest)).unwrap();

        assert!(dest.is_file());
        assert!(!source.exists());
    }
}
