//! Path utilities and temporary map-server data directories.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Returns the workspace root directory.
///
/// This is determined by walking up from the test-utils manifest directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Returns `services/{service_name}/{relative}` under the workspace root.
pub fn service_path(service_name: &str, relative: &str) -> PathBuf {
    workspace_root().join("services").join(service_name).join(relative)
}

/// A temporary map-server data directory laid out as
/// `{root}/data/{workspace}/{layer}/{file}`.
pub struct TempDataDir {
    dir: TempDir,
    workspace: String,
}

impl TempDataDir {
    pub fn new(workspace: &str) -> Self {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("failed to create temp dir: {}", e));
        Self {
            dir,
            workspace: workspace.to_string(),
        }
    }

    /// Root of the data directory (the map server's data dir).
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// Path a granule file of `layer` lives at.
    pub fn granule_path(&self, layer: &str, filename: &str) -> PathBuf {
        self.root()
            .join("data")
            .join(&self.workspace)
            .join(layer)
            .join(filename)
    }

    /// Create a small placeholder granule file and return its path.
    pub fn touch_granule(&self, layer: &str, filename: &str) -> PathBuf {
        let path = self.granule_path(layer, filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|e| panic!("failed to create {:?}: {}", parent, e));
        }
        fs::write(&path, b"II*\0").unwrap_or_else(|e| panic!("failed to write {:?}: {}", path, e));
        path
    }

    /// Write a scratch file (outside the data tree) and return its path.
    pub fn scratch_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let dir = self.root().join("scratch");
        fs::create_dir_all(&dir).unwrap_or_else(|e| panic!("failed to create {:?}: {}", dir, e));
        let path = dir.join(name);
        fs::write(&path, contents).unwrap_or_else(|e| panic!("failed to write {:?}: {}", path, e));
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_contains_crates() {
        assert!(workspace_root().join("crates").is_dir());
    }

    #[test]
    fn test_touch_granule_layout() {
        let data = TempDataDir::new("geonode");
        let path = data.touch_granule("gfms_current", "gfms_current_20240310T150000000Z.tif");
        assert!(path.ends_with("data/geonode/gfms_current/gfms_current_20240310T150000000Z.tif"));
        assert!(path.is_file());
    }
}
