//! REST endpoint layout.

/// Builds GeoServer REST URLs for one workspace.
#[derive(Debug, Clone)]
pub struct RestUrls {
    base: String,
    workspace: String,
}

impl RestUrls {
    pub fn new(base: &str, workspace: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            workspace: workspace.to_string(),
        }
    }

    fn rest(&self) -> String {
        format!("{}/rest", self.base)
    }

    fn coverage_store(&self, store: &str) -> String {
        format!(
            "{}/workspaces/{}/coveragestores/{}",
            self.rest(),
            self.workspace,
            store
        )
    }

    /// Harvest an external granule into an existing mosaic.
    pub fn external_mosaic(&self, layer: &str) -> String {
        format!("{}/external.imagemosaic", self.coverage_store(layer))
    }

    /// Create a mosaic store from an uploaded archive.
    pub fn file_mosaic(&self, layer: &str) -> String {
        format!("{}/file.imagemosaic", self.coverage_store(layer))
    }

    pub fn coverage(&self, layer: &str) -> String {
        format!("{}/coverages/{}.json", self.coverage_store(layer), layer)
    }

    /// Granule index of a mosaic whose store and coverage share the layer name.
    /// Append `.json` to query, `/{id}` to target one granule.
    pub fn granule_index(&self, layer: &str) -> String {
        format!("{}/coverages/{}/index/granules", self.coverage_store(layer), layer)
    }

    pub fn granule(&self, layer: &str, id: &str) -> String {
        format!("{}/{}", self.granule_index(layer), id)
    }

    pub fn styles(&self) -> String {
        format!("{}/styles", self.rest())
    }

    pub fn style(&self, name: &str) -> String {
        format!("{}/styles/{}", self.rest(), name)
    }

    pub fn layer(&self, layer: &str) -> String {
        format!("{}/layers/{}:{}", self.rest(), self.workspace, layer)
    }

    pub fn feature_types(&self, datastore: &str) -> String {
        format!(
            "{}/workspaces/{}/datastores/{}/featuretypes",
            self.rest(),
            self.workspace,
            datastore
        )
    }

    pub fn tile_cache_seed(&self, layer: &str) -> String {
        format!("{}/gwc/rest/seed/{}:{}.json", self.base, self.workspace, layer)
    }
}
