//! GeoServer connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// PostGIS database holding mosaic granule indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MosaicDatastoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: String,
    pub user: String,
    pub password: String,
}

impl Default for MosaicDatastoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "geonode_data".to_string(),
            schema: "public".to_string(),
            user: "geonode".to_string(),
            password: "geonode".to_string(),
        }
    }
}

impl MosaicDatastoreConfig {
    /// Load from `MOSAIC_DB_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("MOSAIC_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("MOSAIC_DB_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            database: std::env::var("MOSAIC_DB_NAME").unwrap_or(defaults.database),
            schema: std::env::var("MOSAIC_DB_SCHEMA").unwrap_or(defaults.schema),
            user: std::env::var("MOSAIC_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("MOSAIC_DB_PASSWORD").unwrap_or(defaults.password),
        }
    }
}

/// Configuration for a GeoServer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoServerConfig {
    /// Base URL, e.g. `http://localhost:8080/geoserver`
    pub url: String,
    pub user: String,
    pub password: String,
    /// Workspace holding the mosaic stores
    pub workspace: String,
    /// PostGIS datastore used for vector layers
    pub vector_datastore: String,
    /// Bound on granule index queries
    pub index_timeout: Duration,
    pub mosaic_datastore: MosaicDatastoreConfig,
}

impl Default for GeoServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/geoserver".to_string(),
            user: "admin".to_string(),
            password: "geoserver".to_string(),
            workspace: "geonode".to_string(),
            vector_datastore: "datastore".to_string(),
            index_timeout: Duration::from_secs(30),
            mosaic_datastore: MosaicDatastoreConfig::default(),
        }
    }
}

impl GeoServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let index_timeout = std::env::var("INDEX_QUERY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.index_timeout);

        Self {
            url: std::env::var("GEOSERVER_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.url),
            user: std::env::var("GEOSERVER_USER").unwrap_or(defaults.user),
            password: std::env::var("GEOSERVER_PASSWORD").unwrap_or(defaults.password),
            workspace: std::env::var("DEFAULT_WORKSPACE").unwrap_or(defaults.workspace),
            vector_datastore: std::env::var("GS_DATASTORE").unwrap_or(defaults.vector_datastore),
            index_timeout,
            mosaic_datastore: MosaicDatastoreConfig::from_env(),
        }
    }
}
