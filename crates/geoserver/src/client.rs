//! REST client and [`MosaicStore`] implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use mosaic_common::selection::TIME_ATTRIBUTE;
use mosaic_common::{GranuleRecord, GranuleSelection, MosaicError, MosaicResult, MosaicStore};

use crate::bootstrap::{bootstrap_archive, COVERAGE_TIME_JSON};
use crate::config::GeoServerConfig;
use crate::urls::RestUrls;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    id: String,
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    location: String,
}

/// Client for one GeoServer workspace.
#[derive(Debug, Clone)]
pub struct GeoServerClient {
    http: Client,
    config: GeoServerConfig,
    urls: RestUrls,
}

impl GeoServerClient {
    pub fn new(config: GeoServerConfig) -> MosaicResult<Self> {
        // No client-wide timeout: only index queries are bounded
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| MosaicError::Remote(format!("Failed to create HTTP client: {}", e)))?;

        let urls = RestUrls::new(&config.url, &config.workspace);
        Ok(Self { http, config, urls })
    }

    pub fn config(&self) -> &GeoServerConfig {
        &self.config
    }

    pub fn urls(&self) -> &RestUrls {
        &self.urls
    }

    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.config.user, Some(&self.config.password))
    }

    async fn post_external(&self, layer: &str, path: &Path) -> MosaicResult<Response> {
        self.request(Method::POST, &self.urls.external_mosaic(layer))
            .header(header::CONTENT_TYPE, "text/plain")
            .body(format!("file://{}", path.display()))
            .send()
            .await
            .map_err(|e| MosaicError::Upload {
                layer: layer.to_string(),
                message: e.to_string(),
            })
    }

    /// Create the mosaic store for `layer` seeded with the granule at `seed`,
    /// then enable its time dimension.
    #[instrument(skip(self, seed), fields(seed = %seed.display()))]
    pub async fn create_mosaic(&self, layer: &str, seed: &Path) -> MosaicResult<()> {
        let bootstrap_err = |message: String| MosaicError::Bootstrap {
            layer: layer.to_string(),
            message,
        };

        let seed_name = seed
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| bootstrap_err(format!("Invalid seed path {}", seed.display())))?;
        let seed_bytes = tokio::fs::read(seed).await?;
        let archive = bootstrap_archive(seed_name, &seed_bytes, &self.config.mosaic_datastore)
            .map_err(|e| bootstrap_err(format!("Failed to build archive: {}", e)))?;

        let response = self
            .request(Method::PUT, &self.urls.file_mosaic(layer))
            .header(header::CONTENT_TYPE, "application/zip")
            .body(archive)
            .send()
            .await
            .map_err(|e| bootstrap_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(bootstrap_err(describe(response).await));
        }

        let response = self
            .request(Method::PUT, &self.urls.coverage(layer))
            .header(header::CONTENT_TYPE, "application/json")
            .body(COVERAGE_TIME_JSON)
            .send()
            .await
            .map_err(|e| bootstrap_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(bootstrap_err(describe(response).await));
        }

        info!(layer = %layer, "Created mosaic store");
        Ok(())
    }

    async fn is_indexed(&self, layer: &str, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        match self.list_granules(layer, None).await {
            Ok(records) => records.iter().any(|r| r.filename() == name),
            Err(e) => {
                warn!(layer = %layer, error = %e, "Could not check bootstrap seed");
                false
            }
        }
    }

    fn index_error(layer: &str, e: reqwest::Error) -> MosaicError {
        if e.is_timeout() {
            MosaicError::IndexQueryTimeout {
                layer: layer.to_string(),
            }
        } else {
            MosaicError::IndexQuery {
                layer: layer.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Status line plus body, for error messages.
pub(crate) async fn describe(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    }
}

#[async_trait]
impl MosaicStore for GeoServerClient {
    #[instrument(skip(self, selection))]
    async fn list_granules(
        &self,
        layer: &str,
        selection: Option<&GranuleSelection>,
    ) -> MosaicResult<Vec<GranuleRecord>> {
        let url = format!("{}.json", self.urls.granule_index(layer));
        let mut request = self
            .request(Method::GET, &url)
            .timeout(self.config.index_timeout);
        if let Some(selection) = selection {
            let filter = selection.to_cql(TIME_ATTRIBUTE);
            debug!(filter = %filter, "Querying granule index");
            request = request.query(&[("filter", filter)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::index_error(layer, e))?;

        // No mosaic yet
        if response.status() == StatusCode::NOT_FOUND {
            debug!(layer = %layer, "Granule index not found");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(MosaicError::IndexQuery {
                layer: layer.to_string(),
                message: describe(response).await,
            });
        }

        let collection: FeatureCollection = response
            .json()
            .await
            .map_err(|e| Self::index_error(layer, e))?;

        Ok(collection
            .features
            .into_iter()
            .map(|f| GranuleRecord::new(f.id, f.properties.location))
            .collect())
    }

    async fn delete_granule(&self, layer: &str, id: &str) -> MosaicResult<()> {
        let delete_err = |message: String| MosaicError::RemoteDeleteFailure {
            layer: layer.to_string(),
            id: id.to_string(),
            message,
        };

        let response = self
            .request(Method::DELETE, &self.urls.granule(layer, id))
            .send()
            .await
            .map_err(|e| delete_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(delete_err(describe(response).await));
        }

        debug!(layer = %layer, id = %id, "Deleted granule record");
        Ok(())
    }

    #[instrument(skip(self, path), fields(path = %path.display()))]
    async fn publish_granule(&self, layer: &str, path: &Path) -> MosaicResult<()> {
        let response = self.post_external(layer, path).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status != StatusCode::METHOD_NOT_ALLOWED {
            return Err(MosaicError::Upload {
                layer: layer.to_string(),
                message: describe(response).await,
            });
        }

        info!(layer = %layer, "Mosaic store missing, bootstrapping");
        self.create_mosaic(layer, path).await?;

        // The seed granule is usually harvested by the store creation itself
        if self.is_indexed(layer, path).await {
            return Ok(());
        }

        let response = self.post_external(layer, path).await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::METHOD_NOT_ALLOWED => Err(MosaicError::UploadConflict {
                layer: layer.to_string(),
            }),
            _ => Err(MosaicError::Upload {
                layer: layer.to_string(),
                message: describe(response).await,
            }),
        }
    }
}
