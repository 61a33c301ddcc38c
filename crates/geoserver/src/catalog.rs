//! Catalog calls made around a processing run.

use reqwest::{header, Method, StatusCode};
use serde_json::json;
use tracing::{debug, info, instrument};

use mosaic_common::{MosaicError, MosaicResult};

use crate::client::{describe, GeoServerClient};

fn remote_err(action: &str, target: &str, cause: impl std::fmt::Display) -> MosaicError {
    MosaicError::Remote(format!("{} '{}': {}", action, target, cause))
}

impl GeoServerClient {
    /// Drop cached tiles of `layer` so new granules show up.
    #[instrument(skip(self))]
    pub async fn truncate_tile_cache(&self, layer: &str) -> MosaicResult<()> {
        let body = json!({
            "seedRequest": {
                "name": format!("{}:{}", self.config().workspace, layer),
                "srs": { "number": 900913 },
                "zoomStart": 0,
                "zoomStop": 19,
                "format": "image/png",
                "type": "truncate",
                "threadCount": 4,
            }
        });

        let response = self
            .request(Method::POST, &self.urls().tile_cache_seed(layer))
            .json(&body)
            .send()
            .await
            .map_err(|e| remote_err("Failed to truncate tile cache of", layer, e))?;
        if !response.status().is_success() {
            return Err(remote_err(
                "Failed to truncate tile cache of",
                layer,
                describe(response).await,
            ));
        }

        debug!(layer = %layer, "Truncated tile cache");
        Ok(())
    }

    pub async fn style_exists(&self, name: &str) -> MosaicResult<bool> {
        let url = format!("{}.json", self.urls().style(name));
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| remote_err("Failed to look up style", name, e))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(remote_err(
                "Failed to look up style",
                name,
                describe(response).await,
            )),
        }
    }

    /// Register a style entry and upload its SLD body.
    #[instrument(skip(self, sld))]
    pub async fn create_style(&self, name: &str, sld: &str) -> MosaicResult<()> {
        let entry = format!(
            "<style><name>{}</name><filename>{}.sld</filename></style>",
            name, name
        );
        let response = self
            .request(Method::POST, &self.urls().styles())
            .header(header::CONTENT_TYPE, "text/xml")
            .body(entry)
            .send()
            .await
            .map_err(|e| remote_err("Failed to create style", name, e))?;
        if !response.status().is_success() {
            return Err(remote_err("Failed to create style", name, describe(response).await));
        }

        let response = self
            .request(Method::PUT, &self.urls().style(name))
            .header(header::CONTENT_TYPE, "application/vnd.ogc.sld+xml")
            .body(sld.to_string())
            .send()
            .await
            .map_err(|e| remote_err("Failed to upload SLD for", name, e))?;
        if !response.status().is_success() {
            return Err(remote_err("Failed to upload SLD for", name, describe(response).await));
        }

        info!(style = %name, "Created style");
        Ok(())
    }

    pub async fn set_default_style(&self, layer: &str, style: &str) -> MosaicResult<()> {
        let body = format!(
            "<layer><defaultStyle><name>{}</name></defaultStyle></layer>",
            style
        );
        let response = self
            .request(Method::PUT, &self.urls().layer(layer))
            .header(header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| remote_err("Failed to set default style of", layer, e))?;
        if !response.status().is_success() {
            return Err(remote_err(
                "Failed to set default style of",
                layer,
                describe(response).await,
            ));
        }
        Ok(())
    }

    /// Make `style` the default of `layer`, creating it from `sld` first when
    /// the server does not have it.
    pub async fn ensure_default_style(&self, layer: &str, style: &str, sld: &str) -> MosaicResult<()> {
        if !self.style_exists(style).await? {
            self.create_style(style, sld).await?;
        }
        self.set_default_style(layer, style).await
    }

    /// Publish PostGIS table `table` from `datastore` (the configured vector
    /// datastore when `None`) as a feature type.
    #[instrument(skip(self))]
    pub async fn publish_feature_type(&self, table: &str, datastore: Option<&str>) -> MosaicResult<()> {
        let datastore = datastore.unwrap_or(self.config().vector_datastore.as_str());
        let body = format!("<featureType><name>{}</name></featureType>", table);

        let response = self
            .request(Method::POST, &self.urls().feature_types(datastore))
            .header(header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| remote_err("Failed to publish feature type", table, e))?;
        if !response.status().is_success() {
            return Err(remote_err(
                "Failed to publish feature type",
                table,
                describe(response).await,
            ));
        }

        info!(table = %table, datastore = %datastore, "Published feature type");
        Ok(())
    }
}
