//! GeoServer REST adapter.
//!
//! Implements [`mosaic_common::MosaicStore`] over the image mosaic REST API:
//!
//! - granule index queries with a CQL time filter and a bounded timeout
//! - granule record deletes
//! - granule publication, bootstrapping a missing mosaic store once
//!
//! Also exposes the catalog calls the processors make around a run (tile
//! cache truncation, default styles, PostGIS feature types).

mod bootstrap;
mod catalog;
mod client;
mod config;
mod urls;

pub use bootstrap::{bootstrap_archive, COVERAGE_TIME_JSON, INDEXER_PROPERTIES, TIME_REGEX_PROPERTIES};
pub use client::GeoServerClient;
pub use config::{GeoServerConfig, MosaicDatastoreConfig};
pub use urls::RestUrls;
