//! Shared test utilities for the geo-dataqs workspace.
//!
//! This crate provides common testing infrastructure including:
//! - An in-memory mosaic store with fault injection
//! - A scripted HTTP server standing in for GeoServer and data sources
//! - Granule timestamp generators
//! - Temporary map-server data directories
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{utc, InMemoryMosaicStore, TempDataDir};
//! ```

pub mod generators;
pub mod mock_server;
pub mod paths;
pub mod store;

pub use generators::*;
pub use mock_server::{MockGeoServer, RecordedRequest};
pub use paths::*;
pub use store::{InMemoryMosaicStore, StoreCall};
