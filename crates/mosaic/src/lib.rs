//! Mosaic lifecycle management.
//!
//! Composes a [`MosaicStore`] (the map server's granule index) with the
//! granule files on the map server's data directory to:
//!
//! - list what a layer already holds
//! - skip candidates that are already indexed
//! - place and publish new granules
//! - run retention sweeps (today, yesterday, cutoff, in that order)
//!
//! Runs on the same layer must not overlap; nothing here serializes them.

mod files;
mod layer;
mod manager;

pub use files::GranuleFiles;
pub use layer::MosaicLayer;
pub use manager::{IngestOutcome, MosaicManager, RemovalStats, SweepReport};
pub use mosaic_common::MosaicStore;
