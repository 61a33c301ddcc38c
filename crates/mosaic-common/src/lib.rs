//! Common types shared by the mosaic lifecycle crates.
//!
//! A mosaic layer is a named raster time series held by the map server.
//! Each timestamped raster in it is a granule, identified on disk and in the
//! map server's index by a filename derived from its acquisition hour.

pub mod error;
pub mod granule;
pub mod naming;
pub mod selection;
pub mod store;
pub mod time;

pub use error::{MosaicError, MosaicResult};
pub use granule::{Granule, GranuleRecord};
pub use naming::{decode, encode};
pub use selection::{GranuleSelection, UpperBound};
pub use store::MosaicStore;
pub use time::{format_instant, start_of_day, truncate_to_hour, ArchiveHour};
