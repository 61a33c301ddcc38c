//! Archive and coverage payloads that create a time-enabled mosaic store.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::MosaicDatastoreConfig;

/// Granule timestamps are extracted from filenames with this pattern.
pub const TIME_REGEX_PROPERTIES: &str = "regex=[0-9]{8}T[0-9]{9}Z";

/// Index schema: footprint, location and the `ingestion` time attribute.
pub const INDEXER_PROPERTIES: &str = "TimeAttribute=ingestion
Schema=*the_geom:Polygon,location:String,ingestion:java.util.Date
PropertyCollectors=TimestampFileNameExtractorSPI[timeregex](ingestion)
";

/// Coverage update enabling the time dimension as an ISO8601 list.
pub const COVERAGE_TIME_JSON: &str = r#"{
    "coverage": {
        "enabled": true,
        "metadata": {
            "entry": [
                {
                    "@key": "time",
                    "dimensionInfo": {
                        "defaultValue": "",
                        "enabled": true,
                        "presentation": "LIST",
                        "units": "ISO8601"
                    }
                }
            ]
        }
    }
}"#;

fn datastore_properties(db: &MosaicDatastoreConfig) -> String {
    format!(
        "SPI=org.geotools.data.postgis.PostgisNGDataStoreFactory
host={}
port={}
database={}
schema={}
user={}
passwd={}
Loose\\ bbox=true
Estimated\\ extends=false
validate\\ connections=true
Connection\\ timeout=10
preparedStatements=true
",
        db.host, db.port, db.database, db.schema, db.user, db.password
    )
}

/// Build the `file.imagemosaic` upload: the seed granule plus the indexer,
/// time extractor and datastore properties.
pub fn bootstrap_archive(
    seed_name: &str,
    seed: &[u8],
    db: &MosaicDatastoreConfig,
) -> Result<Vec<u8>, zip::result::ZipError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(seed_name, options)?;
    writer.write_all(seed)?;

    writer.start_file("datastore.properties", options)?;
    writer.write_all(datastore_properties(db).as_bytes())?;

    writer.start_file("timeregex.properties", options)?;
    writer.write_all(TIME_REGEX_PROPERTIES.as_bytes())?;

    writer.start_file("indexer.properties", options)?;
    writer.write_all(INDEXER_PROPERTIES.as_bytes())?;

    Ok(writer.finish()?.into_inner())
}
