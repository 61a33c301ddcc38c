//! Granule filename codec.
//!
//! Granules are named `{layer}_{YYYYMMDD}T{HH}0000000Z.tif`. The map server's
//! time regex (`[0-9]{8}T[0-9]{9}Z`) extracts the acquisition instant from
//! that suffix, so only whole hours are representable.

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};

use crate::error::{MosaicError, MosaicResult};

/// Extension of every granule file.
pub const GRANULE_EXTENSION: &str = "tif";

const STAMP_FORMAT: &str = "%Y%m%dT%H0000000Z";
const STAMP_LEN: usize = 19;

/// Encode the granule filename for `layer_name` at `timestamp`.
///
/// `timestamp` must already be truncated to the hour (see
/// [`crate::truncate_to_hour`]); sub-hour components are rejected.
pub fn encode(layer_name: &str, timestamp: DateTime<Utc>) -> MosaicResult<String> {
    if timestamp.minute() != 0 || timestamp.second() != 0 || timestamp.nanosecond() != 0 {
        return Err(MosaicError::SubHourTimestamp(timestamp.to_rfc3339()));
    }

    Ok(format!(
        "{}_{}.{}",
        layer_name,
        timestamp.format(STAMP_FORMAT),
        GRANULE_EXTENSION
    ))
}

/// Decode the acquisition instant from a granule filename.
///
/// Leading directories are ignored, so index locations that carry a
/// relative path decode the same as bare filenames.
pub fn decode(filename: &str) -> MosaicResult<DateTime<Utc>> {
    let malformed = || MosaicError::MalformedName(filename.to_string());

    let basename = filename.rsplit('/').next().unwrap_or(filename);
    let stem = basename
        .strip_suffix(GRANULE_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .ok_or_else(malformed)?;
    let (layer, stamp) = stem.rsplit_once('_').ok_or_else(malformed)?;

    if layer.is_empty() || stamp.len() != STAMP_LEN || !stamp.is_ascii() {
        return Err(malformed());
    }

    let (date, rest) = stamp.split_at(8);
    let rest = rest.strip_prefix('T').ok_or_else(malformed)?;
    let (hour, tail) = rest.split_at(2);
    if tail != "0000000Z" || !date.bytes().chain(hour.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let date = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| malformed())?;
    let hour: u32 = hour.parse().map_err(|_| malformed())?;
    let naive = date.and_hms_opt(hour, 0, 0).ok_or_else(malformed)?;

    Ok(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        assert_eq!(
            encode("gfms_current", ts).unwrap(),
            "gfms_current_20240310T150000000Z.tif"
        );
    }

    #[test]
    fn test_encode_rejects_sub_hour() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
        assert!(matches!(
            encode("gfms_current", ts),
            Err(MosaicError::SubHourTimestamp(_))
        ));
    }

    #[test]
    fn test_decode() {
        let ts = decode("nasa_gpm_24hr_20240101T120000000Z.tif").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_decode_ignores_directories() {
        let ts = decode("geonode/cmap/cmap_19790101T000000000Z.tif").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(1979, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_decode_malformed() {
        for name in [
            "gfms_current.tif",
            "gfms_current_20240310T150000000Z.png",
            "gfms_current_20240310T153000000Z.tif",
            "gfms_current_20240310T250000000Z.tif",
            "gfms_current_20241310T150000000Z.tif",
            "_20240310T150000000Z.tif",
            "gfms_current_2024031T150000000Z.tif",
        ] {
            assert!(
                matches!(decode(name), Err(MosaicError::MalformedName(_))),
                "expected {} to be rejected",
                name
            );
        }
    }
}
