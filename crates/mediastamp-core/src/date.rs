use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};

/// Date format the operator types for a fallback date.
pub const FALLBACK_DATE_FORMAT: &str = "%Y:%m:%d";
/// EXIF DateTime layout.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
/// Container `creation_time` layout handed to the remuxer.
pub const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse an operator supplied `YYYY:MM:DD` date.
pub fn parse_fallback_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), FALLBACK_DATE_FORMAT).map_err(|_| Error::InvalidDate {
        input: s.trim().to_string(),
        expected: "YYYY:MM:DD",
    })
}

/// Parse the compact `YYYYMMDD` form embedded in filenames.
pub fn parse_compact_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|_| Error::InvalidDate {
        input: s.to_string(),
        expected: "YYYYMMDD",
    })
}

/// Filename dates carry no time of day, so they stamp midnight.
pub fn at_midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

pub fn exif_datetime(date: NaiveDate) -> String {
    at_midnight(date).format(EXIF_DATETIME_FORMAT).to_string()
}

pub fn iso_datetime(date: NaiveDate) -> String {
    at_midnight(date).format(ISO_DATETIME_FORMAT).to_string()
}

/// Serde adapter keeping fallback dates in their `YYYY:MM:DD` text form.
pub(crate) mod fallback_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_some(&d.format(super::FALLBACK_DATE_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| super::parse_fallback_date(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
