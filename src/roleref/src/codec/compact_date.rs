//! Serde adapter for the compact persisted date format
//!
//! Dates are written as `yyyyMMdd-HH:mm:ss.SSS-Z`, e.g. `20261018-11:31:00.123-+0000`.
//! Use with `#[serde(with = "compact_date")]`, or `compact_date::option` for
//! `Option<DateTime<Utc>>` fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// chrono pattern equivalent to `yyyyMMdd-HH:mm:ss.SSS-Z`
pub const FORMAT: &str = "%Y%m%d-%H:%M:%S%.3f-%z";

/// Render a timestamp in the compact format
pub fn format(value: &DateTime<Utc>) -> String {
    value.format(FORMAT).to_string()
}

/// Parse a timestamp written in the compact format
pub fn parse(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_str(text, FORMAT).map(|d| d.with_timezone(&Utc))
}

pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse(&text).map_err(serde::de::Error::custom)
}

pub mod option {
    use super::*;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&super::format(v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| super::parse(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}
