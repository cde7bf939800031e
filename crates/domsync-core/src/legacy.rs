// # Legacy Storage Shim
//
// The `scheduler` table and the domain tables downstream of the adapters
// encode "unset" with sentinel values instead of NULL:
//
// - timestamps: `1978-01-23 00:00:00`
// - dates:      `1978-01-23`
// - DNS lists:  `no.dns-servers.1`, `no.dns-servers.2`
// - booleans:   `'0'` / `'1'` strings
//
// In memory everything is typed (`Option<DateTime<Utc>>`, `Option<NaiveDate>`,
// `bool`). The conversions in this module are the only place where the
// sentinel representation exists; stores call them when serializing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::{Error, Result};

/// Sentinel date meaning "unknown/unset"
pub const SENTINEL_DATE: &str = "1978-01-23";

/// Sentinel timestamp meaning "never run" / "not scheduled"
pub const SENTINEL_TIMESTAMP: &str = "1978-01-23 00:00:00";

/// Placeholder pair used when a provider reports no DNS servers
pub const NO_DNS_SERVERS: [&str; 2] = ["no.dns-servers.1", "no.dns-servers.2"];

/// Storage format for timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage format for dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Encode an optional timestamp, substituting the sentinel for `None`
pub fn encode_timestamp(value: Option<DateTime<Utc>>) -> String {
    match value {
        Some(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        None => SENTINEL_TIMESTAMP.to_string(),
    }
}

/// Decode a stored timestamp; the sentinel and the empty string decode to `None`
pub fn decode_timestamp(raw: &str) -> Result<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == SENTINEL_TIMESTAMP {
        return Ok(None);
    }

    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| Some(naive.and_utc()))
        .map_err(|e| Error::parse(format!("Invalid stored timestamp '{}': {}", raw, e)))
}

/// Encode an optional date, substituting the sentinel for `None`
pub fn encode_date(value: Option<NaiveDate>) -> String {
    match value {
        Some(date) => date.format(DATE_FORMAT).to_string(),
        None => SENTINEL_DATE.to_string(),
    }
}

/// Decode a stored date; the sentinel and the empty string decode to `None`
pub fn decode_date(raw: &str) -> Result<Option<NaiveDate>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == SENTINEL_DATE {
        return Ok(None);
    }

    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(Some)
        .map_err(|e| Error::parse(format!("Invalid stored date '{}': {}", raw, e)))
}

/// Encode a boolean as the `'0'`/`'1'` flag string
pub fn encode_flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Encode an optional boolean; unknown is the empty string
pub fn encode_optional_flag(value: Option<bool>) -> &'static str {
    value.map(encode_flag).unwrap_or("")
}

/// Whether a DNS list is the "no servers" placeholder pair
pub fn is_placeholder_dns(servers: &[String]) -> bool {
    servers.len() == NO_DNS_SERVERS.len()
        && servers.iter().zip(NO_DNS_SERVERS).all(|(s, p)| s == p)
}

/// The "no servers" placeholder pair as owned strings
pub fn placeholder_dns() -> Vec<String> {
    NO_DNS_SERVERS.iter().map(|s| s.to_string()).collect()
}

/// Serde adapter for `Option<DateTime<Utc>>` stored in the sentinel format
///
/// ```rust,ignore
/// #[serde(with = "crate::legacy::timestamp")]
/// pub last_run: Option<DateTime<Utc>>,
/// ```
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::encode_timestamp(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::decode_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<NaiveDate>` stored in the sentinel format
pub mod date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::encode_date(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::decode_date(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn none_encodes_as_sentinel() {
        assert_eq!(encode_timestamp(None), "1978-01-23 00:00:00");
        assert_eq!(encode_date(None), "1978-01-23");
    }

    #[test]
    fn sentinel_decodes_as_none() {
        assert_eq!(decode_timestamp("1978-01-23 00:00:00").unwrap(), None);
        assert_eq!(decode_date("1978-01-23").unwrap(), None);
        assert_eq!(decode_date("").unwrap(), None);
    }

    #[test]
    fn real_timestamp_survives_storage() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 4, 5, 6).unwrap();
        let stored = encode_timestamp(Some(ts));
        assert_eq!(stored, "2024-03-15 04:05:06");
        assert_eq!(decode_timestamp(&stored).unwrap(), Some(ts));
    }

    #[test]
    fn garbage_timestamp_is_a_parse_error() {
        assert!(matches!(decode_timestamp("yesterday"), Err(Error::Parse(_))));
    }

    #[test]
    fn flags() {
        assert_eq!(encode_flag(true), "1");
        assert_eq!(encode_flag(false), "0");
        assert_eq!(encode_optional_flag(None), "");
        assert!(is_placeholder_dns(&placeholder_dns()));
        assert!(!is_placeholder_dns(&["ns1.example.com".to_string()]));
    }
}
