//! Shared record normalization rules
//!
//! Pure functions used by every [`ProviderAdapter`](crate::ProviderAdapter)
//! to turn provider-specific field encodings into the normalized
//! [`DomainRecord`](crate::DomainRecord) shape. Malformed input never fails
//! the whole record: it degrades to the "unknown" value.

use chrono::NaiveDate;

use crate::legacy;

/// Maximum number of DNS servers kept per record
pub const MAX_DNS_SERVERS: usize = 10;

/// How a provider encodes a boolean flag
///
/// Providers disagree on both the literal and its meaning, so each adapter
/// declares its own conventions instead of sharing one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagConvention {
    /// The literal the raw value is compared against
    pub off_literal: &'static str,
    /// The value returned when the raw value equals `off_literal`
    pub off_value: bool,
}

impl FlagConvention {
    /// Build a convention
    pub const fn new(off_literal: &'static str, off_value: bool) -> Self {
        Self {
            off_literal,
            off_value,
        }
    }

    /// Apply the convention to a raw value
    pub fn parse(&self, raw: &str) -> bool {
        parse_boolean_flag(raw, self.off_literal, self.off_value)
    }
}

/// Date encodings used by providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// ISO timestamp; only the first 10 characters (`YYYY-MM-DD`) are read
    IsoPrefix,
    /// Slash-delimited `M/D/YYYY`, leading zeros optional
    MonthDayYear,
}

/// Split a delimited DNS server field
///
/// Empty segments are dropped, at most [`MAX_DNS_SERVERS`] are kept, and an
/// empty result becomes the `no.dns-servers.{1,2}` placeholder pair.
pub fn parse_dns_list(raw: &str, delimiter: char) -> Vec<String> {
    normalize_dns_list(raw.split(delimiter))
}

/// Normalize an already-split list of DNS servers (e.g. repeated XML nodes)
pub fn normalize_dns_list<I, S>(servers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let servers: Vec<String> = servers
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_DNS_SERVERS)
        .collect();

    if servers.is_empty() {
        legacy::placeholder_dns()
    } else {
        servers
    }
}

/// Compare a raw flag against a provider's literal
///
/// Returns `off_value` when `raw` equals `off_literal`, and its negation
/// otherwise.
pub fn parse_boolean_flag(raw: &str, off_literal: &str, off_value: bool) -> bool {
    if raw == off_literal {
        off_value
    } else {
        !off_value
    }
}

/// Parse a provider date field
///
/// Returns `None` (stored as the `1978-01-23` sentinel) for empty or
/// unparseable input.
pub fn parse_date(raw: &str, format: DateFormat) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = match format {
        DateFormat::IsoPrefix => {
            let prefix: String = raw.chars().take(10).collect();
            NaiveDate::parse_from_str(&prefix, legacy::DATE_FORMAT).ok()
        }
        DateFormat::MonthDayYear => parse_month_day_year(raw),
    };

    if parsed.is_none() {
        tracing::warn!("Unparseable date '{}' ({:?}), treating as unknown", raw, format);
    }

    parsed
}

fn parse_month_day_year(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.split('/').map(str::trim);
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;
    let year_field = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let year = i32::try_from(year_field.parse::<u32>().ok()?).ok()?;
    // Two-digit years pivot at 70: 00-69 are 2000s, 70-99 are 1900s
    let year = match (year_field.len(), year) {
        (1 | 2, 0..=69) => 2000 + year,
        (1 | 2, _) => 1900 + year,
        _ => year,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}
