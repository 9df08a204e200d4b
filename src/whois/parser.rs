// src/whois/parser.rs
//! Extraction of the expiration instant from free-form registry text.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::error::{LookupError, LookupResult};

/// First line carrying an expiration label. Group 2 is the raw value.
static EXPIRY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)(\[有効期限\]|Registry Expiry Date|Expiration Date|Expiration Time|Expiry Date|Expiry|paid-till|expire-date|[^\s:]*expires(?:[ \t]+on)?)[ \t]*[: \t][ \t]*(.*)",
    )
    .expect("expiry label pattern compiles")
});

/// One accepted date layout.
#[derive(Clone, Copy)]
pub struct DateLayout {
    /// Human readable shape, used in logs and tests.
    pub name: &'static str,
    decode: fn(&str) -> Option<NaiveDateTime>,
}

impl std::fmt::Debug for DateLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DateLayout").field(&self.name).finish()
    }
}

impl DateLayout {
    pub const fn new(name: &'static str, decode: fn(&str) -> Option<NaiveDateTime>) -> Self {
        Self { name, decode }
    }

    /// Decode `value` as a UTC instant, `None` when the layout does not fit.
    pub fn decode(&self, value: &str) -> Option<NaiveDateTime> {
        (self.decode)(value)
    }
}

/// Supported layouts, tried in order. Several are prefixes of one another
/// (`DD/MM/YYYY` and `DD/MM/YYYY hh:mm:ss`), so the order is part of the contract.
pub static DATE_LAYOUTS: [DateLayout; 13] = [
    DateLayout::new("YYYY-MM-DD", |v| date(v, "%Y-%m-%d")),
    DateLayout::new("YYYY-MM-DDThh:mm:ssZ", |v| datetime(v, "%Y-%m-%dT%H:%M:%SZ")),
    DateLayout::new("DD-Mon-YYYY", |v| date(v, "%d-%b-%Y")),
    DateLayout::new("YYYY.MM.DD", |v| date(v, "%Y.%m.%d")),
    DateLayout::new("Wkd Mon D hh:mm:ss TZ YYYY", weekday_with_zone),
    DateLayout::new("DD/MM/YYYY", |v| date(v, "%d/%m/%Y")),
    DateLayout::new("YYYY-MM-DD hh:mm:ss TZ", datetime_with_zone),
    DateLayout::new("YYYY/MM/DD", |v| date(v, "%Y/%m/%d")),
    DateLayout::new("Wkd Mon YYYY hh:mm:ss", weekday_month_year),
    DateLayout::new("YYYY-MM-DD hh:mm:ss±hh", datetime_with_offset),
    DateLayout::new("YYYY-MM-DD hh:mm:ss", |v| datetime(v, "%Y-%m-%d %H:%M:%S")),
    DateLayout::new("D.M.YYYY hh:mm:ss", |v| datetime(v, "%d.%m.%Y %H:%M:%S")),
    DateLayout::new("DD/MM/YYYY hh:mm:ss", |v| datetime(v, "%d/%m/%Y %H:%M:%S")),
];

/// Locate the expiration label in `body` and convert its value to Unix seconds.
pub fn parse(domain: &str, body: &[u8]) -> LookupResult<i64> {
    let text = String::from_utf8_lossy(body);

    let captures = EXPIRY_PATTERN
        .captures(&text)
        .ok_or_else(|| LookupError::UnparseableResponse {
            domain: domain.to_string(),
        })?;

    let value = captures.get(2).map_or("", |m| m.as_str()).trim();

    match parse_with(&DATE_LAYOUTS, value) {
        Some((index, timestamp)) => {
            info!(
                host = domain,
                value,
                layout = DATE_LAYOUTS[index].name,
                unix = timestamp,
                "Domain expiration"
            );
            Ok(timestamp)
        }
        None => Err(LookupError::UnparseableDate {
            domain: domain.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Try `layouts` in order; the first one that decodes wins.
/// Returns the winning index together with the Unix timestamp.
pub fn parse_with(layouts: &[DateLayout], value: &str) -> Option<(usize, i64)> {
    layouts
        .iter()
        .enumerate()
        .find_map(|(index, layout)| layout.decode(value).map(|dt| (index, dt.and_utc().timestamp())))
}

fn date(value: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(value, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn datetime(value: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, format).ok()
}

/// Zone abbreviations carry no offset information; they are read as UTC.
fn is_zone_name(token: &str) -> bool {
    token.len() >= 3 && token.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_weekday(token: &str) -> bool {
    token.parse::<Weekday>().is_ok()
}

// "Thu Jan 2 15:04:05 UTC 2025"
fn weekday_with_zone(value: &str) -> Option<NaiveDateTime> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let [weekday, month, day, time, zone, year] = tokens.as_slice() else {
        return None;
    };
    if !is_weekday(weekday) || !is_zone_name(zone) {
        return None;
    }
    datetime(&format!("{month} {day} {time} {year}"), "%b %d %H:%M:%S %Y")
}

// "2025-01-02 15:04:05 UTC"
fn datetime_with_zone(value: &str) -> Option<NaiveDateTime> {
    let (head, zone) = value.rsplit_once(' ')?;
    if !is_zone_name(zone) {
        return None;
    }
    datetime(head, "%Y-%m-%d %H:%M:%S")
}

// "Wed Jan 2025 15:04:05", the day of month is absent and taken as the 1st.
fn weekday_month_year(value: &str) -> Option<NaiveDateTime> {
    let (weekday, rest) = value.split_once(' ')?;
    if !is_weekday(weekday) {
        return None;
    }
    datetime(&format!("01 {}", rest.trim_start()), "%d %b %Y %H:%M:%S")
}

// "2025-01-02 15:04:05+07"
fn datetime_with_offset(value: &str) -> Option<NaiveDateTime> {
    let split = value.len().checked_sub(3)?;
    if !value.is_char_boundary(split) {
        return None;
    }
    let (head, offset) = value.split_at(split);

    let sign = match offset.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits = &offset[1..];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits.parse().ok()?;
    let offset = FixedOffset::east_opt(sign * hours * 3600)?;

    let local = datetime(head, "%Y-%m-%d %H:%M:%S")?;
    local
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.naive_utc())
}
