use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// The site publishes Brasília time (UTC-03:00, no DST since 2019)
const SITE_UTC_OFFSET_SECS: i32 = -3 * 3600;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn numeric_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{1,2})[/.](\d{1,2})[/.](\d{4})(?:\D{1,6}(\d{1,2})[h:](\d{2}))?")
            .expect("numeric date pattern is valid")
    })
}

fn written_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,2})\s+de\s+([[:alpha:]ç]+)\.?\s+de\s+(\d{4})(?:\D{1,6}(\d{1,2})[h:](\d{2}))?")
            .expect("written date pattern is valid")
    })
}

/// Parse a publication date as shown on the site.
///
/// Accepts RFC 3339, RFC 2822, ISO-like naive timestamps, `DD/MM/YYYY[ HH:MM]`
/// and Portuguese dates such as "12 de março de 2024 às 10h30". Naive values
/// are read in the site's zone. Returns `None` when nothing matches.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return from_site_local(naive);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return from_site_local(date.and_hms_opt(0, 0, 0)?);
    }

    if let Some(caps) = numeric_date_re().captures(raw) {
        let day = caps.get(1)?.as_str().parse().ok()?;
        let month = caps.get(2)?.as_str().parse().ok()?;
        let year = caps.get(3)?.as_str().parse().ok()?;
        return build(year, month, day, caps.get(4), caps.get(5));
    }

    if let Some(caps) = written_date_re().captures(raw) {
        let day = caps.get(1)?.as_str().parse().ok()?;
        let month = month_number(caps.get(2)?.as_str())?;
        let year = caps.get(3)?.as_str().parse().ok()?;
        return build(year, month, day, caps.get(4), caps.get(5));
    }

    None
}

/// Like [`parse_published`], but naive ISO timestamps are taken as UTC,
/// as in WordPress `*_gmt` fields.
pub fn parse_published_utc(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| parse_published(raw))
}

fn build(
    year: i32,
    month: u32,
    day: u32,
    hour: Option<regex::Match<'_>>,
    minute: Option<regex::Match<'_>>,
) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let (hour, minute) = match (hour, minute) {
        (Some(h), Some(m)) => (h.as_str().parse().ok()?, m.as_str().parse().ok()?),
        _ => (0, 0),
    };
    from_site_local(date.and_hms_opt(hour, minute, 0)?)
}

fn from_site_local(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    FixedOffset::east_opt(SITE_UTC_OFFSET_SECS)?
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Month number from a Portuguese month name or its three-letter abbreviation
fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "fev" => 2,
        "mar" => 3,
        "abr" => 4,
        "mai" => 5,
        "jun" => 6,
        "jul" => 7,
        "ago" => 8,
        "set" => 9,
        "out" => 10,
        "nov" => 11,
        "dez" => 12,
        _ => return None,
    };
    Some(month)
}
