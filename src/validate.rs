//! Acceptance rules for candidate stories.
//!
//! Everything here is a pure classifier. The rules are heuristics tuned to
//! the feeds the ticker follows, not a semantic judgement of what is news.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Timelike, Utc};
use thiserror::Error;
use tracing::debug;

/// Headlines shorter than this are dropped before any other check.
pub const MIN_HEADLINE_LEN: usize = 15;

/// Minimum length for [`is_acceptable_headline`].
pub const MIN_ACCEPTABLE_LEN: usize = 20;

pub const MIN_URL_LEN: usize = 12;
pub const MAX_URL_LEN: usize = 512;

/// Timestamp value meaning "unknown or unparseable".
pub const INVALID_TIMESTAMP: i64 = 0;

/// Publish years outside this window are treated as parse errors.
const YEAR_WINDOW: std::ops::RangeInclusive<i32> = 2020..=2100;

/// Stories older than this (2024-01-01T00:00:00Z) get no display time.
const DISPLAY_TIME_EPOCH: i64 = 1_704_067_200;

/// Placeholder-only descriptions are shorter than this.
const PLACEHOLDER_MAX_LEN: usize = 80;

const BOILERPLATE: &[&str] = &[
    "TODAYS HEADLINES",
    "MORNING BRIEFING",
    "EVENING BRIEFING",
    "DAILY DIGEST",
    "SUBSCRIBE TO",
    "SIGN UP",
    "JAVASCRIPT",
    "ACCESS DENIED",
    "404 NOT FOUND",
    "PAGE NOT FOUND",
];

const CLICKBAIT_PREFIXES: &[&str] = &[
    "HOW TO ",
    "BEST OF ",
    "DEALS: ",
    "HOROSCOPE",
    "WORDLE ",
    "CROSSWORD ",
];

const READ_MORE_MARKERS: &[&str] = &["READ MORE", "CONTINUE READING"];

// ---------------------------------------------------------------------------
// Headlines
// ---------------------------------------------------------------------------

/// `false` for text that is too short, boilerplate, or clickbait.
pub fn is_acceptable_headline(text: &str) -> bool {
    if text.len() < MIN_ACCEPTABLE_LEN {
        return false;
    }
    let upper = text.to_ascii_uppercase();

    if BOILERPLATE.iter().any(|phrase| upper.contains(phrase)) {
        return false;
    }
    if CLICKBAIT_PREFIXES.iter().any(|prefix| upper.starts_with(prefix)) {
        return false;
    }
    !is_listicle(&upper)
}

/// "10 THINGS ...", "5 THINGS ..." and friends.
fn is_listicle(upper: &str) -> bool {
    let digits = upper.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && upper[digits..].starts_with(" THINGS ")
}

/// `true` when a description carries no content beyond a "read more" link.
pub fn is_placeholder_only(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    let upper = trimmed.to_ascii_uppercase();
    trimmed.len() < PLACEHOLDER_MAX_LEN && READ_MORE_MARKERS.iter().any(|m| upper.contains(m))
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Why a story link was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UrlRejection {
    #[error("link is too short")]
    TooShort,
    #[error("link does not start with http:// or https://")]
    BadScheme,
    #[error("link repeats its scheme")]
    EmbeddedScheme,
    #[error("link uses a script pseudo-scheme")]
    ScriptScheme,
}

/// Validate an already-cleaned link, truncating it to [`MAX_URL_LEN`].
pub fn check_url(url: &str) -> Result<String, UrlRejection> {
    if url.len() < MIN_URL_LEN {
        return Err(UrlRejection::TooShort);
    }
    let lower = url.to_ascii_lowercase();
    if lower.contains("javascript:") || lower.contains("vbscript:") {
        return Err(UrlRejection::ScriptScheme);
    }
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .ok_or(UrlRejection::BadScheme)?;
    if rest.contains("://") || rest.starts_with("http:") || rest.starts_with("https:") {
        return Err(UrlRejection::EmbeddedScheme);
    }

    if url.len() <= MAX_URL_LEN {
        return Ok(url.to_string());
    }
    let mut end = MAX_URL_LEN;
    while !url.is_char_boundary(end) {
        end -= 1;
    }
    debug!(len = url.len(), "link truncated");
    Ok(url[..end].to_string())
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parse an RSS `pubDate` such as `"Wed, 09 Feb 2022 14:30:45 +0000"`.
///
/// The weekday is optional and ignored. RFC 2822 zones (numeric offsets, `GMT`
/// and the US abbreviations) are honoured by chrono; a missing or unknown zone
/// reads as UTC. Leap seconds and years outside 2020..=2100 give `None`.
pub fn parse_pub_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.len() < 20 {
        debug!(date = text, "date too short");
        return None;
    }
    let body = without_weekday(text);

    let parsed = DateTime::parse_from_rfc2822(body)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_zoneless(body))
        .or_else(|| {
            let (rest, zone) = body.rsplit_once(char::is_whitespace)?;
            zone.bytes()
                .all(|b| b.is_ascii_alphabetic())
                .then(|| parse_zoneless(rest.trim_end()))
                .flatten()
        });

    let Some(dt) = parsed else {
        debug!(date = text, "unparseable date");
        return None;
    };
    if !YEAR_WINDOW.contains(&dt.year()) || dt.nanosecond() >= 1_000_000_000 {
        debug!(date = text, "date out of range");
        return None;
    }
    Some(dt)
}

/// Drop a leading weekday field (`"Wed,"` or `"Wed"`).
fn without_weekday(text: &str) -> &str {
    match text.split_once(char::is_whitespace) {
        Some((first, rest)) if first.starts_with(|c: char| c.is_ascii_alphabetic()) => {
            rest.trim_start()
        }
        _ => text,
    }
}

/// `"09 Feb 2022 14:30:45"` or `"09 Feb 2022 14:30"`, read as UTC.
fn parse_zoneless(body: &str) -> Option<DateTime<Utc>> {
    ["%d %b %Y %H:%M:%S", "%d %b %Y %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(body, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// [`parse_pub_date`] as epoch seconds, [`INVALID_TIMESTAMP`] on failure.
pub fn pub_date_epoch(text: &str) -> i64 {
    parse_pub_date(text).map_or(INVALID_TIMESTAMP, |dt| dt.timestamp())
}

/// Short display time such as `"Wed 9:30 AM"`, shifted by `utc_offset_hours`.
///
/// Timestamps before 2024 render as an empty string.
pub fn format_display_time(timestamp: i64, utc_offset_hours: i32) -> String {
    if timestamp < DISPLAY_TIME_EPOCH {
        return String::new();
    }
    let Some(offset) = utc_offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
    else {
        return String::new();
    };
    match DateTime::from_timestamp(timestamp, 0) {
        Some(dt) => dt.with_timezone(&offset).format("%a %-I:%M %p").to_string(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
