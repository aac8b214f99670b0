//! Input validation.
//!
//! Pure functions shared by the core and its callers. Every check here runs
//! before a transaction is opened.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static SLUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[-_][a-z0-9]+)*$").expect("slug pattern is a valid regex")
});

static YEAR_MONTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})$").expect("year-month pattern is a valid regex")
});

/// Text format accepted for link expirations, interpreted as UTC.
pub const EXPIRATION_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Checks a segment slug against `^[a-z0-9]+([-_][a-z0-9]+)*$`.
///
/// ```rust
/// use cohort_core::validate::validate_slug;
///
/// assert!(validate_slug("voice-messages_v2").is_ok());
/// assert!(validate_slug("-leading").is_err());
/// ```
pub fn validate_slug(slug: &str) -> CoreResult<()> {
    if SLUG_PATTERN.is_match(slug) {
        Ok(())
    } else {
        Err(CoreError::validation(format!("invalid slug '{slug}'")))
    }
}

/// Checks every slug of a batch, naming the batch in the error.
pub fn validate_slugs<S: AsRef<str>>(list: &str, slugs: &[S]) -> CoreResult<()> {
    for slug in slugs {
        let slug = slug.as_ref();
        if !SLUG_PATTERN.is_match(slug) {
            return Err(CoreError::validation(format!(
                "invalid slug (segment to {list}: {slug})"
            )));
        }
    }
    Ok(())
}

/// Checks a `YYYY-MM` period and returns `(year, month)`.
pub fn validate_year_month(value: &str) -> CoreResult<(i32, u32)> {
    let invalid = || CoreError::validation(format!("invalid year-month '{value}', expected YYYY-MM"));

    let captures = YEAR_MONTH_PATTERN.captures(value).ok_or_else(invalid)?;
    let year: i32 = captures[1].parse().map_err(|_| invalid())?;
    let month: u32 = captures[2].parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

/// Checks a rollout percentage is within `0..=100`.
pub fn validate_percentage(value: i64) -> CoreResult<u8> {
    u8::try_from(value)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| {
            CoreError::validation(format!("percentage {value} is outside 0..=100"))
        })
}

/// Parses a link expiration.
///
/// Accepts `YYYY-MM-DD HH:MM:SS` (UTC) or RFC 3339.
pub fn parse_expiration(value: &str) -> CoreResult<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, EXPIRATION_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            CoreError::validation(format!(
                "invalid expiration '{value}', expected YYYY-MM-DD HH:MM:SS"
            ))
        })
}
