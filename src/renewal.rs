//! Renewal Policy
//!
//! A bound certificate is replaced once it has 72 hours or less left.
//! The threshold is fixed.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::error::{Result, SyncError};

/// Remaining lifetime at or below which the certificate is replaced
pub const RENEWAL_THRESHOLD_HOURS: i64 = 72;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalDecision {
    /// More than the threshold left, leave it alone
    StillValid { remaining: Duration },
    /// Replace the bound certificate with the local one
    Replace,
}

/// Decides against an injectable `now`
pub fn decide(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> RenewalDecision {
    let remaining = expires_at - now;
    if remaining > Duration::hours(RENEWAL_THRESHOLD_HOURS) {
        RenewalDecision::StillValid { remaining }
    } else {
        RenewalDecision::Replace
    }
}

/// Same as [`decide`], with "nothing bound" meaning replace
pub fn decide_optional(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> RenewalDecision {
    match expires_at {
        Some(at) => decide(at, now),
        None => RenewalDecision::Replace,
    }
}

/// Parses OSS `ValidEndDate`.
///
/// OSS reports the OpenSSL `notAfter` layout (`Jan 02 15:04:05 2006 GMT`),
/// documentation samples show RFC 2822. Both are accepted.
pub fn parse_oss_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    // Single-digit days are space padded by OpenSSL
    let mut tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens
        .last()
        .is_some_and(|zone| zone.chars().all(|c| c.is_ascii_alphabetic()))
    {
        tokens.pop();
    }
    let normalized = tokens.join(" ");

    NaiveDateTime::parse_from_str(&normalized, "%b %d %H:%M:%S %Y")
        .map(|naive| naive.and_utc())
        .map_err(|e| SyncError::parse("ValidEndDate", format!("'{}': {}", raw, e)))
}
