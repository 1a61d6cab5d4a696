//! Time utilities: timestamps and schedule durations.

use chrono::{DateTime, SubsecRound, TimeZone, Utc};

use crate::error::{LedgerError, Result};

/// A timestamp (always UTC, millisecond precision).
pub type Timestamp = DateTime<Utc>;

/// Longest accepted schedule duration: ten years of minutes.
pub const MAX_SCHEDULE_MINUTES: u64 = 10 * 365 * 24 * 60;

/// Unit suffixes and their size in minutes, longest first so the longest
/// matching suffix wins.
const SUFFIXES: &[(&str, u64)] = &[
    ("hours", 60),
    ("mins", 1),
    ("hour", 60),
    ("days", 24 * 60),
    ("min", 1),
    ("hrs", 60),
    ("day", 24 * 60),
    ("ms", 1),
    ("hr", 60),
    ("hs", 60),
    ("ds", 24 * 60),
    ("m", 1),
    ("h", 60),
    ("d", 24 * 60),
];

/// Get the current timestamp, truncated to milliseconds so it survives a
/// round trip through epoch-millis storage unchanged.
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(3)
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

/// Timestamp from milliseconds since the Unix epoch.
pub fn from_epoch_millis(millis: i64) -> Option<Timestamp> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Parse a schedule duration such as `30m`, `2h`, `1day` or `45` into minutes.
///
/// A bare number means minutes. Zero and anything over
/// [`MAX_SCHEDULE_MINUTES`] are rejected.
pub fn parse_minutes(token: &str) -> Result<u64> {
    let lowered = token.trim().to_ascii_lowercase();
    let invalid = || LedgerError::InvalidDuration(token.to_string());

    let (digits, unit) = SUFFIXES
        .iter()
        .find_map(|(suffix, unit)| lowered.strip_suffix(suffix).map(|rest| (rest, *unit)))
        .unwrap_or((lowered.as_str(), 1));

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let minutes = digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit))
        .ok_or_else(invalid)?;

    if minutes == 0 || minutes > MAX_SCHEDULE_MINUTES {
        return Err(invalid());
    }
    Ok(minutes)
}

/// Minutes as a std duration.
pub fn minutes(count: u64) -> std::time::Duration {
    std::time::Duration::from_secs(count * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minutes_examples() {
        assert_eq!(parse_minutes("30m").unwrap(), 30);
        assert_eq!(parse_minutes("2h").unwrap(), 120);
        assert_eq!(parse_minutes("1day").unwrap(), 1440);
        assert_eq!(parse_minutes("45").unwrap(), 45);
        assert!(matches!(
            parse_minutes("abc"),
            Err(LedgerError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_parse_minutes_suffixes() {
        assert_eq!(parse_minutes("5mins").unwrap(), 5);
        assert_eq!(parse_minutes("5min").unwrap(), 5);
        assert_eq!(parse_minutes("5ms").unwrap(), 5);
        assert_eq!(parse_minutes("3hours").unwrap(), 180);
        assert_eq!(parse_minutes("3hrs").unwrap(), 180);
        assert_eq!(parse_minutes("3hs").unwrap(), 180);
        assert_eq!(parse_minutes("1hour").unwrap(), 60);
        assert_eq!(parse_minutes("2ds").unwrap(), 2880);
        assert_eq!(parse_minutes("5d").unwrap(), 7200);
    }

    #[test]
    fn test_parse_minutes_rejects() {
        assert!(parse_minutes("").is_err());
        assert!(parse_minutes("m").is_err());
        assert!(parse_minutes("0m").is_err());
        assert!(parse_minutes("-5").is_err());
        assert!(parse_minutes("1.5h").is_err());
        assert!(parse_minutes("99999999999d").is_err());
    }

    #[test]
    fn test_now_round_trips_through_millis() {
        let ts = now();
        assert_eq!(from_epoch_millis(epoch_millis(ts)), Some(ts));
    }
}
