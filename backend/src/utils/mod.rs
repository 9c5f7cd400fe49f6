//! # Utilities Module
//!
//! Input parsing and formatting helpers shared by the API and services.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Lovelace per ADA.
pub const LOVELACE_PER_ADA: i64 = 1_000_000;

/// Characters allowed in the data part of a bech32 string.
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Format a lovelace amount as ADA with thousands separators.
///
/// ## Examples
///
/// ```rust,ignore
/// assert_eq!(format_ada(1_000_000), "1.00 ADA");
/// assert_eq!(format_ada(1_234_567_890), "1,234.57 ADA");
/// ```
pub fn format_ada(lovelace: i64) -> String {
    let cents = (lovelace as i128 * 100 + (LOVELACE_PER_ADA as i128 / 2) * lovelace.signum() as i128)
        / LOVELACE_PER_ADA as i128;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();

    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}.{:02} ADA", sign, grouped, cents % 100)
}

/// Parse a lottery draw date.
///
/// Accepts RFC 3339 with an offset, or a naive date/time taken as UTC:
///
/// | Input | Result |
/// |-------|--------|
/// | `2022-02-02T10:00:00+01:00` | `2022-02-02T09:00:00Z` |
/// | `2022-02-02T10:00:00` | `2022-02-02T10:00:00Z` |
/// | `2022-02-02 10:00:00` | `2022-02-02T10:00:00Z` |
/// | `2022-02-02` | `2022-02-02T00:00:00Z` |
pub fn parse_draw_date(input: &str) -> Result<DateTime<Utc>, String> {
    let input = input.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Ok(date.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("The draw date format is not correct: {}", input))
}

/// Trim a user supplied string and reject empty or control-character input.
pub fn sanitize_input(field: &str, value: &str) -> Result<String, String> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(format!("{} cannot be empty", field));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(format!("{} contains control characters", field));
    }

    Ok(trimmed.to_string())
}

/// Check the shape of a bech32 identifier with the given human readable prefix.
///
/// Only the prefix and character set are checked, not the checksum.
pub fn validate_bech32(value: &str, hrp: &str) -> Result<(), String> {
    let data = value
        .strip_prefix(hrp)
        .and_then(|rest| rest.strip_prefix('1'))
        .ok_or_else(|| format!("Expected a '{}1...' identifier, got {}", hrp, truncate_string(value, 20)))?;

    if data.len() < 6 {
        return Err(format!("Identifier too short: {}", value));
    }
    if let Some(c) = data.chars().find(|c| !BECH32_CHARSET.contains(*c)) {
        return Err(format!("Invalid character in identifier: {}", c));
    }

    Ok(())
}

/// Truncate a string to a maximum length.
///
/// Useful for logging long stake addresses.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len || max_len < 5 {
        return s.to_string();
    }

    let half = (max_len - 3) / 2;
    let head: String = s.chars().take(half).collect();
    let tail: String = s.chars().rev().take(half).collect::<Vec<_>>().into_iter().rev().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_ada() {
        assert_eq!(format_ada(1_000_000), "1.00 ADA");
        assert_eq!(format_ada(0), "0.00 ADA");
        assert_eq!(format_ada(500_000), "0.50 ADA");
        assert_eq!(format_ada(1_234_567_890), "1,234.57 ADA");
        assert_eq!(format_ada(-2_500_000), "-2.50 ADA");
    }

    #[test]
    fn test_parse_draw_date() {
        let expected = Utc.with_ymd_and_hms(2022, 2, 2, 10, 0, 0).unwrap();

        assert_eq!(parse_draw_date("2022-02-02T10:00:00").unwrap(), expected);
        assert_eq!(parse_draw_date("2022-02-02 10:00:00").unwrap(), expected);
        assert_eq!(parse_draw_date("2022-02-02T11:00:00+01:00").unwrap(), expected);
        assert_eq!(parse_draw_date("2022-02-02T10:00:00Z").unwrap(), expected);
        assert_eq!(
            parse_draw_date("2022-02-02").unwrap(),
            Utc.with_ymd_and_hms(2022, 2, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_draw_date_rejects_garbage() {
        assert!(parse_draw_date("02/02/2022").is_err());
        assert!(parse_draw_date("tomorrow").is_err());
        assert!(parse_draw_date("2022-13-40").is_err());
    }

    #[test]
    fn test_sanitize_input() {
        assert_eq!(sanitize_input("name", "  Hippo  ").unwrap(), "Hippo");
        assert!(sanitize_input("name", "   ").is_err());
        assert!(sanitize_input("name", "Hip\u{0}po").is_err());
    }

    #[test]
    fn test_validate_bech32() {
        assert!(validate_bech32("pool1wx83tmlwtxw5nzn4stz02655pnltllq5apgx2mdc6557zw0r78g", "pool").is_ok());
        assert!(validate_bech32("stake1u9yrn7z2g0ynx4wtpqfuv7fj3uuasavtzg6ulfv2f647jhcluzuur", "stake").is_ok());
        assert!(validate_bech32("stake1u9yrn7z2g0ynx4wtpqfuv7fj3uuasavtzg6ulfv2f647jhcluzuur", "pool").is_err());
        assert!(validate_bech32("pool1abc", "pool").is_err());
        assert!(validate_bech32("pool1wx83tmlwtxw5nzn4stz0bio", "pool").is_err());
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate_string("abcdefghijklmnop", 10), "abc...nop");
    }
}
