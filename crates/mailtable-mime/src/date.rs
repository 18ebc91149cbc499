//! Internet message date parsing.

use chrono::{DateTime, NaiveDate, NaiveTime};

use crate::error::{Error, Result};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parses an RFC 2822 date and returns the calendar date in the date's own
/// offset.
///
/// Tolerates what real mail carries: comments, a missing or inconsistent
/// weekday, obsolete or unknown zone names, two-digit years and times
/// without seconds.
///
/// # Errors
///
/// Returns [`Error::MalformedDate`] if no calendar date can be read.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let cleaned = clean(value);

    if let Ok(dt) = DateTime::parse_from_rfc2822(&cleaned) {
        return Ok(dt.date_naive());
    }

    parse_tokens(&cleaned).ok_or_else(|| Error::MalformedDate(value.to_string()))
}

/// Normalizes an optional Date header to `YYYY-MM-DD`.
///
/// # Errors
///
/// Returns [`Error::MissingDate`] when the header is absent or blank and
/// [`Error::MalformedDate`] when it cannot be parsed.
pub fn normalize_date(value: Option<&str>) -> Result<String> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(Error::MissingDate)?;

    parse_date(value).map(|date| date.format("%Y-%m-%d").to_string())
}

/// Removes comments and the weekday, and collapses whitespace.
fn clean(value: &str) -> String {
    let mut stripped = String::with_capacity(value.len());
    let mut depth = 0usize;
    for ch in value.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => stripped.push(ch),
            _ => {}
        }
    }

    // The weekday is redundant and often wrong
    let rest = match stripped.split_once(',') {
        Some((weekday, rest)) if weekday.trim().chars().all(|c| c.is_ascii_alphabetic()) => rest,
        _ => stripped.as_str(),
    };

    let mut tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens
        .first()
        .is_some_and(|t| t.len() >= 3 && t.chars().all(|c| c.is_ascii_alphabetic()) && month(t).is_none())
    {
        tokens.remove(0);
    }

    tokens.join(" ")
}

/// Reads `day month year time [zone]` without trusting the zone.
fn parse_tokens(cleaned: &str) -> Option<NaiveDate> {
    let mut tokens = cleaned.split_whitespace();

    let day: u32 = tokens.next()?.parse().ok()?;
    let month = month(tokens.next()?)?;
    let year = year(tokens.next()?)?;

    // A time must follow, but the zone may be anything
    let time = tokens.next()?;
    parse_time(time)?;

    NaiveDate::from_ymd_opt(year, month, day)
}

fn month(token: &str) -> Option<u32> {
    let prefix = token.get(..3)?.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .and_then(|index| u32::try_from(index + 1).ok())
}

fn year(token: &str) -> Option<i32> {
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = token.parse().ok()?;
    Some(match token.len() {
        1 | 2 if year < 50 => year + 2000,
        1 | 2 => year + 1900,
        3 => year + 1900,
        _ => year,
    })
}

fn parse_time(token: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(token, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(token, "%H:%M"))
        .ok()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_standard_date() {
        assert_eq!(
            normalize_date(Some("Thu, 15 Jan 2026 19:31:43 +0000")).unwrap(),
            "2026-01-15"
        );
    }

    #[test]
    fn test_date_keeps_own_offset() {
        // 23:30 at -0800 is already the next day in UTC
        assert_eq!(
            normalize_date(Some("Fri, 31 Dec 2021 23:30:00 -0800")).unwrap(),
            "2021-12-31"
        );
        assert_eq!(
            normalize_date(Some("Sat, 1 Jan 2022 00:15:00 +0900")).unwrap(),
            "2022-01-01"
        );
    }

    #[test]
    fn test_missing_weekday() {
        assert_eq!(
            normalize_date(Some("2 Feb 2024 08:00:00 +0100")).unwrap(),
            "2024-02-02"
        );
    }

    #[test]
    fn test_inconsistent_weekday() {
        // 15 Jan 2026 is a Thursday
        assert_eq!(
            normalize_date(Some("Mon, 15 Jan 2026 10:00:00 +0000")).unwrap(),
            "2026-01-15"
        );
    }

    #[test]
    fn test_trailing_comment() {
        assert_eq!(
            normalize_date(Some("Tue, 5 Mar 2024 12:00:00 +0000 (UTC)")).unwrap(),
            "2024-03-05"
        );
    }

    #[test]
    fn test_obsolete_and_unknown_zones() {
        assert_eq!(
            normalize_date(Some("Tue, 5 Mar 2024 12:00:00 GMT")).unwrap(),
            "2024-03-05"
        );
        assert_eq!(
            normalize_date(Some("Tue, 5 Mar 2024 12:00:00 EST")).unwrap(),
            "2024-03-05"
        );
        assert_eq!(
            normalize_date(Some("Tue, 5 Mar 2024 12:00:00 CEST")).unwrap(),
            "2024-03-05"
        );
    }

    #[test]
    fn test_two_digit_year_and_short_time() {
        assert_eq!(normalize_date(Some("7 Jun 99 09:15 +0000")).unwrap(), "1999-06-07");
        assert_eq!(normalize_date(Some("7 Jun 04 09:15 +0000")).unwrap(), "2004-06-07");
    }

    #[test]
    fn test_missing_date() {
        assert_eq!(normalize_date(None), Err(Error::MissingDate));
        assert_eq!(normalize_date(Some("   ")), Err(Error::MissingDate));
    }

    #[test]
    fn test_malformed_date() {
        for value in ["not a date", "32 Jan 2024 10:00:00 +0000", "2024-01-05", "5 Foo 2024 10:00"] {
            assert_eq!(
                normalize_date(Some(value)),
                Err(Error::MalformedDate(value.to_string())),
                "value: {value}"
            );
        }
    }

    proptest! {
        #[test]
        fn prop_valid_dates_normalize_to_iso(
            day in 1u32..=28,
            month in 0usize..12,
            year in 1970i32..2100,
            hour in 0u32..24,
            minute in 0u32..60,
            offset in -1200i32..=1200,
        ) {
            let sign = if offset < 0 { '-' } else { '+' };
            let value = format!(
                "{day} {} {year} {hour:02}:{minute:02}:00 {sign}{:04}",
                MONTHS[month],
                offset.abs()
            );
            let normalized = normalize_date(Some(&value)).unwrap();
            prop_assert_eq!(normalized.len(), 10);
            let well_formed = normalized
                .char_indices()
                .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
            prop_assert!(well_formed);
            prop_assert_eq!(normalized, format!("{year:04}-{:02}-{day:02}", month + 1));
        }

        #[test]
        fn prop_arbitrary_input_never_panics(value in ".*") {
            let _ = normalize_date(Some(&value));
        }
    }
}
