//! Departure-time text parsing.
//!
//! The source spreadsheet delivers departure times as free text and the
//! format varies between rows: bare "HH:MM", "DD/MM/YYYY HH:MM" (slash or
//! dash separated, 2- or 4-digit years), or ISO 8601 fragments. Parsing is
//! liberal but never panics; one malformed row must not take down the board.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

static BARE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("static pattern must compile"));

static DATED_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\s+(\d{1,2}):(\d{2})")
        .expect("static pattern must compile")
});

static ISO_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"T(\d{2}):(\d{2})").expect("static pattern must compile"));

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})T").expect("static pattern must compile"));

/// Canonical form of a departure time: a time of day, plus the explicit
/// calendar date when the text carried one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDeparture {
    pub time: NaiveTime,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unparseable departure time: {0:?}")]
pub struct UnparseableTime(pub String);

/// Parses departure-time text into its canonical form.
///
/// Rules are applied in precedence order: bare "H:MM"/"HH:MM" (no date),
/// then "D/M/YY[YY] HH:MM" with `/` or `-` separators (2-digit years read as
/// 2000+YY), then an ISO fragment containing "THH:MM" (date taken from a
/// leading "YYYY-MM-DD" when present). Values that look numeric but fall
/// outside valid ranges (hour 25, 31/02) are unparseable, not clamped.
pub fn parse(text: &str) -> Result<ParsedDeparture, UnparseableTime> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(UnparseableTime(text.to_string()));
    }
    let unparseable = || UnparseableTime(text.to_string());

    if let Some(caps) = BARE_TIME.captures(trimmed) {
        let time = time_of_day(&caps[1], &caps[2]).ok_or_else(unparseable)?;
        return Ok(ParsedDeparture { time, date: None });
    }

    if let Some(caps) = DATED_TIME.captures(trimmed) {
        let day: u32 = caps[1].parse().map_err(|_| unparseable())?;
        let month: u32 = caps[2].parse().map_err(|_| unparseable())?;
        let year: i32 = caps[3].parse().map_err(|_| unparseable())?;
        let year = if year < 100 { 2000 + year } else { year };
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(unparseable)?;
        let time = time_of_day(&caps[4], &caps[5]).ok_or_else(unparseable)?;
        return Ok(ParsedDeparture {
            time,
            date: Some(date),
        });
    }

    if let Some(caps) = ISO_TIME.captures(trimmed) {
        let time = time_of_day(&caps[1], &caps[2]).ok_or_else(unparseable)?;
        let date = match ISO_DATE.captures(trimmed) {
            Some(date_caps) => {
                let year: i32 = date_caps[1].parse().map_err(|_| unparseable())?;
                let month: u32 = date_caps[2].parse().map_err(|_| unparseable())?;
                let day: u32 = date_caps[3].parse().map_err(|_| unparseable())?;
                Some(NaiveDate::from_ymd_opt(year, month, day).ok_or_else(unparseable)?)
            }
            None => None,
        };
        return Ok(ParsedDeparture { time, date });
    }

    Err(unparseable())
}

fn time_of_day(hour: &str, minute: &str) -> Option<NaiveTime> {
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Zero-padded "HH:MM" for display, or `None` when the text is unparseable
/// (views substitute "??:??").
pub fn display_hhmm(text: &str) -> Option<String> {
    parse(text)
        .ok()
        .map(|parsed| parsed.time.format("%H:%M").to_string())
}

/// Chronological sort key for list views. Records without a parseable time
/// have no key and sort last.
pub fn display_order(text: &str) -> Option<NaiveTime> {
    parse(text).ok().map(|parsed| parsed.time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn bare_time_with_and_without_leading_zero() {
        let short = parse("9:05").unwrap();
        let padded = parse("09:05").unwrap();
        assert_eq!(short, padded);
        assert_eq!(short.time, hm(9, 5));
        assert_eq!(short.date, None);
    }

    #[test]
    fn equivalent_formats_share_a_canonical_form() {
        let slash = parse("3/8/2025 05:45").unwrap();
        let dash = parse("3-8-2025 05:45").unwrap();
        let iso = parse("2025-08-03T05:45:10Z").unwrap();
        assert_eq!(slash, dash);
        assert_eq!(slash, iso);
        assert_eq!(slash.time, hm(5, 45));
        assert_eq!(slash.date, Some(NaiveDate::from_ymd_opt(2025, 8, 3).unwrap()));
    }

    #[test]
    fn two_digit_years_are_twenty_first_century() {
        let parsed = parse("3/8/25 05:45").unwrap();
        assert_eq!(parsed.date, Some(NaiveDate::from_ymd_opt(2025, 8, 3).unwrap()));
    }

    #[test]
    fn iso_time_without_date_portion() {
        let parsed = parse("T14:30").unwrap();
        assert_eq!(parsed.time, hm(14, 30));
        assert_eq!(parsed.date, None);
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        assert_eq!(parse("  10:00  ").unwrap().time, hm(10, 0));
    }

    #[test]
    fn out_of_range_values_are_unparseable() {
        assert!(parse("25:00").is_err());
        assert!(parse("12:60").is_err());
        assert!(parse("31/2/2025 10:00").is_err());
    }

    #[test]
    fn empty_and_garbage_are_unparseable() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
        assert!(parse("TBD").is_err());
        assert!(parse("10h30").is_err());
    }

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(display_hhmm("9:05").as_deref(), Some("09:05"));
        assert_eq!(display_hhmm("3/8/2025 05:45").as_deref(), Some("05:45"));
        assert_eq!(display_hhmm("bogus"), None);
    }

    #[test]
    fn unparseable_has_no_sort_key() {
        assert_eq!(display_order("10:00"), Some(hm(10, 0)));
        assert_eq!(display_order("??"), None);
    }
}
