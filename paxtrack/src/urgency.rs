//! Urgency classification for tracked passengers.
//!
//! Everything here is pure: callers inject `now` so the same questions can be
//! asked for any instant, and so tests do not depend on the wall clock.

use chrono::{Days, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::timetext::{self, ParsedDeparture};

/// Minutes assumed until departure when the time text is unparseable. Two
/// hours keeps a malformed row visible but calm.
pub const FALLBACK_MINUTES: i64 = 120;

/// Urgency tiers matching the airport-floor color conventions:
/// red under 60 minutes, orange from 60 to 90, green beyond.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Urgent,
    Warning,
    Normal,
}

pub fn classify(minutes: i64) -> Tier {
    if minutes < 60 {
        Tier::Urgent
    } else if minutes < 90 {
        Tier::Warning
    } else {
        Tier::Normal
    }
}

/// The departure instant a parsed time refers to, seen from `now`.
///
/// A time without an explicit date means the next occurrence of that time of
/// day: today, or tomorrow when today's occurrence is already strictly past.
/// An explicit date is taken as-is and never rolls over.
pub fn departure_instant(parsed: &ParsedDeparture, now: NaiveDateTime) -> NaiveDateTime {
    match parsed.date {
        Some(date) => date.and_time(parsed.time),
        None => {
            let candidate = now.date().and_time(parsed.time);
            if candidate < now {
                candidate + Days::new(1)
            } else {
                candidate
            }
        }
    }
}

/// Whole minutes from `now` until departure. Negative only for explicit
/// dates lying in the past.
pub fn minutes_until(parsed: &ParsedDeparture, now: NaiveDateTime) -> i64 {
    (departure_instant(parsed, now) - now).num_minutes()
}

/// Minutes-until and tier for raw departure text, substituting the
/// [`FALLBACK_MINUTES`] policy when the text is unparseable.
pub fn minutes_and_tier(text: &str, now: NaiveDateTime) -> (i64, Tier) {
    match timetext::parse(text) {
        Ok(parsed) => {
            let minutes = minutes_until(&parsed, now);
            (minutes, classify(minutes))
        }
        Err(_) => (FALLBACK_MINUTES, classify(FALLBACK_MINUTES)),
    }
}

/// Whether the departure is already behind us.
///
/// Unlike [`minutes_until`], a dateless time is anchored to today without
/// rolling forward: "10:00" at 10:01 is passed, even though the minutes
/// computation would already be counting towards tomorrow. Unparseable text
/// is never passed.
pub fn is_passed(text: &str, now: NaiveDateTime) -> bool {
    match timetext::parse(text) {
        Ok(parsed) => {
            let candidate = match parsed.date {
                Some(date) => date.and_time(parsed.time),
                None => now.date().and_time(parsed.time),
            };
            candidate < now
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 3)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn tier_boundaries_are_inclusive_on_the_lower_bound() {
        assert_eq!(classify(59), Tier::Urgent);
        assert_eq!(classify(60), Tier::Warning);
        assert_eq!(classify(89), Tier::Warning);
        assert_eq!(classify(90), Tier::Normal);
        assert_eq!(classify(0), Tier::Urgent);
        assert_eq!(classify(-5), Tier::Urgent);
    }

    #[test]
    fn exact_boundary_instants() {
        // Departure at 11:00 seen from 10:00 is exactly 60 minutes: WARNING.
        assert_eq!(minutes_and_tier("11:00", at(10, 0)), (60, Tier::Warning));
        // Exactly 90 minutes out: NORMAL.
        assert_eq!(minutes_and_tier("11:30", at(10, 0)), (90, Tier::Normal));
        assert_eq!(minutes_and_tier("10:59", at(10, 0)), (59, Tier::Urgent));
    }

    #[test]
    fn dateless_time_already_past_rolls_to_tomorrow() {
        let (minutes, tier) = minutes_and_tier("00:10", at(23, 50));
        assert_eq!(minutes, 20);
        assert_eq!(tier, Tier::Urgent);
    }

    #[test]
    fn explicit_date_never_rolls_over() {
        // One day before `at`: negative minutes, record counts as passed.
        let (minutes, _) = minutes_and_tier("2/8/2025 10:00", at(10, 0));
        assert_eq!(minutes, -24 * 60);
        assert!(is_passed("2/8/2025 10:00", at(10, 0)));

        let (minutes, tier) = minutes_and_tier("4/8/2025 10:00", at(10, 0));
        assert_eq!(minutes, 24 * 60);
        assert_eq!(tier, Tier::Normal);
    }

    #[test]
    fn unparseable_takes_the_two_hour_fallback() {
        assert_eq!(minutes_and_tier("", at(10, 0)), (120, Tier::Normal));
        assert_eq!(minutes_and_tier("soon", at(10, 0)), (120, Tier::Normal));
    }

    #[test]
    fn passed_is_anchored_to_today() {
        assert!(!is_passed("10:00", at(9, 0)));
        assert!(!is_passed("10:00", at(10, 0)));
        assert!(is_passed("10:00", at(10, 1)));
    }

    #[test]
    fn unparseable_is_never_passed() {
        assert!(!is_passed("", at(23, 59)));
        assert!(!is_passed("n/a", at(23, 59)));
    }

    #[test]
    fn iso_timestamps_classify_like_their_explicit_date() {
        assert!(is_passed("2025-08-02T10:00:00Z", at(10, 0)));
        let (minutes, _) = minutes_and_tier("2025-08-03T11:00:00Z", at(10, 0));
        assert_eq!(minutes, 60);
    }
}
