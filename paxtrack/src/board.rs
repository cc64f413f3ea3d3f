//! View assembly for list pages and the large-display board.
//!
//! Every view consumes the same canonical tier and display string computed
//! here; none of them re-parse departure text on their own.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
    pax::PassengerRecord,
    timetext,
    urgency::{self, Tier},
};

/// One roster record enriched with everything a display needs.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoardEntry {
    #[serde(flatten)]
    pub record: PassengerRecord,
    /// "HH:MM", or "??:??" when the departure text is unparseable.
    pub display_time: String,
    pub minutes_to_departure: i64,
    pub tier: Tier,
    pub agent_en_route: bool,
    pub passed: bool,
}

/// Builds the display board for `now`: entries sorted chronologically by
/// time of day (records without a parseable time last), passed departures
/// filtered out unless `include_passed` is set.
///
/// Hiding passed records is a display decision; the underlying roster keeps
/// them.
pub fn assemble(
    records: &[PassengerRecord],
    now: NaiveDateTime,
    include_passed: bool,
) -> Vec<BoardEntry> {
    let mut entries: Vec<_> = records
        .iter()
        .map(|record| entry(record, now))
        .filter(|entry| include_passed || !entry.passed)
        .collect();
    entries.sort_by_key(|entry| {
        let key = timetext::display_order(&entry.record.departure_time_text);
        (key.is_none(), key)
    });
    entries
}

fn entry(record: &PassengerRecord, now: NaiveDateTime) -> BoardEntry {
    let (minutes_to_departure, tier) = urgency::minutes_and_tier(&record.departure_time_text, now);
    BoardEntry {
        display_time: timetext::display_hhmm(&record.departure_time_text)
            .unwrap_or_else(|| "??:??".to_string()),
        minutes_to_departure,
        tier,
        agent_en_route: record.agent_en_route(),
        passed: urgency::is_passed(&record.departure_time_text, now),
        record: record.clone(),
    }
}

/// Counters shown in the board header.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub waiting: usize,
    pub priority: usize,
}

pub fn counters(entries: &[BoardEntry]) -> Counters {
    Counters {
        waiting: entries.iter().filter(|entry| !entry.passed).count(),
        priority: entries
            .iter()
            .filter(|entry| !entry.passed && entry.record.is_priority)
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::pax::AssistanceStatus;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 3)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn record(id: &str, departure: &str, is_priority: bool) -> PassengerRecord {
        PassengerRecord {
            id: id.into(),
            pax_id: None,
            last_name: "MULLER".into(),
            first_name: "Anna".into(),
            flight_number: "AF1234".into(),
            departure_time_text: departure.into(),
            assistance: AssistanceStatus::Wchr,
            agent_marker: String::new(),
            is_priority,
            is_assisted: false,
            assisted_at_text: None,
            added_at_text: "08:00".into(),
        }
    }

    #[test]
    fn passed_records_are_hidden_but_not_deleted() {
        let records = vec![record("r1", "10:00", false)];

        let before = assemble(&records, at(9, 0), false);
        assert_eq!(before.len(), 1);
        assert!(!before[0].passed);

        let after = assemble(&records, at(10, 1), false);
        assert!(after.is_empty());
        // Still present when the filter is lifted, and still in the input.
        let all = assemble(&records, at(10, 1), true);
        assert_eq!(all.len(), 1);
        assert!(all[0].passed);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn entries_sort_chronologically_with_unparseable_last() {
        let records = vec![
            record("late", "18:30", false),
            record("unknown", "n/a", false),
            record("early", "09:15", false),
        ];
        let entries = assemble(&records, at(8, 0), false);
        let order: Vec<_> = entries.iter().map(|e| e.record.id.as_str()).collect();
        assert_eq!(order, ["early", "late", "unknown"]);
        assert_eq!(entries[2].display_time, "??:??");
    }

    #[test]
    fn counters_track_waiting_and_priority() {
        let records = vec![
            record("r1", "10:00", true),
            record("r2", "11:00", false),
            record("r3", "07:00", true), // passed at 08:00
        ];
        let entries = assemble(&records, at(8, 0), true);
        let counters = counters(&entries);
        assert_eq!(counters.waiting, 2);
        assert_eq!(counters.priority, 1);
    }

    #[test]
    fn tiers_follow_minutes_to_departure() {
        let records = vec![
            record("red", "08:30", false),
            record("orange", "09:10", false),
            record("green", "11:00", false),
        ];
        let entries = assemble(&records, at(8, 0), false);
        assert_eq!(entries[0].tier, Tier::Urgent);
        assert_eq!(entries[1].tier, Tier::Warning);
        assert_eq!(entries[2].tier, Tier::Normal);
    }
}
