//! Summary statistics for the operations view.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

use crate::{pax::PassengerRecord, timetext, urgency};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    /// Records whose departure is not yet passed.
    pub active: usize,
    pub priority: usize,
    pub assisted: usize,
    pub agents_en_route: usize,
    pub by_assistance: BTreeMap<String, usize>,
    /// Departures per hour of day, from parsed departure times.
    pub departures_by_hour: [usize; 24],
    /// Records whose departure text could not be parsed; they are absent
    /// from the histogram.
    pub unparseable_times: usize,
}

impl Summary {
    pub fn compute(records: &[PassengerRecord], now: NaiveDateTime) -> Self {
        let mut by_assistance = BTreeMap::new();
        let mut departures_by_hour = [0usize; 24];
        let mut unparseable_times = 0;
        let mut active = 0;

        for record in records {
            *by_assistance
                .entry(record.assistance.as_code().to_string())
                .or_insert(0) += 1;
            match timetext::parse(&record.departure_time_text) {
                Ok(parsed) => departures_by_hour[parsed.time.hour() as usize] += 1,
                Err(_) => unparseable_times += 1,
            }
            if !urgency::is_passed(&record.departure_time_text, now) {
                active += 1;
            }
        }

        Self {
            total: records.len(),
            active,
            priority: records.iter().filter(|r| r.is_priority).count(),
            assisted: records.iter().filter(|r| r.is_assisted).count(),
            agents_en_route: records.iter().filter(|r| r.agent_en_route()).count(),
            by_assistance,
            departures_by_hour,
            unparseable_times,
        }
    }
}
