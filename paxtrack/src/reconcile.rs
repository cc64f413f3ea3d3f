//! Field-level merge of freshly fetched source rows into the local roster.
//!
//! The merge never mutates its inputs: changed records are rebuilt so stale
//! holders of the previous list keep seeing what they were given.

use std::collections::HashMap;

use serde::Serialize;

use crate::{
    pax::{PassengerRecord, PaxId, RecordId},
    sheet::SheetRow,
};

/// A one-shot agent-status flip, emitted only when the agent marker crosses
/// between blank and non-blank. All other field deltas apply silently.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentChangeEvent {
    pub record_id: RecordId,
    pub pax_id: PaxId,
    pub change: AgentChange,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentChange {
    Assigned,
    Cleared,
}

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub records: Vec<PassengerRecord>,
    pub events: Vec<AgentChangeEvent>,
    /// Number of records with at least one field delta.
    pub changed: usize,
}

/// Applies the authoritative rows onto the local list.
///
/// Records are matched by `pax_id`; unmatched records (all manual entries
/// included) pass through untouched, and local-only fields are never
/// overwritten. Matching is by external identity, so reconciling the same
/// snapshot twice yields no deltas and no events the second time.
pub fn reconcile(
    local: &[PassengerRecord],
    fresh: &HashMap<PaxId, SheetRow>,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    for record in local {
        let row = record.pax_id.as_ref().and_then(|pax_id| fresh.get(pax_id));
        let Some(row) = row else {
            outcome.records.push(record.clone());
            continue;
        };

        let mut next = record.clone();
        let mut changed = false;
        sync_field(&mut next.agent_marker, &row.agent_marker, &mut changed);
        sync_field(
            &mut next.departure_time_text,
            &row.departure_time_text,
            &mut changed,
        );
        sync_field(&mut next.flight_number, &row.flight_number, &mut changed);
        sync_field(&mut next.last_name, &row.last_name, &mut changed);
        sync_field(&mut next.first_name, &row.first_name, &mut changed);

        if changed {
            outcome.changed += 1;
        }

        let was_blank = record.agent_marker.trim().is_empty();
        let is_blank = next.agent_marker.trim().is_empty();
        if was_blank != is_blank {
            outcome.events.push(AgentChangeEvent {
                record_id: next.id.clone(),
                pax_id: row.pax_id.clone(),
                change: if is_blank {
                    AgentChange::Cleared
                } else {
                    AgentChange::Assigned
                },
            });
        }

        outcome.records.push(next);
    }

    outcome
}

fn sync_field(local: &mut String, fresh: &str, changed: &mut bool) {
    if local != fresh {
        *local = fresh.to_string();
        *changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pax::AssistanceStatus;

    fn record(id: &str, pax_id: Option<&str>, agent_marker: &str) -> PassengerRecord {
        PassengerRecord {
            id: id.into(),
            pax_id: pax_id.map(Into::into),
            last_name: "MULLER".into(),
            first_name: "Anna".into(),
            flight_number: "AF1234".into(),
            departure_time_text: "10:00".into(),
            assistance: AssistanceStatus::Wchr,
            agent_marker: agent_marker.into(),
            is_priority: true,
            is_assisted: false,
            assisted_at_text: None,
            added_at_text: "08:15".into(),
        }
    }

    fn row(pax_id: &str, agent_marker: &str) -> SheetRow {
        SheetRow {
            pax_id: pax_id.into(),
            last_name: "MULLER".into(),
            first_name: "Anna".into(),
            flight_number: "AF1234".into(),
            departure_time_text: "10:00".into(),
            agent_marker: agent_marker.into(),
            assistance: AssistanceStatus::Wchr,
            terminal: None,
        }
    }

    fn by_pax_id(rows: Vec<SheetRow>) -> HashMap<PaxId, SheetRow> {
        rows.into_iter().map(|r| (r.pax_id.clone(), r)).collect()
    }

    #[test]
    fn agent_assignment_and_clearing_each_emit_one_event() {
        let local = vec![record("r1", Some("P1"), "")];

        // Agent dispatched.
        let outcome = reconcile(&local, &by_pax_id(vec![row("P1", "AGENT7")]));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].change, AgentChange::Assigned);
        assert_eq!(outcome.events[0].record_id, "r1");
        assert_eq!(outcome.records[0].agent_marker, "AGENT7");

        // Agent withdrawn again.
        let outcome = reconcile(&outcome.records, &by_pax_id(vec![row("P1", "")]));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].change, AgentChange::Cleared);
        assert_eq!(outcome.records[0].agent_marker, "");
    }

    #[test]
    fn reconciling_the_same_snapshot_twice_is_idempotent() {
        let local = vec![record("r1", Some("P1"), "")];
        let fresh = by_pax_id(vec![row("P1", "AGENT7")]);

        let first = reconcile(&local, &fresh);
        assert_eq!(first.changed, 1);
        assert_eq!(first.events.len(), 1);

        let second = reconcile(&first.records, &fresh);
        assert_eq!(second.changed, 0);
        assert!(second.events.is_empty());
        assert_eq!(second.records, first.records);
    }

    #[test]
    fn agent_swap_updates_silently() {
        let local = vec![record("r1", Some("P1"), "AGENT7")];
        let outcome = reconcile(&local, &by_pax_id(vec![row("P1", "AGENT9")]));
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.changed, 1);
        assert_eq!(outcome.records[0].agent_marker, "AGENT9");
    }

    #[test]
    fn other_field_deltas_apply_without_events() {
        let local = vec![record("r1", Some("P1"), "")];
        let mut fresh_row = row("P1", "");
        fresh_row.departure_time_text = "11:30".into();
        fresh_row.flight_number = "AF5678".into();

        let outcome = reconcile(&local, &by_pax_id(vec![fresh_row]));
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.changed, 1);
        assert_eq!(outcome.records[0].departure_time_text, "11:30");
        assert_eq!(outcome.records[0].flight_number, "AF5678");
    }

    #[test]
    fn local_only_fields_survive_the_merge() {
        let local = vec![record("r1", Some("P1"), "")];
        let outcome = reconcile(&local, &by_pax_id(vec![row("P1", "AGENT7")]));
        let merged = &outcome.records[0];
        assert!(merged.is_priority);
        assert_eq!(merged.added_at_text, "08:15");
        assert_eq!(merged.id, "r1");
    }

    #[test]
    fn manual_and_unmatched_records_pass_through() {
        let local = vec![
            record("manual", None, ""),
            record("stale", Some("GONE"), "AGENT1"),
        ];
        let outcome = reconcile(&local, &by_pax_id(vec![row("P1", "AGENT7")]));
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.changed, 0);
        assert_eq!(outcome.records, local);
    }

    #[test]
    fn inputs_are_left_untouched() {
        let local = vec![record("r1", Some("P1"), "")];
        let fresh = by_pax_id(vec![row("P1", "AGENT7")]);
        let _ = reconcile(&local, &fresh);
        assert_eq!(local[0].agent_marker, "");
    }
}
