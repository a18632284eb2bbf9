//! Inspection due-date scheduling.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::BridgeRecord;

/// One backlog line: a record plus when its inspection is (or was) due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogEntry {
    pub bridge: BridgeRecord,
    pub due_date: NaiveDate,
    /// `reference_date - due_date` in days; negative means due in the future.
    pub days_overdue: i64,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%Y%m%d"];

/// Parses a due-date value from the working set: date strings in the known
/// formats, or numbers as epoch seconds.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            DateTime::from_timestamp(secs as i64, 0).map(|dt| dt.date_naive())
        }
        Value::String(s) => {
            let text = s.trim();
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        }
        _ => None,
    }
}

/// Builds the ordered inspection backlog.
///
/// Due-date resolution: `next_inspection_due` (or its alias), else
/// `last_inspection_date`, else the reference date itself (treat-as-due-now).
/// A record enters the backlog iff `days_overdue >= -lead_time_days`. The
/// output is sorted non-decreasing by `(days_overdue, due_date)`; the key is
/// total, so the ordering is deterministic for any input permutation.
pub fn schedule_inspections(
    records: &[BridgeRecord],
    reference_date: NaiveDate,
    lead_time_days: i64,
) -> Vec<BacklogEntry> {
    let mut backlog: Vec<BacklogEntry> = records
        .iter()
        .filter_map(|record| {
            let due_date = record
                .next_due_raw()
                .as_ref()
                .and_then(parse_date)
                .or_else(|| record.last_inspection_raw().as_ref().and_then(parse_date))
                .unwrap_or(reference_date);
            let days_overdue = (reference_date - due_date).num_days();
            (days_overdue >= -lead_time_days).then(|| BacklogEntry {
                bridge: record.clone(),
                due_date,
                days_overdue,
            })
        })
        .collect();

    backlog.sort_by_key(|entry| (entry.days_overdue, entry.due_date));
    backlog
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: serde_json::Value) -> Vec<BridgeRecord> {
        serde_json::from_value(value).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_due_date_resolution_order() {
        let set = records(json!([
            { "structure_id": "B-1",
              "next_inspection_due": "2024-01-10",
              "last_inspection_date": "2023-01-01" },
            { "structure_id": "B-2", "last_inspection_date": "2023-12-01" },
            { "structure_id": "B-3" },
        ]));

        let backlog = schedule_inspections(&set, date("2024-01-15"), 30);
        let by_id: std::collections::HashMap<String, NaiveDate> = backlog
            .iter()
            .map(|e| (e.bridge.bridge_id(), e.due_date))
            .collect();

        assert_eq!(by_id["B-1"], date("2024-01-10"));
        assert_eq!(by_id["B-2"], date("2023-12-01"));
        // missing dates default to the reference date, zero days overdue
        assert_eq!(by_id["B-3"], date("2024-01-15"));
    }

    #[test]
    fn test_lead_time_window_inclusion() {
        let set = records(json!([
            { "structure_id": "soon", "next_inspection_due": "2024-01-20" },
            { "structure_id": "far", "next_inspection_due": "2024-04-01" },
        ]));

        let backlog = schedule_inspections(&set, date("2024-01-15"), 30);
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].bridge.bridge_id(), "soon");
        assert_eq!(backlog[0].days_overdue, -5);
    }

    #[test]
    fn test_backlog_sorted_and_deterministic_under_shuffle() {
        let forward = records(json!([
            { "structure_id": "a", "next_inspection_due": "2024-01-01" },
            { "structure_id": "b", "next_inspection_due": "2023-11-20" },
            { "structure_id": "c", "next_inspection_due": "2024-02-01" },
            { "structure_id": "d", "next_inspection_due": "2023-12-15" },
        ]));
        let mut reversed = forward.clone();
        reversed.reverse();

        let reference = date("2024-01-15");
        let sorted = schedule_inspections(&forward, reference, 30);
        let resorted = schedule_inspections(&reversed, reference, 30);

        assert_eq!(sorted, resorted);
        for pair in sorted.windows(2) {
            assert!(
                (pair[0].days_overdue, pair[0].due_date)
                    <= (pair[1].days_overdue, pair[1].due_date)
            );
        }
    }

    #[test]
    fn test_epoch_second_due_dates() {
        let set = records(json!([
            // 2024-01-01T00:00:00Z
            { "structure_id": "B-1", "next_inspection_date": 1704067200 },
        ]));

        let backlog = schedule_inspections(&set, date("2024-01-06"), 30);
        assert_eq!(backlog[0].due_date, date("2024-01-01"));
        assert_eq!(backlog[0].days_overdue, 5);
    }
}
