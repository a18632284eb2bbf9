//! Risk/condition threshold filtering.

use crate::records::BridgeRecord;

/// Keeps records whose resolved condition score is present and at or below
/// `max_condition_score`, optionally restricted to a set of risk labels
/// (case-insensitive).
///
/// A record the pipeline cannot assess is never reported low-risk: missing
/// or unparseable condition scores are excluded, not passed through.
pub fn filter_by_condition(
    records: &[BridgeRecord],
    max_condition_score: f64,
    risk_levels: Option<&[String]>,
) -> Vec<BridgeRecord> {
    let wanted_risks: Vec<String> = risk_levels
        .unwrap_or_default()
        .iter()
        .map(|level| level.to_lowercase())
        .collect();

    records
        .iter()
        .filter(|record| {
            let Some(score) = record.condition_score() else {
                return false;
            };
            if score > max_condition_score {
                return false;
            }
            if wanted_risks.is_empty() {
                return true;
            }
            record
                .risk_label()
                .is_some_and(|label| wanted_risks.contains(&label.to_lowercase()))
        })
        .cloned()
        .collect()
}
