//! Repair prioritization and recommended actions.

use serde::{Deserialize, Serialize};

use crate::records::BridgeRecord;

/// Priority tier for a repair proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    Routine,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::Routine => "routine",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const CRITICAL_ACTION: &str =
    "Stabilize, post warning signage, and initiate emergency repair crew dispatch";
const ROUTINE_ACTION: &str = "Schedule preventive maintenance and patch identified defects";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairProposal {
    pub bridge: BridgeRecord,
    pub priority: Priority,
    pub risk: String,
    pub recommended_action: String,
}

/// Classifies records into priority tiers with a fixed recommended action
/// per tier.
///
/// A record without a parseable condition score yields no proposal: there is
/// nothing to recommend an action from.
pub fn propose_repair_actions(records: &[BridgeRecord], severe_threshold: f64) -> Vec<RepairProposal> {
    records
        .iter()
        .filter_map(|record| {
            let score = record.condition_score()?;
            let priority = if score <= severe_threshold {
                Priority::Critical
            } else {
                Priority::Routine
            };
            let action = match priority {
                Priority::Critical => CRITICAL_ACTION,
                Priority::Routine => ROUTINE_ACTION,
            };
            Some(RepairProposal {
                bridge: record.clone(),
                priority,
                risk: record.risk_label().unwrap_or_else(|| "unknown".to_string()),
                recommended_action: action.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: serde_json::Value) -> Vec<BridgeRecord> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_priority_threshold() {
        let set = records(json!([
            { "structure_id": "B-1", "condition_rating": 2 },
            { "structure_id": "B-2", "condition_rating": 5 },
        ]));

        let proposals = propose_repair_actions(&set, 3.0);
        assert_eq!(proposals[0].priority, Priority::Critical);
        assert_eq!(proposals[1].priority, Priority::Routine);
    }

    #[test]
    fn test_threshold_boundary_is_critical() {
        let set = records(json!([{ "structure_id": "B-1", "condition_rating": 3 }]));
        assert_eq!(propose_repair_actions(&set, 3.0)[0].priority, Priority::Critical);
    }

    #[test]
    fn test_unscored_records_are_skipped() {
        let set = records(json!([
            { "structure_id": "B-1" },
            { "structure_id": "B-2", "condition_rating": 1 },
        ]));

        let proposals = propose_repair_actions(&set, 3.0);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].bridge.bridge_id(), "B-2");
    }

    #[test]
    fn test_action_text_is_tier_lookup() {
        let set = records(json!([
            { "structure_id": "B-1", "condition_rating": 1 },
            { "structure_id": "B-2", "condition_rating": 1 },
        ]));

        let proposals = propose_repair_actions(&set, 3.0);
        assert_eq!(proposals[0].recommended_action, proposals[1].recommended_action);
        assert_eq!(proposals[0].recommended_action, CRITICAL_ACTION);
    }

    #[test]
    fn test_risk_defaults_to_unknown() {
        let set = records(json!([{ "structure_id": "B-1", "condition_rating": 1 }]));
        assert_eq!(propose_repair_actions(&set, 3.0)[0].risk, "unknown");
    }
}
