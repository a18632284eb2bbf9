//! Lifecycle tracking across the maintenance pipeline.
//!
//! [`LifecycleMonitor`] is the single stateful piece of the system: it
//! reconciles backlog snapshots, triage findings, work-order dispatches, and
//! crew progress reports — four independently-timed event streams — into one
//! status entry per structure, plus derived metrics.
//!
//! The monitor is an explicitly constructed owned value. Callers hold it for
//! the duration of a run and call [`LifecycleMonitor::reset`] between runs;
//! mutating calls must be serialized by the owner (single-writer, no
//! internal lock).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::BridgeRecord;
use crate::triage::{BacklogEntry, RepairProposal};

/// Caller-supplied event time: simulation day, intra-day time, and the
/// monotonic pipeline step used for ordering and latency math.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventClock {
    pub day: i64,
    pub t: f64,
    pub step: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    InspectionDue,
    Scheduled,
    Triaged,
    WorkOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Dispatched,
    InProgress,
}

/// Per-structure lifecycle state. One live entry per `bridge_id`, updated in
/// place, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatusEntry {
    pub bridge_id: String,
    pub name: Option<String>,
    pub priority: Option<String>,
    pub risk: Option<String>,
    pub status: LifecycleStatus,
    pub work_order_status: Option<WorkOrderStatus>,
    pub action: Option<String>,
    pub due_date: Option<String>,
    pub days_overdue: Option<i64>,
    pub lng: Option<f64>,
    pub lat: Option<f64>,
    pub last_update: Option<EventClock>,
}

impl BridgeStatusEntry {
    fn new(bridge_id: String, status: LifecycleStatus) -> Self {
        Self {
            bridge_id,
            name: None,
            priority: None,
            risk: None,
            status,
            work_order_status: None,
            action: None,
            due_date: None,
            days_overdue: None,
            lng: None,
            lat: None,
            last_update: None,
        }
    }

    /// Geometry is refined, never erased: a later event with no coordinates
    /// leaves known ones in place.
    fn merge_coords(&mut self, lng: Option<f64>, lat: Option<f64>) {
        if self.lng.is_none() {
            self.lng = lng;
        }
        if self.lat.is_none() {
            self.lat = lat;
        }
    }

    /// Priority/risk only move toward more knowledge: a null in a later
    /// event never regresses a known value.
    fn refine_priority(&mut self, priority: Option<&str>) {
        if let Some(priority) = priority {
            self.priority = Some(priority.to_string());
        }
    }

    fn refine_risk(&mut self, risk: Option<&str>) {
        if let Some(risk) = risk {
            self.risk = Some(risk.to_string());
        }
    }

    fn is_critical(&self) -> bool {
        self.priority
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("critical"))
    }
}

/// Work-order progress payload, the `repair-request` shape produced by the
/// dispatch layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderTask {
    pub bridge: BridgeRecord,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub risk: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionLogEntry {
    pub bridge_id: String,
    pub day: i64,
    pub t: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_overdue: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionLogEntry {
    pub bridge_id: String,
    pub priority: Option<String>,
    pub risk: Option<String>,
    pub action: Option<String>,
    pub assigned_to: Option<i64>,
    /// Steps between backlog entry and dispatch, when the origin was tracked.
    pub response_steps: Option<u64>,
    pub day: i64,
    pub t: f64,
}

/// Read-only snapshot of the monitor for persistence and visualization.
#[derive(Debug, Serialize)]
pub struct MonitorState {
    pub inspections: Vec<InspectionLogEntry>,
    pub interventions: Vec<InterventionLogEntry>,
    pub work_orders: Vec<BridgeStatusEntry>,
}

#[derive(Debug, Default)]
pub struct LifecycleMonitor {
    backlog_history: Vec<(u64, usize)>,
    pending_backlog_step: HashMap<String, u64>,
    response_times: Vec<u64>,
    mitigated_bridges: BTreeSet<String>,
    interventions: Vec<InterventionLogEntry>,
    inspections: Vec<InspectionLogEntry>,
    statuses: BTreeMap<String, BridgeStatusEntry>,
}

fn serialize_due(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl LifecycleMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all state. Call between unrelated runs; the monitor is never
    /// implicitly shared across them.
    pub fn reset(&mut self) {
        self.backlog_history.clear();
        self.pending_backlog_step.clear();
        self.response_times.clear();
        self.mitigated_bridges.clear();
        self.interventions.clear();
        self.inspections.clear();
        self.statuses.clear();
    }

    /// Records a backlog snapshot from the scheduler.
    ///
    /// Each structure's backlog step is remembered so a later dispatch can
    /// be charged a response latency. A `days_overdue` of zero or more means
    /// the inspection is due now; negative means merely scheduled.
    pub fn record_backlog(&mut self, backlog: &[BacklogEntry], clock: EventClock) {
        self.backlog_history.push((clock.step, backlog.len()));

        for entry in backlog {
            let bridge_id = entry.bridge.bridge_id();
            let due_date = entry.due_date.format("%Y-%m-%d").to_string();
            let risk = entry.bridge.risk_label().map(|r| r.to_lowercase());
            let (lng, lat) = entry.bridge.coords();

            self.inspections.push(InspectionLogEntry {
                bridge_id: bridge_id.clone(),
                day: clock.day,
                t: clock.t,
                due_date: Some(due_date.clone()),
                days_overdue: Some(entry.days_overdue),
                priority: None,
                risk: risk.clone(),
            });

            self.pending_backlog_step.insert(bridge_id.clone(), clock.step);

            let priority = if entry.days_overdue > 0 {
                "critical"
            } else {
                "scheduled"
            };
            let lifecycle = if entry.days_overdue >= 0 {
                LifecycleStatus::InspectionDue
            } else {
                LifecycleStatus::Scheduled
            };

            let status = self
                .statuses
                .entry(bridge_id.clone())
                .or_insert_with(|| BridgeStatusEntry::new(bridge_id, lifecycle));
            if status.name.is_none() {
                status.name = entry.bridge.display_name();
            }
            status.priority = Some(priority.to_string());
            status.refine_risk(risk.as_deref());
            status.status = lifecycle;
            status.due_date = Some(due_date);
            status.days_overdue = Some(entry.days_overdue);
            status.merge_coords(lng, lat);
            status.last_update = Some(clock);
        }
    }

    /// Records triage results from inspection reasoning.
    pub fn record_inspection_findings(&mut self, proposals: &[RepairProposal], clock: EventClock) {
        for proposal in proposals {
            let bridge_id = proposal.bridge.bridge_id();
            let (lng, lat) = proposal.bridge.coords();

            self.inspections.push(InspectionLogEntry {
                bridge_id: bridge_id.clone(),
                day: clock.day,
                t: clock.t,
                due_date: None,
                days_overdue: None,
                priority: Some(proposal.priority.to_string()),
                risk: Some(proposal.risk.clone()),
            });

            let status = self
                .statuses
                .entry(bridge_id.clone())
                .or_insert_with(|| BridgeStatusEntry::new(bridge_id, LifecycleStatus::Triaged));
            if status.name.is_none() {
                status.name = proposal.bridge.display_name();
            }
            status.refine_priority(Some(proposal.priority.as_str()));
            status.refine_risk(Some(&proposal.risk));
            status.status = LifecycleStatus::Triaged;
            status.merge_coords(lng, lat);
            status.last_update = Some(clock);
        }
    }

    /// Records a work-order dispatch for one structure.
    ///
    /// Consumes the pending backlog step if one exists, yielding at most one
    /// response-latency sample per backlog episode. A dispatch without a
    /// tracked backlog origin is not an error; it just contributes no sample.
    pub fn record_intervention(
        &mut self,
        bridge: &BridgeRecord,
        priority: Option<&str>,
        action: Option<&str>,
        assigned_to: Option<i64>,
        clock: EventClock,
    ) {
        let bridge_id = bridge.bridge_id();
        let response_steps = self
            .pending_backlog_step
            .remove(&bridge_id)
            .map(|entered| clock.step.saturating_sub(entered));
        if let Some(sample) = response_steps {
            self.response_times.push(sample);
        }

        let (lng, lat) = bridge.coords();
        let risk = bridge.risk_label();
        let due_date = bridge.next_due_raw().as_ref().map(serialize_due);

        self.interventions.push(InterventionLogEntry {
            bridge_id: bridge_id.clone(),
            priority: priority.map(str::to_string),
            risk: risk.clone(),
            action: action.map(str::to_string),
            assigned_to,
            response_steps,
            day: clock.day,
            t: clock.t,
        });

        let status = self
            .statuses
            .entry(bridge_id.clone())
            .or_insert_with(|| BridgeStatusEntry::new(bridge_id, LifecycleStatus::WorkOrder));
        if status.name.is_none() {
            status.name = bridge.display_name();
        }
        status.refine_priority(priority);
        status.refine_risk(risk.as_deref());
        status.status = LifecycleStatus::WorkOrder;
        status.work_order_status = Some(WorkOrderStatus::Dispatched);
        if action.is_some() {
            status.action = action.map(str::to_string);
        }
        if status.due_date.is_none() {
            status.due_date = due_date;
        }
        status.merge_coords(lng, lat);
        status.last_update = Some(clock);
    }

    /// Records crew progress on a dispatched work order.
    ///
    /// A critical-priority progress report marks the structure mitigated;
    /// the mitigated set is a set, so repeats are idempotent.
    pub fn record_work_order_status(&mut self, task: &WorkOrderTask, clock: EventClock) {
        let bridge_id = task.bridge.bridge_id();
        let (lng, lat) = task.bridge.coords();

        let status = self
            .statuses
            .entry(bridge_id.clone())
            .or_insert_with(|| BridgeStatusEntry::new(bridge_id.clone(), LifecycleStatus::WorkOrder));
        if status.name.is_none() {
            status.name = task.bridge.display_name();
        }
        status.status = LifecycleStatus::WorkOrder;
        status.work_order_status = Some(WorkOrderStatus::InProgress);
        if task.action.is_some() {
            status.action = task.action.clone();
        }
        status.refine_priority(task.priority.as_deref());
        status.refine_risk(task.risk.as_deref());
        status.merge_coords(lng, lat);
        status.last_update = Some(clock);

        let critical = task
            .priority
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("critical"));
        if critical {
            self.mitigated_bridges.insert(bridge_id);
        }
    }

    /// Point-in-time metrics as `(name, value, step)` tuples.
    pub fn get_metric_tuples(&self, current_step: u64) -> Vec<(&'static str, f64, u64)> {
        let mut metrics = Vec::new();

        if let (Some(first), Some(last)) = (self.backlog_history.first(), self.backlog_history.last())
        {
            metrics.push(("bridge/current_backlog", last.1 as f64, current_step));
            let reduction = first.1 as i64 - last.1 as i64;
            metrics.push(("bridge/backlog_reduction", reduction as f64, current_step));
        }

        if !self.response_times.is_empty() {
            let mean = self.response_times.iter().sum::<u64>() as f64
                / self.response_times.len() as f64;
            metrics.push(("bridge/avg_response_steps", mean, current_step));
        }

        let critical_open = self
            .statuses
            .values()
            .filter(|status| status.is_critical())
            .filter(|status| {
                matches!(
                    status.status,
                    LifecycleStatus::InspectionDue
                        | LifecycleStatus::Triaged
                        | LifecycleStatus::WorkOrder
                )
            })
            .count();
        metrics.push(("bridge/critical_open_work_orders", critical_open as f64, current_step));
        metrics.push((
            "bridge/risk_mitigated",
            self.mitigated_bridges.len() as f64,
            current_step,
        ));

        metrics
    }

    pub fn statuses(&self) -> impl Iterator<Item = &BridgeStatusEntry> {
        self.statuses.values()
    }

    pub fn status_of(&self, bridge_id: &str) -> Option<&BridgeStatusEntry> {
        self.statuses.get(bridge_id)
    }

    /// Full snapshot of logs and current statuses; no mutation.
    pub fn export_state(&self) -> MonitorState {
        MonitorState {
            inspections: self.inspections.clone(),
            interventions: self.interventions.clone(),
            work_orders: self.statuses.values().cloned().collect(),
        }
    }
}
