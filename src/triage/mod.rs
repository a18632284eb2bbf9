//! Condition filtering, inspection scheduling, and repair proposals.
//!
//! Pure transforms over the working set: each stage takes records in,
//! produces new values out, and shares no mutable state. Their outputs are
//! what the lifecycle monitor consumes as events.

pub mod filter;
pub mod propose;
pub mod schedule;

pub use filter::filter_by_condition;
pub use propose::{Priority, RepairProposal, propose_repair_actions};
pub use schedule::{BacklogEntry, schedule_inspections};
