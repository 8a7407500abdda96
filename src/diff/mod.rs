//! Diff engine - three-way comparison and plan generation

mod compare;
mod engine;
mod plan;

pub use compare::{local_changed, remote_change, RemoteChange, MTIME_TOLERANCE_MS};
pub use engine::{DiffPlan, PlanStats};
pub use plan::generate_sync_plan;
