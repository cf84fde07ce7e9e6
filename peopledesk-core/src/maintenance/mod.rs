//! Projection maintenance.
//!
//! Derived tables (checklist progress, survey responses) are reconciled
//! against their source tables by diffing key sets instead of truncating and
//! recreating them, so payload written by users survives a rebuild.
//!
//! Layers, leaves first:
//!
//! * [`guard`]: scoped suspension of foreign-key enforcement.
//! * [`unit_of_work`]: one commit/rollback boundary around a closure.
//! * [`engine`]: plan computation and application.
//! * [`rebuilder`]: the operator entry point tying the above together.

pub mod checklist_progress;
pub mod engine;
mod gate;
pub mod guard;
pub mod rebuilder;
pub mod survey_responses;
pub mod unit_of_work;

pub use checklist_progress::ChecklistProgress;
pub use engine::{apply_plan, rebuild_projection, Projection, RebuildPlan};
pub use gate::{MaintenanceGate, MaintenanceLease};
pub use guard::with_integrity_checks_suspended;
pub use rebuilder::{RebuildOptions, RebuildReport, Rebuilder};
pub use survey_responses::SurveyResponses;
pub use unit_of_work::{run_in_transaction, run_then_roll_back};
