//! Sharded, budgeted listing scan

pub mod budget;
pub mod orchestrator;

pub use budget::{shard_venues, BudgetStop, RunBudget};
pub use orchestrator::{Orchestrator, ScanReport};
