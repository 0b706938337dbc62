//! Application layer - Commands, Queries, and Handlers.
//!
//! Handlers orchestrate domain operations against the ports. Every write
//! goes through `LedgerContext`, which owns the version-guarded retry loop
//! and the audit trail.

mod audit_recorder;
pub mod handlers;
mod ledger;
mod sweeper;

#[cfg(test)]
pub(crate) mod testing;

pub use audit_recorder::AuditRecorder;
pub use ledger::{LedgerContext, LedgerSettings, Mutation};
pub use sweeper::{SweepReport, SweepSettings, TrialSweeper};
