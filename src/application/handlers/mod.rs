//! Application handlers.
//!
//! - `subscription` - user commands and read queries over the ledger
//! - `webhook` - provider event reconciliation

pub mod subscription;
pub mod webhook;
