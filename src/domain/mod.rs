//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, state machine)
//! - `catalog` - Plans and price ordering
//! - `subscription` - Subscription aggregate and lifecycle rules
//! - `webhook` - Provider events and signature verification
//! - `audit` - Audit trail records

pub mod audit;
pub mod catalog;
pub mod foundation;
pub mod subscription;
pub mod webhook;
