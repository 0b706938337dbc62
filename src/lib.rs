//! Subledger - subscription ledger with provider webhook reconciliation.
//!
//! Tracks one billing-state aggregate per user through trial, active,
//! past-due, and canceled states. Changes arrive from three directions:
//! user commands, signed provider webhooks, and a periodic sweeper that
//! advances time-based transitions.
//!
//! # Layout
//!
//! - `domain` - plan catalog, subscription aggregate, audit records, webhook parsing
//! - `ports` - storage, notification, and clock contracts
//! - `application` - command/query handlers, the reconciler, and the sweeper
//! - `adapters` - PostgreSQL, in-memory, HTTP, notifier, and scheduler implementations
//! - `config` - environment-driven configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
