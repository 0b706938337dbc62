//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the core to external systems:
//! - `postgres` - durable stores (sqlx)
//! - `memory` - in-process stores for tests and local runs
//! - `notification` - notifier implementations
//! - `clock` - wall and fixed clocks
//! - `http` - axum routers
//! - `scheduler` - background sweep loop

pub mod clock;
pub mod http;
pub mod memory;
pub mod notification;
pub mod postgres;
pub mod scheduler;
