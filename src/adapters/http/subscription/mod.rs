//! HTTP adapter for subscription endpoints.

pub mod dto;
mod handlers;
mod routes;

pub use handlers::{AdminCaller, CallerId, SubscriptionAppState};
pub use routes::subscription_router;
