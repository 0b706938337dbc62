//! HTTP adapter for provider webhooks.

mod handlers;
mod routes;

pub use handlers::{WebhookAck, WebhookAppState, SIGNATURE_HEADER, SIGNATURE_HEADER_ALIAS};
pub use routes::webhook_router;
