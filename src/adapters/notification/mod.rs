//! Notifier adapters.
//!
//! - `HttpNotifier` - JSON POST to the delivery service
//! - `LoggingNotifier` - log-only fallback

mod http_notifier;
mod logging_notifier;

pub use http_notifier::HttpNotifier;
pub use logging_notifier::LoggingNotifier;
