//! Logging notifier - records notifications in the log instead of sending.
//!
//! Used when no delivery endpoint is configured.

use async_trait::async_trait;
use tracing::info;

use crate::domain::foundation::DomainError;
use crate::ports::{Notification, Notifier};

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), DomainError> {
        info!(
            user_id = %notification.user_id,
            template = %notification.template,
            vars = ?notification.vars,
            "notification (not delivered: no endpoint configured)"
        );
        Ok(())
    }
}
