//! Notifier port - outbound user notifications.
//!
//! The core only decides *that* a user is told something; delivery
//! (mail transport, templating) lives behind this port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::{DomainError, UserId};

/// A templated message for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    /// Template id understood by the delivery service.
    pub template: String,
    pub vars: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(user_id: UserId, template: impl Into<String>) -> Self {
        Self {
            user_id,
            template: template.into(),
            vars: BTreeMap::new(),
        }
    }

    pub fn var(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.vars.insert(key.into(), value.to_string());
        self
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Hands the notification to the delivery service.
    ///
    /// # Errors
    ///
    /// `NotificationFailed` when the service rejected or could not be reached.
    async fn send(&self, notification: &Notification) -> Result<(), DomainError>;
}
