//! Notification delivery configuration

use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Delivery service URL; notifications are only logged when unset
    pub endpoint: Option<String>,

    /// Bearer token for the delivery service
    pub api_key: Option<Secret<String>>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub templates: NotificationTemplates,
}

/// Template ids passed to the delivery service
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NotificationTemplates {
    #[serde(default = "default_trial_expiring")]
    pub trial_expiring: String,

    #[serde(default = "default_trial_ended")]
    pub trial_ended: String,

    #[serde(default = "default_subscription_canceled")]
    pub subscription_canceled: String,
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ValidationError::InvalidNotificationEndpoint);
            }
        }
        self.templates.validate()
    }
}

impl NotificationTemplates {
    fn validate(&self) -> Result<(), ValidationError> {
        for (name, id) in [
            ("trial_expiring", &self.trial_expiring),
            ("trial_ended", &self.trial_ended),
            ("subscription_canceled", &self.subscription_canceled),
        ] {
            if id.trim().is_empty() {
                return Err(ValidationError::EmptyTemplate(name));
            }
        }
        Ok(())
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_timeout(),
            templates: NotificationTemplates::default(),
        }
    }
}

impl Default for NotificationTemplates {
    fn default() -> Self {
        Self {
            trial_expiring: default_trial_expiring(),
            trial_ended: default_trial_ended(),
            subscription_canceled: default_subscription_canceled(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_trial_expiring() -> String {
    "trial_expiring".to_string()
}

fn default_trial_ended() -> String {
    "trial_ended".to_string()
}

fn default_subscription_canceled() -> String {
    "subscription_canceled".to_string()
}
