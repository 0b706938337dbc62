//! Provider webhook configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::webhook::{WebhookVerifier, DEFAULT_MAX_AGE_SECS, DEFAULT_MAX_FUTURE_SECS};

/// Provider webhook configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Shared signing secret
    pub secret: Secret<String>,

    /// Oldest accepted signature timestamp, in seconds
    #[serde(default = "default_tolerance")]
    pub tolerance_secs: i64,

    /// Allowed provider clock lead, in seconds
    #[serde(default = "default_future_tolerance")]
    pub future_tolerance_secs: i64,

    /// Processed-event records older than this are purged
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl WebhookConfig {
    pub fn verifier(&self) -> WebhookVerifier {
        WebhookVerifier::new(self.secret.clone())
            .with_tolerance(self.tolerance_secs, self.future_tolerance_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.secret.expose_secret().trim().is_empty() {
            return Err(ValidationError::MissingRequired("WEBHOOK__SECRET"));
        }
        if self.tolerance_secs <= 0 || self.future_tolerance_secs < 0 {
            return Err(ValidationError::InvalidWebhookTolerance);
        }
        Ok(())
    }
}

fn default_tolerance() -> i64 {
    DEFAULT_MAX_AGE_SECS
}

fn default_future_tolerance() -> i64 {
    DEFAULT_MAX_FUTURE_SECS
}

fn default_retention_days() -> u32 {
    30
}
