//! HTTP notifier - posts notifications to a delivery service.
//!
//! # Request
//!
//! ```text
//! POST {endpoint}
//! Authorization: Bearer {api_key}      (when configured)
//! Content-Type: application/json
//!
//! {"user_id": "7", "template": "trial_expiring", "vars": {"plan_id": "premium"}}
//! ```
//!
//! Any 2xx is success. Other statuses and transport errors map to
//! `NotificationFailed`; retrying is the caller's concern.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;

use crate::config::NotificationConfig;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{Notification, Notifier};

pub struct HttpNotifier {
    endpoint: String,
    api_key: Option<Secret<String>>,
    client: Client,
}

impl HttpNotifier {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<Secret<String>>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Failed to create HTTP client: {}", e),
            )
        })?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            client,
        })
    }

    /// `None` when no endpoint is configured.
    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>, DomainError> {
        config
            .endpoint
            .as_ref()
            .map(|endpoint| Self::new(endpoint.clone(), config.api_key.clone(), config.timeout()))
            .transpose()
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), DomainError> {
        let mut request = self.client.post(&self.endpoint).json(notification);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            DomainError::new(
                ErrorCode::NotificationFailed,
                format!("Notification request failed: {}", e),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::new(
                ErrorCode::NotificationFailed,
                format!("Notification service returned {}", status),
            )
            .with_detail("template", notification.template.clone()));
        }

        tracing::debug!(
            user_id = %notification.user_id,
            template = %notification.template,
            "notification delivered"
        );
        Ok(())
    }
}
