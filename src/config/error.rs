//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid bind address")]
    InvalidBindAddress,

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Webhook tolerance must be positive")]
    InvalidWebhookTolerance,

    #[error("Sweeper interval must be at least one second")]
    InvalidSweepInterval,

    #[error("Sweeper batch size must be between 1 and 1000")]
    InvalidBatchSize,

    #[error("Ledger store timeout must be positive")]
    InvalidStoreTimeout,

    #[error("Invalid notification endpoint URL")]
    InvalidNotificationEndpoint,

    #[error("Notification template id for {0} is empty")]
    EmptyTemplate(&'static str),
}
