//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `SUBLEDGER` prefix and
//! `__` between nesting levels.
//!
//! # Example
//!
//! ```no_run
//! use subledger::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod ledger;
mod notification;
mod server;
mod sweeper;
mod webhook;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use ledger::LedgerConfig;
pub use notification::{NotificationConfig, NotificationTemplates};
pub use server::{Environment, ServerConfig};
pub use sweeper::SweeperConfig;
pub use webhook::WebhookConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub webhook: WebhookConfig,

    #[serde(default)]
    pub sweeper: SweeperConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub notification: NotificationConfig,
}

impl AppConfig {
    /// Load configuration from the environment
    ///
    /// A `.env` file is read first when present.
    ///
    /// - `SUBLEDGER__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SUBLEDGER__WEBHOOK__SECRET=whsec_...` -> `webhook.secret`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into their expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUBLEDGER")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.webhook.validate()?;
        self.sweeper.validate()?;
        self.ledger.validate()?;
        self.notification.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "SUBLEDGER__DATABASE__URL",
        "SUBLEDGER__WEBHOOK__SECRET",
        "SUBLEDGER__SERVER__PORT",
        "SUBLEDGER__SERVER__ENVIRONMENT",
        "SUBLEDGER__SWEEPER__TRIAL_LOOKAHEAD_DAYS",
        "SUBLEDGER__LEDGER__MAX_RETRIES",
        "SUBLEDGER__NOTIFICATION__ENDPOINT",
    ];

    fn set_minimal_env() {
        env::set_var("SUBLEDGER__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("SUBLEDGER__WEBHOOK__SECRET", "whsec_test");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn loads_from_environment_with_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.database.url.expose_secret(),
            "postgresql://test@localhost/test"
        );
        assert_eq!(config.webhook.secret.expose_secret(), "whsec_test");
        assert_eq!(config.webhook.tolerance_secs, 300);
        assert_eq!(config.sweeper.interval_secs, 3600);
        assert_eq!(config.sweeper.trial_lookahead_days, 3);
        assert_eq!(config.ledger.max_retries, 3);
        assert!(config.notification.endpoint.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_nested_values() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SUBLEDGER__SERVER__PORT", "3000");
        env::set_var("SUBLEDGER__SWEEPER__TRIAL_LOOKAHEAD_DAYS", "5");
        env::set_var("SUBLEDGER__LEDGER__MAX_RETRIES", "7");
        env::set_var("SUBLEDGER__NOTIFICATION__ENDPOINT", "https://notify.internal/send");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.sweeper.trial_lookahead_days, 5);
        assert_eq!(config.ledger.max_retries, 7);
        assert_eq!(
            config.notification.endpoint.as_deref(),
            Some("https://notify.internal/send")
        );
    }

    #[test]
    fn production_flag_follows_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SUBLEDGER__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().is_production());
    }

    #[test]
    fn missing_webhook_secret_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("SUBLEDGER__DATABASE__URL", "postgresql://test@localhost/test");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }
}
