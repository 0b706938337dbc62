//! Ledger write behaviour

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Re-read-and-retry attempts after a version conflict
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on each store call
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
}

impl LedgerConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.store_timeout_ms == 0 {
            return Err(ValidationError::InvalidStoreTimeout);
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            store_timeout_ms: default_store_timeout(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_store_timeout() -> u64 {
    5000
}
