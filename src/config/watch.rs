use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// How long one long-poll request may block waiting for a change
    /// Default: 50000
    #[serde(default = "default_long_polling_timeout_ms")]
    pub long_polling_timeout_ms: u64,

    /// Pause after a failed poll before trying again
    /// Default: 5000
    #[serde(default = "default_long_polling_safety_delay_ms")]
    pub long_polling_safety_delay_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            long_polling_timeout_ms: default_long_polling_timeout_ms(),
            long_polling_safety_delay_ms: default_long_polling_safety_delay_ms(),
        }
    }
}

impl WatchConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.long_polling_timeout_ms)
    }

    pub fn safety_delay(&self) -> Duration {
        Duration::from_millis(self.long_polling_safety_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.long_polling_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.long_polling_timeout_ms must be greater than 0".into(),
            )));
        }
        if self.long_polling_safety_delay_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.long_polling_safety_delay_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_long_polling_timeout_ms() -> u64 {
    50_000
}
fn default_long_polling_safety_delay_ms() -> u64 {
    5_000
}
