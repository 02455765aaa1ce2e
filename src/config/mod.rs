//! Crate configuration.
//!
//! Loaded hierarchically:
//! 1. Type defaults
//! 2. File named by `CONFIG_PATH` (toml)
//! 3. Environment variables prefixed `ETCD_SETTINGS__` (highest priority)
mod etcd;
mod proxy;
mod watch;
pub use etcd::*;
pub use proxy::*;
pub use watch::*;

use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::Result;

/// Connection, watch and proxy settings of the settings engine
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EtcdSettingsConfig {
    /// Coordination store connection
    #[serde(default)]
    pub etcd: EtcdConfig,
    /// Long-poll behaviour of the watch loops
    #[serde(default)]
    pub watch: WatchConfig,
    /// Request-scoped resolution
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl EtcdSettingsConfig {
    /// Loads configuration from defaults, `CONFIG_PATH` and environment
    /// variables, without validation.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("ETCD_SETTINGS__ETCD__HOST", "etcd.internal");
    /// let cfg = EtcdSettingsConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Layers another file over the current values. Environment variables
    /// still win. Call `validate()` afterwards.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(self) -> Result<Self> {
        self.etcd.validate()?;
        self.watch.validate()?;
        self.proxy.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
