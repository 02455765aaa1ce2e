use std::path::PathBuf;

use config::ConfigError;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_REQUEST_HEADER;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProxyConfig {
    /// Environment whose defaults are served
    /// Default: "dev"
    #[serde(default = "default_env")]
    pub env: String,

    /// Request header listing override sets, whitespace separated
    /// Default: "x-dynamic-setting"
    #[serde(default = "default_request_header")]
    pub request_header: String,

    /// File whose mtime is bumped after every env-defaults update, for
    /// servers that reload on touch
    #[serde(default)]
    pub reload_signal_file: Option<PathBuf>,

    /// JSON object of local overrides that always win over the store
    #[serde(default)]
    pub dev_params_file: Option<PathBuf>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            env: default_env(),
            request_header: default_request_header(),
            reload_signal_file: None,
            dev_params_file: None,
        }
    }
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<()> {
        let env_pattern = Regex::new(r"^[\w\-\.]+$").map_err(|e| Error::Config(ConfigError::Message(e.to_string())))?;
        if !env_pattern.is_match(&self.env) {
            return Err(Error::Config(ConfigError::Message(format!(
                "proxy.env '{}' must match [\\w.-]+",
                self.env
            ))));
        }

        if self.request_header.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "proxy.request_header must not be empty".into(),
            )));
        }

        Ok(())
    }
}

fn default_env() -> String {
    "dev".to_string()
}
fn default_request_header() -> String {
    DEFAULT_REQUEST_HEADER.to_string()
}
