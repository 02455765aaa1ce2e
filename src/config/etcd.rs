use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EtcdConfig {
    /// Whether settings come from the store at all. Without it only static
    /// defaults and dev params resolve.
    /// Default: false
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Root path of the settings tree
    /// Default: "/config"
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Default: "http"
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Default: "localhost"
    #[serde(default = "default_host")]
    pub host: String,

    /// Default: 2379
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP basic auth user
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Timeout of reads and writes. Watches use the long-poll timeout.
    /// Default: 5000
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Default: 1000
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            prefix: default_prefix(),
            protocol: default_protocol(),
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl EtcdConfig {
    pub fn endpoint(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefix.trim_matches('/').trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "etcd.prefix must not be empty".into(),
            )));
        }

        if !matches!(self.protocol.as_str(), "http" | "https") {
            return Err(Error::Config(ConfigError::Message(format!(
                "etcd.protocol must be http or https, got '{}'",
                self.protocol
            ))));
        }

        if self.host.is_empty() || self.port == 0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "invalid etcd address {}:{}",
                self.host, self.port
            ))));
        }

        if self.request_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "etcd timeouts must be greater than 0".into(),
            )));
        }

        if self.password.is_some() && self.username.is_none() {
            return Err(Error::Config(ConfigError::Message(
                "etcd.password requires etcd.username".into(),
            )));
        }

        Ok(())
    }
}

fn default_enabled() -> bool {
    false
}
fn default_prefix() -> String {
    "/config".to_string()
}
fn default_protocol() -> String {
    "http".to_string()
}
fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    2379
}
fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_connect_timeout_ms() -> u64 {
    1000
}
