//! Live application settings backed by an etcd v2 keys tree.
//!
//! Settings resolve through three tiers: static defaults, per-environment
//! defaults stored under `{prefix}/{env}`, and named override sets stored
//! under `{prefix}/extensions/{set}` that a request opts into. Long-poll
//! watch loops keep the store-backed tiers current.
//!
//! ```ignore
//! let config = EtcdSettingsConfig::new()?.validate()?;
//! let proxy = SettingsProxy::from_config(&config, static_defaults, TaskLocalRequestContext).await?;
//! let _monitors = proxy.start_monitors()?;
//!
//! let timeout: u64 = with_request(RequestMetadata::from_header_value("beta"), async {
//!     proxy.resolve_as("API_TIMEOUT")
//! })
//! .await?;
//! ```

mod codec;
mod config;
mod constants;
mod errors;
mod loader;
mod manager;
pub mod metrics;
mod parser;
mod proxy;
mod store;
pub mod utils;
mod watch;

pub use codec::*;
pub use self::config::*;
pub use errors::*;
pub use loader::*;
pub use manager::*;
pub use metrics::register_custom_metrics;
pub use parser::*;
pub use proxy::*;
pub use store::*;
pub use watch::*;
