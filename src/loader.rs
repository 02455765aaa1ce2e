//! One-shot settings loading for process startup, before any proxy or
//! watch exists.

use std::sync::Arc;

use tracing::info;

use crate::ConfigManager;
use crate::ConfigMap;
use crate::DevParams;
use crate::EtcdClient;
use crate::EtcdSettingsConfig;
use crate::Result;

/// Env defaults of `env` overlaid with dev params.
///
/// Without a store config, or with `etcd.enabled = false`, only the dev
/// params are returned.
pub async fn get_overwrites(
    env: &str,
    dev_params: &DevParams,
    config: Option<&EtcdSettingsConfig>,
) -> Result<ConfigMap> {
    let Some(config) = config.filter(|config| config.etcd.enabled) else {
        return dev_params.load();
    };

    let client = EtcdClient::new(&config.etcd)?;
    let manager = ConfigManager::builder(Arc::new(client))
        .prefix(config.etcd.prefix.clone())
        .watch_config(config.watch.clone())
        .dev_params(dev_params.clone())
        .build()?;

    let overwrites = manager.fetch_env_defaults(env).await?;
    info!(env, endpoint = manager.store().endpoint(), settings = overwrites.len(), "overwrites loaded");
    Ok(overwrites)
}
