use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::info;

use super::RequestContext;
use super::RequestMetadata;
use super::SettingsLayer;
use crate::constants::DEFAULT_REQUEST_HEADER;
use crate::is_upper_identifier;
use crate::new_snapshot;
use crate::watch::MergeBatch;
use crate::watch::SharedSnapshot;
use crate::watch::WatchHandle;
use crate::ConfigManager;
use crate::ConfigMap;
use crate::ConfigValue;
use crate::DevParams;
use crate::EnvironmentDefaults;
use crate::Error;
use crate::EtcdClient;
use crate::EtcdSettingsConfig;
use crate::ExtensionSets;
use crate::KvStore;
use crate::Result;

/// Live settings of one environment, resolved per request.
///
/// The snapshots are shared with the watch loops started by
/// [`start_monitors`](Self::start_monitors); every resolution reads the
/// latest published batch.
pub struct SettingsProxy<S: KvStore = EtcdClient> {
    env: String,
    manager: Option<ConfigManager<S>>,
    env_defaults: SharedSnapshot<EnvironmentDefaults>,
    extension_sets: SharedSnapshot<ExtensionSets>,
    static_defaults: Arc<dyn SettingsLayer>,
    request_context: Arc<dyn RequestContext>,
    request_header: String,
}

impl SettingsProxy<EtcdClient> {
    /// Proxy over etcd when `etcd.enabled`, otherwise over static defaults
    /// and dev params only.
    pub async fn from_config(
        config: &EtcdSettingsConfig,
        static_defaults: impl SettingsLayer + 'static,
        request_context: impl RequestContext + 'static,
    ) -> Result<Self> {
        if config.etcd.enabled {
            let manager = ConfigManager::connect(config)?;
            let proxy = Self::with_manager(&config.proxy.env, manager, static_defaults, request_context).await?;
            return Ok(proxy.with_request_header(&config.proxy.request_header));
        }

        let dev_params = match &config.proxy.dev_params_file {
            Some(path) => DevParams::File(path.clone()),
            None => DevParams::Empty,
        };
        Ok(Self::without_store(
            &config.proxy.env,
            dev_params.load()?,
            static_defaults,
            request_context,
        )
        .with_request_header(&config.proxy.request_header))
    }
}

impl<S: KvStore> SettingsProxy<S> {
    /// Fetches extension sets and env defaults concurrently.
    pub async fn with_manager(
        env: &str,
        manager: ConfigManager<S>,
        static_defaults: impl SettingsLayer + 'static,
        request_context: impl RequestContext + 'static,
    ) -> Result<Self> {
        let (extension_sets, env_defaults) =
            tokio::try_join!(manager.fetch_extension_sets(), manager.fetch_env_defaults(env))?;
        info!(
            env,
            env_defaults = env_defaults.len(),
            extension_sets = extension_sets.len(),
            "settings loaded from store"
        );

        Ok(Self {
            env: env.to_string(),
            manager: Some(manager),
            env_defaults: new_snapshot(env_defaults),
            extension_sets: new_snapshot(extension_sets),
            static_defaults: Arc::new(static_defaults),
            request_context: Arc::new(request_context),
            request_header: DEFAULT_REQUEST_HEADER.to_string(),
        })
    }

    /// Store-less proxy: `dev_params` stand in for env defaults and no
    /// override set exists.
    pub fn without_store(
        env: &str,
        dev_params: ConfigMap,
        static_defaults: impl SettingsLayer + 'static,
        request_context: impl RequestContext + 'static,
    ) -> Self {
        Self {
            env: env.to_string(),
            manager: None,
            env_defaults: new_snapshot(dev_params),
            extension_sets: new_snapshot(ExtensionSets::new()),
            static_defaults: Arc::new(static_defaults),
            request_context: Arc::new(request_context),
            request_header: DEFAULT_REQUEST_HEADER.to_string(),
        }
    }

    /// Header read by [`request_from_headers`](Self::request_from_headers)
    pub fn with_request_header(
        mut self,
        name: &str,
    ) -> Self {
        self.request_header = name.to_ascii_lowercase();
        self
    }

    pub fn request_header(&self) -> &str {
        &self.request_header
    }

    /// Override sets selected by an incoming request's headers
    pub fn request_from_headers(
        &self,
        headers: &HeaderMap,
    ) -> RequestMetadata {
        RequestMetadata::from_header_map(headers, &self.request_header)
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn manager(&self) -> Option<&ConfigManager<S>> {
        self.manager.as_ref()
    }

    pub fn env_defaults(&self) -> Arc<EnvironmentDefaults> {
        self.env_defaults.load_full()
    }

    pub fn extension_sets(&self) -> Arc<ExtensionSets> {
        self.extension_sets.load_full()
    }

    /// Starts the env-defaults and extension-sets watch loops. Without a
    /// store there is nothing to watch and no handle is returned.
    pub fn start_monitors(&self) -> Result<Vec<WatchHandle>> {
        let Some(manager) = &self.manager else {
            debug!("no store configured, monitors not started");
            return Ok(Vec::new());
        };

        Ok(vec![
            manager.watch_env_defaults(&self.env, self.env_defaults.clone(), None)?,
            manager.watch_extension_sets(self.extension_sets.clone(), None)?,
        ])
    }

    /// Resolves `identifier` for the current request.
    ///
    /// # Errors
    /// [`Error::NotFound`] when no tier defines it
    pub fn resolve(
        &self,
        identifier: &str,
    ) -> Result<ConfigValue> {
        let request = self.request_context.current_request();
        self.resolve_for(identifier, request.as_ref())
            .ok_or_else(|| Error::NotFound(identifier.to_string()))
    }

    /// Resolves `identifier` and deserializes it. Timestamps deserialize
    /// from their ISO-8601 form.
    pub fn resolve_as<T: DeserializeOwned>(
        &self,
        identifier: &str,
    ) -> Result<T> {
        let value = self.resolve(identifier)?;
        serde_json::from_value(value.to_plain_json()).map_err(|source| Error::Conversion {
            identifier: identifier.to_string(),
            source,
        })
    }

    /// Resolves `identifier` as if `request` were being served.
    ///
    /// Override values that are mappings deep-merge into a mapping base;
    /// anything else replaces it. The result is always an owned copy.
    pub fn resolve_for(
        &self,
        identifier: &str,
        request: Option<&RequestMetadata>,
    ) -> Option<ConfigValue> {
        let mut value = self.base_value(identifier);

        let Some(request) = request else {
            return value;
        };
        let extension_sets = self.extension_sets.load();
        for set_name in request.override_set_names() {
            let Some(override_value) = extension_sets.get(set_name).and_then(|set| set.get(identifier)) else {
                continue;
            };
            value = Some(match value.take() {
                Some(mut current) if current.is_object() && override_value.is_object() => {
                    current.merge_from(override_value);
                    current
                }
                _ => override_value.clone(),
            });
        }
        value
    }

    /// Every uppercase static default plus every env default, env defaults
    /// winning. Override sets are not applied.
    pub fn as_mapping(&self) -> ConfigMap {
        let mut mapping: ConfigMap = self
            .static_defaults
            .identifiers()
            .into_iter()
            .filter(|identifier| is_upper_identifier(identifier))
            .filter_map(|identifier| {
                let value = self.static_defaults.lookup(&identifier)?;
                Some((identifier, value))
            })
            .collect();

        let env_defaults = self.env_defaults.load();
        mapping.merge_batch(&**env_defaults);
        mapping
    }

    fn base_value(
        &self,
        identifier: &str,
    ) -> Option<ConfigValue> {
        let env_defaults = self.env_defaults.load();
        let tiers: [&dyn SettingsLayer; 2] = [&**env_defaults, self.static_defaults.as_ref()];
        tiers.iter().find_map(|tier| tier.lookup(identifier))
    }
}
