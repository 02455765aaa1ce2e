use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::ConfigManagerBuilder;
use super::DevParams;
use crate::codec::encode_value;
use crate::is_upper_identifier;
use crate::metrics::WRITE_FAILURES_TOTAL;
use crate::utils::async_task::spawn_named;
use crate::utils::file_io::signal_reload;
use crate::watch::merge_into;
use crate::watch::ActiveWatches;
use crate::watch::ClusterIndexState;
use crate::watch::MergeBatch;
use crate::watch::SharedSnapshot;
use crate::watch::WatchHandle;
use crate::watch::WatchLoop;
use crate::ConfigMap;
use crate::ConfigTreeParser;
use crate::EnvironmentDefaults;
use crate::Error;
use crate::EtcdClient;
use crate::EtcdSettingsConfig;
use crate::ExtensionSets;
use crate::KeyCodec;
use crate::KvStore;
use crate::Result;
use crate::StoreError;
use crate::StoreResponse;
use crate::WatchConfig;

/// Identifier -> error message of every setting that failed to write
pub type WriteErrors = BTreeMap<String, String>;

/// Set name -> per-identifier write errors
pub type ExtensionWriteErrors = BTreeMap<String, WriteErrors>;

/// Reads, writes and watches one settings tree in the store.
///
/// The watch loops of one manager share a [`ClusterIndexState`]; keep a
/// single manager per process and per tree.
pub struct ConfigManager<S: KvStore = EtcdClient> {
    pub(super) store: Arc<S>,
    pub(super) parser: ConfigTreeParser,
    pub(super) cluster_index: Arc<ClusterIndexState>,
    pub(super) watch_config: WatchConfig,
    pub(super) dev_params: Arc<ConfigMap>,
    pub(super) reload_signal_file: Option<PathBuf>,
    pub(super) active_watches: ActiveWatches,
}

impl ConfigManager<EtcdClient> {
    /// Manager over an etcd client built from `config`, with dev params and
    /// reload signal file taken from the proxy section.
    pub fn connect(config: &EtcdSettingsConfig) -> Result<Self> {
        let client = EtcdClient::new(&config.etcd)?;
        let mut builder = ConfigManagerBuilder::new(Arc::new(client))
            .prefix(config.etcd.prefix.clone())
            .watch_config(config.watch.clone());
        if let Some(path) = &config.proxy.dev_params_file {
            builder = builder.dev_params(DevParams::File(path.clone()));
        }
        if let Some(path) = &config.proxy.reload_signal_file {
            builder = builder.reload_signal_file(path.clone());
        }
        builder.build()
    }
}

impl<S: KvStore> ConfigManager<S> {
    pub fn builder(store: Arc<S>) -> ConfigManagerBuilder<S> {
        ConfigManagerBuilder::new(store)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn codec(&self) -> &KeyCodec {
        self.parser.codec()
    }

    pub fn cluster_index(&self) -> &Arc<ClusterIndexState> {
        &self.cluster_index
    }

    pub fn dev_params(&self) -> &ConfigMap {
        &self.dev_params
    }

    /// Recursive read of `{prefix}/{env}`, overlaid with dev params.
    pub async fn fetch_env_defaults(
        &self,
        env: &str,
    ) -> Result<EnvironmentDefaults> {
        let path = self.codec().env_defaults_path(env);
        let response = self.store.read(&path, true).await?;
        self.cluster_index.advance(response.index);

        let mut defaults = self.parser.parse_env_defaults(&response.leaves)?;
        defaults.merge_batch(&self.dev_params);
        debug!(env, path = %path, settings = defaults.len(), "env defaults fetched");
        Ok(defaults)
    }

    /// Recursive read of `{prefix}/extensions`. A missing directory means no
    /// sets are configured.
    pub async fn fetch_extension_sets(&self) -> Result<ExtensionSets> {
        let path = self.codec().extensions_path();
        let response = match self.store.read(path, true).await {
            Ok(response) => response,
            Err(StoreError::KeyNotFound(_)) => {
                warn!(path, "Unable to find config sets (expected a directory)");
                return Ok(ExtensionSets::new());
            }
            Err(e) => return Err(e.into()),
        };
        self.cluster_index.advance(response.index);

        let sets = self.parser.parse_extension_sets(&response.leaves)?;
        debug!(path, sets = sets.len(), "extension sets fetched");
        Ok(sets)
    }

    /// Writes every uppercase identifier of `defaults` under `{prefix}/{env}`.
    ///
    /// Failures are collected per identifier; the local snapshot only
    /// changes once a watch picks the writes up.
    pub async fn write_env_defaults(
        &self,
        env: &str,
        defaults: &ConfigMap,
    ) -> WriteErrors {
        let dir = self.codec().env_defaults_path(env);
        self.write_mapping(&dir, defaults).await
    }

    /// Writes every set under `{prefix}/extensions/{set}`. Errors are grouped
    /// by set name; sets without failures are absent.
    pub async fn write_extension_sets(
        &self,
        sets: &ExtensionSets,
    ) -> ExtensionWriteErrors {
        let mut errors = ExtensionWriteErrors::new();
        for (set_name, overrides) in sets {
            let dir = self.codec().extension_set_path(set_name);
            let set_errors = self.write_mapping(&dir, overrides).await;
            if !set_errors.is_empty() {
                errors.insert(set_name.clone(), set_errors);
            }
        }
        errors
    }

    async fn write_mapping(
        &self,
        dir: &str,
        mapping: &ConfigMap,
    ) -> WriteErrors {
        let mut errors = WriteErrors::new();
        for (identifier, value) in mapping {
            if !is_upper_identifier(identifier) {
                debug!(identifier = %identifier, "skipping non-uppercase identifier");
                continue;
            }

            let path = format!("{}/{}", dir, KeyCodec::encode_key(identifier));
            let result = match encode_value(value) {
                Ok(raw) => self.store.write(&path, &raw).await.map_err(Error::from),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                warn!(identifier = %identifier, path = %path, "failed to write setting: {}", e);
                WRITE_FAILURES_TOTAL.with_label_values(&[dir]).inc();
                errors.insert(identifier.clone(), e.to_string());
            }
        }
        errors
    }

    /// Keeps `snapshot` in sync with `{prefix}/{env}` in the background.
    ///
    /// Every applied batch re-applies dev params and touches the reload
    /// signal file. `max_events` bounds the number of iterations; `None`
    /// runs until the handle is aborted. Must be called within a Tokio
    /// runtime.
    ///
    /// # Errors
    /// [`Error::WatchAlreadyActive`] when this environment is already watched
    pub fn watch_env_defaults(
        &self,
        env: &str,
        snapshot: SharedSnapshot<EnvironmentDefaults>,
        max_events: Option<u64>,
    ) -> Result<WatchHandle> {
        let parser = self.parser.clone();
        let dev_params = self.dev_params.clone();
        let reload_signal_file = self.reload_signal_file.clone();

        self.spawn_watch(
            self.codec().env_defaults_path(env),
            max_events,
            move |response: StoreResponse| {
                let batch = parser.parse_env_defaults(&response.leaves)?;
                merge_into(&snapshot, &batch, |merged| merged.merge_batch(&dev_params));
                if let Some(path) = &reload_signal_file {
                    signal_reload(path);
                }
                Ok(())
            },
        )
    }

    /// Keeps `snapshot` in sync with `{prefix}/extensions` in the background.
    ///
    /// # Errors
    /// [`Error::WatchAlreadyActive`] when extension sets are already watched
    pub fn watch_extension_sets(
        &self,
        snapshot: SharedSnapshot<ExtensionSets>,
        max_events: Option<u64>,
    ) -> Result<WatchHandle> {
        let parser = self.parser.clone();

        self.spawn_watch(
            self.codec().extensions_path().to_string(),
            max_events,
            move |response: StoreResponse| {
                let batch = parser.parse_extension_sets(&response.leaves)?;
                merge_into(&snapshot, &batch, |_| {});
                Ok(())
            },
        )
    }

    fn spawn_watch<F>(
        &self,
        path: String,
        max_events: Option<u64>,
        on_batch: F,
    ) -> Result<WatchHandle>
    where
        F: FnMut(StoreResponse) -> Result<()> + Send + 'static,
    {
        let registration = self.active_watches.register(&path)?;
        let watch_loop = WatchLoop::new(
            self.store.clone(),
            path.clone(),
            self.cluster_index.clone(),
            self.watch_config.clone(),
        );

        let handle = spawn_named(format!("watch {path}"), async move {
            let _registration = registration;
            watch_loop.run(max_events, on_batch).await
        });
        Ok(WatchHandle::new(path, handle))
    }
}
