use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::ConfigManager;
use super::DevParams;
use crate::watch::ActiveWatches;
use crate::watch::ClusterIndexState;
use crate::ConfigTreeParser;
use crate::KeyCodec;
use crate::KvStore;
use crate::Result;
use crate::WatchConfig;

pub struct ConfigManagerBuilder<S: KvStore> {
    store: Arc<S>,
    prefix: String,
    watch_config: WatchConfig,
    dev_params: DevParams,
    reload_signal_file: Option<PathBuf>,
    cluster_index: Option<Arc<ClusterIndexState>>,
}

impl<S: KvStore> ConfigManagerBuilder<S> {
    /// Builder with the default `/config` prefix and watch timings
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            prefix: "/config".to_string(),
            watch_config: WatchConfig::default(),
            dev_params: DevParams::default(),
            reload_signal_file: None,
            cluster_index: None,
        }
    }

    /// Root of the settings tree in the store
    pub fn prefix(
        mut self,
        prefix: impl Into<String>,
    ) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Completely replaces the watch timings set so far
    pub fn watch_config(
        mut self,
        config: WatchConfig,
    ) -> Self {
        self.watch_config = config;
        self
    }

    /// Set long-poll timeout (default: 50s)
    pub fn long_polling_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.watch_config.long_polling_timeout_ms = saturating_millis(timeout);
        self
    }

    /// Set pause after failed polls (default: 5s)
    pub fn long_polling_safety_delay(
        mut self,
        delay: Duration,
    ) -> Self {
        self.watch_config.long_polling_safety_delay_ms = saturating_millis(delay);
        self
    }

    pub fn dev_params(
        mut self,
        dev_params: DevParams,
    ) -> Self {
        self.dev_params = dev_params;
        self
    }

    /// File touched after every env-defaults update
    pub fn reload_signal_file(
        mut self,
        path: impl Into<PathBuf>,
    ) -> Self {
        self.reload_signal_file = Some(path.into());
        self
    }

    /// Resume from an existing index instead of starting at zero
    pub fn cluster_index(
        mut self,
        cluster_index: Arc<ClusterIndexState>,
    ) -> Self {
        self.cluster_index = Some(cluster_index);
        self
    }

    /// Validates the prefix and loads dev params.
    pub fn build(self) -> Result<ConfigManager<S>> {
        let codec = KeyCodec::new(&self.prefix)?;
        self.watch_config.validate()?;
        let dev_params = self.dev_params.load()?;

        Ok(ConfigManager {
            store: self.store,
            parser: ConfigTreeParser::new(codec),
            cluster_index: self.cluster_index.unwrap_or_default(),
            watch_config: self.watch_config,
            dev_params: Arc::new(dev_params),
            reload_signal_file: self.reload_signal_file,
            active_watches: ActiveWatches::new(),
        })
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
