use std::sync::Arc;

use tokio::time::sleep;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ClusterIndexState;
use crate::metrics::record_watch_event;
use crate::metrics::OUTCOME_APPLIED;
use crate::metrics::OUTCOME_ERROR;
use crate::metrics::OUTCOME_INVALID_VALUE;
use crate::metrics::OUTCOME_RESYNC;
use crate::metrics::OUTCOME_TIMEOUT;
use crate::KvStore;
use crate::Result;
use crate::StoreError;
use crate::StoreResponse;
use crate::WatchConfig;

/// Long-poll refresh of one store path.
///
/// Each iteration is one of:
/// - a full recursive read, while the shared index is still zero or after
///   the store dropped the history we asked for,
/// - a watch for the first change after the shared index.
///
/// Every response advances the shared index before it is handed to the
/// batch callback. Timeouts loop again immediately; other failures, and
/// batches the callback rejects, wait `safety_delay` first.
pub struct WatchLoop<S: KvStore> {
    store: Arc<S>,
    path: String,
    cluster_index: Arc<ClusterIndexState>,
    config: WatchConfig,
}

impl<S: KvStore> WatchLoop<S> {
    pub fn new(
        store: Arc<S>,
        path: String,
        cluster_index: Arc<ClusterIndexState>,
        config: WatchConfig,
    ) -> Self {
        Self {
            store,
            path,
            cluster_index,
            config,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Runs until `max_events` iterations were processed, forever when
    /// `None`. Returns the number of processed iterations.
    pub async fn run<F>(
        self,
        max_events: Option<u64>,
        mut on_batch: F,
    ) -> Result<u64>
    where
        F: FnMut(StoreResponse) -> Result<()> + Send,
    {
        info!(path = %self.path, ?max_events, "watch loop started");
        let mut processed = 0u64;
        let mut resync = false;

        while max_events.map_or(true, |max| processed < max) {
            processed += 1;

            match self.poll(resync).await {
                Ok(response) => {
                    resync = false;
                    let index = self.cluster_index.advance(response.index);
                    trace!(path = %self.path, index, leaves = response.leaves.len(), "batch received");

                    match on_batch(response) {
                        Ok(()) => record_watch_event(&self.path, OUTCOME_APPLIED),
                        Err(e) => {
                            error!(path = %self.path, "Rejected config batch: {}", e);
                            record_watch_event(&self.path, OUTCOME_INVALID_VALUE);
                            sleep(self.config.safety_delay()).await;
                        }
                    }
                }
                Err(e) if e.is_timeout() => {
                    debug!(path = %self.path, "long poll timed out");
                    record_watch_event(&self.path, OUTCOME_TIMEOUT);
                }
                Err(StoreError::IndexCleared { index }) => {
                    warn!(
                        path = %self.path,
                        watched = self.cluster_index.current(),
                        store_index = index,
                        "watch history cleared, resyncing with a full read"
                    );
                    record_watch_event(&self.path, OUTCOME_RESYNC);
                    resync = true;
                }
                Err(e) => {
                    error!(path = %self.path, "Long Polling Error: {}", e);
                    record_watch_event(&self.path, OUTCOME_ERROR);
                    sleep(self.config.safety_delay()).await;
                }
            }
        }

        info!(path = %self.path, processed, "watch loop finished");
        Ok(processed)
    }

    async fn poll(
        &self,
        resync: bool,
    ) -> std::result::Result<StoreResponse, StoreError> {
        if resync || !self.cluster_index.is_initialized() {
            return self.store.read(&self.path, true).await;
        }

        let wait_index = self.cluster_index.current() + 1;
        self.store
            .watch(&self.path, wait_index, true, self.config.poll_timeout())
            .await
    }
}
