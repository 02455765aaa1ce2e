use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::trace;

use super::KvStore;
use super::StoreLeaf;
use super::StoreResponse;
use super::StoreResult;
use crate::codec::normalize_path;
use crate::constants::DEFAULT_HISTORY_LIMIT;
use crate::StoreError;

const ERROR_NOT_A_FILE: u32 = 102;
const ERROR_NOT_A_DIR: u32 = 104;
const ERROR_NODE_EXIST: u32 = 105;

/// In-process store following etcd v2 directory semantics.
///
/// Every mutation bumps a global index and is appended to an event history,
/// which watches replay from. The history keeps the last 1000 events unless
/// [`with_history_limit`](Self::with_history_limit) says otherwise; watches
/// asking for evicted events get [`StoreError::IndexCleared`].
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemState>,
    changed: watch::Sender<u64>,
}

#[derive(Debug)]
struct MemState {
    /// `None` marks a directory
    nodes: BTreeMap<String, Option<String>>,
    index: u64,
    history: VecDeque<MemEvent>,
    history_limit: usize,
    cleared_through: u64,
}

#[derive(Debug, Clone)]
struct MemEvent {
    index: u64,
    key: String,
    value: Option<String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            state: Mutex::new(MemState {
                nodes: BTreeMap::new(),
                index: 0,
                history: VecDeque::new(),
                history_limit: DEFAULT_HISTORY_LIMIT,
                cleared_through: 0,
            }),
            changed,
        }
    }

    /// Retain at most `limit` events for watches to replay.
    pub fn with_history_limit(
        self,
        limit: usize,
    ) -> Self {
        self.state.lock().history_limit = limit;
        self
    }

    pub fn current_index(&self) -> u64 {
        self.state.lock().index
    }

    pub fn mkdir(
        &self,
        path: &str,
    ) -> StoreResult<()> {
        let key = normalize_path(path);
        let mut state = self.state.lock();
        match state.nodes.get(&key) {
            Some(None) => return Ok(()),
            Some(Some(_)) => return Err(api_error(ERROR_NODE_EXIST, "Key already exists", &key)),
            None => {}
        }
        state.ensure_parents(&key)?;
        state.nodes.insert(key.clone(), None);
        let index = state.record(key, None);
        drop(state);
        self.changed.send_replace(index);
        Ok(())
    }

    /// Removes `path`; directories need `recursive`.
    pub fn delete(
        &self,
        path: &str,
        recursive: bool,
    ) -> StoreResult<()> {
        let key = normalize_path(path);
        let mut state = self.state.lock();
        match state.nodes.get(&key) {
            None => return Err(StoreError::KeyNotFound(key)),
            Some(None) if !recursive => return Err(api_error(ERROR_NOT_A_FILE, "Not a file", &key)),
            _ => {}
        }
        let child_prefix = format!("{key}/");
        state
            .nodes
            .retain(|k, _| k != &key && !k.starts_with(&child_prefix));
        let index = state.record(key, None);
        drop(state);
        self.changed.send_replace(index);
        Ok(())
    }
}

impl MemState {
    fn is_dir(
        &self,
        key: &str,
    ) -> bool {
        key.is_empty() || matches!(self.nodes.get(key), Some(None))
    }

    fn has_children(
        &self,
        key: &str,
    ) -> bool {
        let child_prefix = format!("{key}/");
        self.nodes
            .range(child_prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&child_prefix))
    }

    fn ensure_parents(
        &mut self,
        key: &str,
    ) -> StoreResult<()> {
        let mut parent = String::new();
        let segments: Vec<&str> = key.trim_start_matches('/').split('/').collect();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            parent.push('/');
            parent.push_str(segment);
            match self.nodes.get(&parent) {
                Some(Some(_)) => return Err(api_error(ERROR_NOT_A_DIR, "Not a directory", &parent)),
                Some(None) => {}
                None => {
                    self.nodes.insert(parent.clone(), None);
                }
            }
        }
        Ok(())
    }

    fn record(
        &mut self,
        key: String,
        value: Option<String>,
    ) -> u64 {
        self.index += 1;
        self.history.push_back(MemEvent {
            index: self.index,
            key,
            value,
        });
        while self.history.len() > self.history_limit {
            match self.history.pop_front() {
                Some(evicted) => self.cleared_through = evicted.index,
                None => break,
            }
        }
        self.index
    }

    fn list(
        &self,
        key: &str,
        recursive: bool,
    ) -> Vec<StoreLeaf> {
        if !self.has_children(key) {
            return vec![StoreLeaf {
                key: key.to_string(),
                value: self.nodes.get(key).cloned().flatten(),
            }];
        }

        let child_prefix = format!("{key}/");
        self.nodes
            .range(child_prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&child_prefix))
            .filter(|(k, value)| {
                let direct = !k[child_prefix.len()..].contains('/');
                let is_leaf = value.is_some() || !self.has_children(k);
                if recursive {
                    is_leaf
                } else {
                    direct
                }
            })
            .map(|(k, value)| StoreLeaf {
                key: k.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// First recorded event under `key` at or after `index`.
    fn event_since(
        &self,
        key: &str,
        index: u64,
        recursive: bool,
    ) -> StoreResult<Option<StoreResponse>> {
        if index <= self.cleared_through {
            return Err(StoreError::IndexCleared { index: self.index });
        }
        let child_prefix = format!("{key}/");
        let event = self.history.iter().find(|event| {
            event.index >= index
                && (event.key == key || (recursive && (key.is_empty() || event.key.starts_with(&child_prefix))))
        });

        Ok(event.map(|event| StoreResponse {
            index: event.index,
            leaves: vec![StoreLeaf {
                key: event.key.clone(),
                value: event.value.clone(),
            }],
        }))
    }
}

fn api_error(
    code: u32,
    message: &str,
    key: &str,
) -> StoreError {
    StoreError::Api {
        code,
        message: message.to_string(),
        cause: key.to_string(),
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn read(
        &self,
        path: &str,
        recursive: bool,
    ) -> StoreResult<StoreResponse> {
        let key = normalize_path(path);
        let state = self.state.lock();
        if !key.is_empty() && !state.nodes.contains_key(&key) {
            return Err(StoreError::KeyNotFound(key));
        }
        Ok(StoreResponse {
            index: state.index,
            leaves: state.list(&key, recursive),
        })
    }

    async fn watch(
        &self,
        path: &str,
        index: u64,
        recursive: bool,
        timeout: Duration,
    ) -> StoreResult<StoreResponse> {
        let key = normalize_path(path);
        let deadline = Instant::now() + timeout;
        // Subscribe before checking history so no write slips in between
        let mut changed = self.changed.subscribe();

        loop {
            let event = self.state.lock().event_since(&key, index, recursive)?;
            if let Some(response) = event {
                trace!(path = %key, index = response.index, "memory store event");
                return Ok(response);
            }

            match tokio::time::timeout_at(deadline, changed.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return Err(StoreError::Connection("memory store closed".to_string())),
                Err(_) => {
                    return Err(StoreError::Timeout {
                        path: key,
                        duration: timeout,
                    })
                }
            }
        }
    }

    async fn write(
        &self,
        path: &str,
        value: &str,
    ) -> StoreResult<()> {
        let key = normalize_path(path);
        let mut state = self.state.lock();
        if state.is_dir(&key) {
            return Err(api_error(ERROR_NOT_A_FILE, "Not a file", &key));
        }
        state.ensure_parents(&key)?;
        state.nodes.insert(key.clone(), Some(value.to_string()));
        let index = state.record(key, Some(value.to_string()));
        drop(state);
        self.changed.send_replace(index);
        Ok(())
    }
}
