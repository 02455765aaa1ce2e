use std::sync::Arc;

use dashmap::DashSet;

use crate::Error;
use crate::Result;

/// Paths with a running watch loop.
#[derive(Debug, Clone, Default)]
pub struct ActiveWatches {
    paths: Arc<DashSet<String>>,
}

/// Keeps a path registered until dropped.
#[derive(Debug)]
pub struct WatchRegistration {
    paths: Arc<DashSet<String>>,
    path: String,
}

impl ActiveWatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// [`Error::WatchAlreadyActive`] if `path` is already being watched
    pub fn register(
        &self,
        path: &str,
    ) -> Result<WatchRegistration> {
        if !self.paths.insert(path.to_string()) {
            return Err(Error::WatchAlreadyActive(path.to_string()));
        }
        Ok(WatchRegistration {
            paths: self.paths.clone(),
            path: path.to_string(),
        })
    }

    pub fn is_active(
        &self,
        path: &str,
    ) -> bool {
        self.paths.contains(path)
    }
}

impl Drop for WatchRegistration {
    fn drop(&mut self) {
        self.paths.remove(&self.path);
    }
}
