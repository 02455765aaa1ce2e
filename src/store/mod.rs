//! Coordination store protocol
//!
//! The settings engine only needs three operations from the store:
//! - a recursive directory read returning every leaf under a path,
//! - a long-poll watch for the first change after a given index,
//! - a single-key write.
//!
//! [`EtcdClient`] speaks the etcd v2 keys API over HTTP; [`MemoryStore`] is an
//! in-process store with the same semantics, used by tests and local setups.

mod etcd_client;
mod mem_store;

pub use etcd_client::*;
pub use mem_store::*;

#[cfg(test)]
mod etcd_client_test;

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A key in the store as returned by a read or watch.
///
/// `value` is `None` for directory nodes without children and for deletions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLeaf {
    pub key: String,
    pub value: Option<String>,
}

impl StoreLeaf {
    pub fn new(
        key: impl Into<String>,
        value: Option<impl Into<String>>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.map(Into::into),
        }
    }
}

/// Flat listing of leaves plus the store index the response reflects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreResponse {
    pub index: u64,
    pub leaves: Vec<StoreLeaf>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Reads `path` and, when `recursive`, every node below it.
    ///
    /// # Errors
    /// - [`StoreError::KeyNotFound`] when `path` does not exist
    async fn read(
        &self,
        path: &str,
        recursive: bool,
    ) -> StoreResult<StoreResponse>;

    /// Blocks until a change at or after `index` happens under `path`, or
    /// until `timeout` elapses.
    ///
    /// # Errors
    /// - [`StoreError::Timeout`] when nothing changed within `timeout`
    /// - [`StoreError::IndexCleared`] when `index` predates retained history
    async fn watch(
        &self,
        path: &str,
        index: u64,
        recursive: bool,
        timeout: Duration,
    ) -> StoreResult<StoreResponse>;

    /// Stores `value` at `path`, creating parent directories as needed.
    async fn write(
        &self,
        path: &str,
        value: &str,
    ) -> StoreResult<()>;
}
