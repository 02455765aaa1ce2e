//! Background refresh of configuration snapshots.
//!
//! A [`WatchLoop`] long-polls one store path and hands every response to a
//! batch callback. All loops of a manager share one [`ClusterIndexState`],
//! so the index they resume from only ever moves forward.

mod cluster_index;
mod registry;
mod snapshot;
mod watch_loop;

pub use cluster_index::*;
pub use registry::*;
pub use snapshot::*;
pub use watch_loop::*;


use tokio::task::JoinHandle;

use crate::Result;

/// Handle on a running watch loop.
///
/// Joining yields the number of processed events once the loop stops, which
/// only happens when it was started with an event limit.
#[derive(Debug)]
pub struct WatchHandle {
    path: String,
    handle: JoinHandle<Result<u64>>,
}

impl WatchHandle {
    pub(crate) fn new(
        path: String,
        handle: JoinHandle<Result<u64>>,
    ) -> Self {
        Self { path, handle }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    pub async fn join(self) -> Result<u64> {
        self.handle.await?
    }
}
