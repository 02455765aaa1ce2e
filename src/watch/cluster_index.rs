use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tracing::trace;

use crate::metrics::CLUSTER_INDEX;

/// Highest store index any watch loop has observed.
///
/// Zero means nothing has been read yet. Updates keep the maximum, so
/// responses completing out of order never move it backwards.
#[derive(Debug, Default)]
pub struct ClusterIndexState {
    index: AtomicU64,
}

impl ClusterIndexState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.index.load(Ordering::Acquire)
    }

    pub fn is_initialized(&self) -> bool {
        self.current() > 0
    }

    /// Raises the index to `observed` if it is higher and returns the
    /// resulting value.
    pub fn advance(
        &self,
        observed: u64,
    ) -> u64 {
        let previous = self.index.fetch_max(observed, Ordering::AcqRel);
        let current = previous.max(observed);
        if current != previous {
            trace!(previous, current, "cluster index advanced");
            CLUSTER_INDEX.set(gauge_value(current));
        }
        current
    }
}

/// Gauges are signed; indexes past `i64::MAX` pin at the maximum.
pub(super) fn gauge_value(index: u64) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
