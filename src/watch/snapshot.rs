use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::ConfigMap;
use crate::ExtensionSets;

/// Live configuration shared between watch loops and readers.
///
/// Writers publish a whole new map, so a reader's `load()` always sees one
/// consistent batch.
pub type SharedSnapshot<T> = Arc<ArcSwap<T>>;

pub fn new_snapshot<T>(value: T) -> SharedSnapshot<T> {
    Arc::new(ArcSwap::from_pointee(value))
}

/// Incremental update of a snapshot by one parsed batch.
pub trait MergeBatch: Clone + Send + Sync + 'static {
    /// Key-by-key overwrite; keys absent from `batch` are left alone.
    fn merge_batch(
        &mut self,
        batch: &Self,
    );
}

impl MergeBatch for ConfigMap {
    fn merge_batch(
        &mut self,
        batch: &Self,
    ) {
        for (identifier, value) in batch {
            self.insert(identifier.clone(), value.clone());
        }
    }
}

impl MergeBatch for ExtensionSets {
    fn merge_batch(
        &mut self,
        batch: &Self,
    ) {
        for (set_name, overrides) in batch {
            self.entry(set_name.clone()).or_default().merge_batch(overrides);
        }
    }
}

/// Publishes `current ∪ batch`, then applies `finish` to the merged map
/// before it becomes visible.
pub fn merge_into<T, F>(
    snapshot: &SharedSnapshot<T>,
    batch: &T,
    finish: F,
) where
    T: MergeBatch,
    F: Fn(&mut T),
{
    snapshot.rcu(|current| {
        let mut next = T::clone(current);
        next.merge_batch(batch);
        finish(&mut next);
        next
    });
}
