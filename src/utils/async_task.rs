use std::future::Future;

use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;

use crate::Result;

/// Spawns a long-running background task and logs how it ends.
pub(crate) fn spawn_named<F, T>(
    name: String,
    task: F,
) -> JoinHandle<Result<T>>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(async move {
        debug!(task = %name, "background task started");
        let result = task.await;
        match &result {
            Ok(_) => debug!(task = %name, "background task finished"),
            Err(e) => error!(task = %name, "background task stopped with error: {:?}", e),
        }
        result
    })
}
