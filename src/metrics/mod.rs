use lazy_static::lazy_static;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;


pub(crate) const OUTCOME_APPLIED: &str = "applied";
pub(crate) const OUTCOME_TIMEOUT: &str = "timeout";
pub(crate) const OUTCOME_ERROR: &str = "error";
pub(crate) const OUTCOME_INVALID_VALUE: &str = "invalid_value";
pub(crate) const OUTCOME_RESYNC: &str = "resync";

lazy_static! {
    pub static ref WATCH_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_events_total", "Watch loop iterations by watched path and outcome"),
        &["path", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref CLUSTER_INDEX: IntGauge =
        IntGauge::new("cluster_index", "Highest store index observed by any watch loop")
            .expect("metric can not be created");

    pub static ref WRITE_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("write_failures_total", "Settings that failed to write, by target path"),
        &["path"]
    )
    .expect("metric can not be created");
}

/// Registers the crate's collectors on a caller-owned registry.
///
/// # Errors
/// `AlreadyReg` when the registry already holds one of the collectors
pub fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(WATCH_EVENTS_TOTAL.clone()))?;
    registry.register(Box::new(CLUSTER_INDEX.clone()))?;
    registry.register(Box::new(WRITE_FAILURES_TOTAL.clone()))?;
    Ok(())
}

pub(crate) fn record_watch_event(
    path: &str,
    outcome: &str,
) {
    WATCH_EVENTS_TOTAL.with_label_values(&[path, outcome]).inc();
}
