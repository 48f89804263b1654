use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::Registry;

lazy_static! {
    pub static ref PUSH_FIRED_TOTAL: IntCounter =
        IntCounter::new("push_fired_total", "Push batches handed to the dispatcher")
            .expect("metric can not be created");

    pub static ref PUSH_SUPPRESSED_TOTAL: IntCounter = IntCounter::new(
        "push_suppressed_total",
        "Watchers filtered out because they already held an equal-or-newer snapshot"
    )
    .expect("metric can not be created");

    pub static ref SEQUENCED_TASK_FAILED_TOTAL: IntCounter = IntCounter::new(
        "sequenced_task_failed_total",
        "Sequenced tasks that failed and were dropped"
    )
    .expect("metric can not be created");

    pub static ref REVISION_REFRESH_TOTAL: IntCounter =
        IntCounter::new("revision_refresh_total", "Revision resync attempts")
            .expect("metric can not be created");

    pub static ref REVISION_REFRESH_FAILED_TOTAL: IntCounter =
        IntCounter::new("revision_refresh_failed_total", "Failed revision resync attempts")
            .expect("metric can not be created");

    pub static ref METRICS_REGISTRY: Registry = Registry::new();
}

/// Register the engine's collectors; the caller exposes `METRICS_REGISTRY`
/// through whatever endpoint it runs.
pub fn register_custom_metrics() {
    METRICS_REGISTRY
        .register(Box::new(PUSH_FIRED_TOTAL.clone()))
        .expect("collector can be registered");
    METRICS_REGISTRY
        .register(Box::new(PUSH_SUPPRESSED_TOTAL.clone()))
        .expect("collector can be registered");
    METRICS_REGISTRY
        .register(Box::new(SEQUENCED_TASK_FAILED_TOTAL.clone()))
        .expect("collector can be registered");
    METRICS_REGISTRY
        .register(Box::new(REVISION_REFRESH_TOTAL.clone()))
        .expect("collector can be registered");
    METRICS_REGISTRY
        .register(Box::new(REVISION_REFRESH_FAILED_TOTAL.clone()))
        .expect("collector can be registered");
}
