//! Upload pipeline metrics.

use std::time::Duration;

use metrics::{counter, gauge, histogram};
use scopeguard::ScopeGuard;

/// Metric name constants for consistency.
pub mod names {
    /// Finished uploads by outcome and orientation or error kind.
    pub const UPLOADS_TOTAL: &str = "tubely_uploads_total";

    /// End-to-end upload duration.
    pub const UPLOAD_DURATION_SECONDS: &str = "tubely_upload_duration_seconds";

    /// Bytes accepted into temp storage.
    pub const UPLOAD_BYTES_TOTAL: &str = "tubely_upload_bytes_total";

    /// Uploads currently being processed.
    pub const UPLOADS_IN_FLIGHT: &str = "tubely_uploads_in_flight";

    /// Stored objects no record points at.
    pub const ORPHANED_OBJECTS_TOTAL: &str = "tubely_upload_orphaned_objects_total";

    /// Retries of remote pipeline steps.
    pub const STAGE_RETRIES_TOTAL: &str = "tubely_upload_stage_retries_total";
}

pub fn record_upload_success(orientation: &str, bytes: u64, duration: Duration) {
    counter!(
        names::UPLOADS_TOTAL,
        "outcome" => "success",
        "orientation" => orientation.to_string()
    )
    .increment(1);
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
    histogram!(names::UPLOAD_DURATION_SECONDS, "outcome" => "success")
        .record(duration.as_secs_f64());
}

pub fn record_upload_failure(kind: &'static str, stage: &'static str, duration: Duration) {
    counter!(
        names::UPLOADS_TOTAL,
        "outcome" => "failure",
        "error" => kind,
        "stage" => stage
    )
    .increment(1);
    histogram!(names::UPLOAD_DURATION_SECONDS, "outcome" => "failure")
        .record(duration.as_secs_f64());
}

pub fn record_orphaned_object(namespace: &str) {
    counter!(names::ORPHANED_OBJECTS_TOTAL, "namespace" => namespace.to_string()).increment(1);
}

pub fn record_stage_retry(operation: &str) {
    counter!(names::STAGE_RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

/// Increment the in-flight gauge until the returned guard is dropped.
pub fn track_in_flight() -> ScopeGuard<(), impl FnOnce(())> {
    gauge!(names::UPLOADS_IN_FLIGHT).increment(1.0);
    scopeguard::guard((), |_| gauge!(names::UPLOADS_IN_FLIGHT).decrement(1.0))
}
