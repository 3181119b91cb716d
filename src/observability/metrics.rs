//! Metrics collection.
//!
//! # Metrics
//! - `pipeline_requests_total` (counter): calls by method and outcome
//! - `pipeline_session_expired_total` (counter): teardowns by source
//!
//! # Design Decisions
//! - The library only records; installing a recorder/exporter is up to the
//!   embedding application, so these are no-ops by default

/// Record the final outcome of one `send`.
pub fn record_request(method: &str, outcome: &'static str) {
    metrics::counter!(
        "pipeline_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a session teardown caused by an unauthorized response.
pub fn record_session_expired(source: &'static str) {
    metrics::counter!("pipeline_session_expired_total", "source" => source).increment(1);
}
