use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

use crate::provider::ProviderStatus;

/// Register metric descriptions with whatever recorder the embedding
/// application installed (can be called multiple times safely)
pub fn init_metric_descriptions() {
    describe_counter!(
        "orchestrator_attempts_total",
        "Provider invocation attempts by outcome"
    );
    describe_histogram!(
        "orchestrator_attempt_duration_seconds",
        "Provider invocation duration in seconds"
    );
    describe_counter!(
        "orchestrator_local_fallback_total",
        "Requests answered by the local fallback path"
    );
    describe_counter!(
        "orchestrator_errors_total",
        "Requests that ended in an orchestrator error"
    );
    describe_gauge!(
        "orchestrator_provider_status",
        "Provider status (1=active, 0=otherwise)"
    );
    describe_counter!(
        "orchestrator_persist_failures_total",
        "State snapshots that failed to save"
    );

    gauge!("orchestrator_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record one completed provider attempt ("success" or "failure")
pub fn record_attempt(provider: &str, outcome: &'static str, duration: Duration) {
    counter!(
        "orchestrator_attempts_total",
        "provider" => provider.to_string(),
        "outcome" => outcome,
    )
    .increment(1);

    histogram!(
        "orchestrator_attempt_duration_seconds",
        "provider" => provider.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a request served locally ("no_eligible" or "exhausted")
pub fn record_local_fallback(reason: &'static str) {
    counter!("orchestrator_local_fallback_total", "reason" => reason).increment(1);
}

pub fn record_error(error_type: &'static str) {
    counter!("orchestrator_errors_total", "error_type" => error_type).increment(1);
}

pub fn record_provider_status(provider: &str, status: ProviderStatus) {
    let value = if status == ProviderStatus::Active { 1.0 } else { 0.0 };
    gauge!(
        "orchestrator_provider_status",
        "provider" => provider.to_string(),
    )
    .set(value);
}

pub fn record_persist_failure() {
    counter!("orchestrator_persist_failures_total").increment(1);
}
