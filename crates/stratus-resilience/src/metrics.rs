//! Metrics for upstream call resilience.

use metrics::{counter, describe_counter};

/// Metric names for the resilience layer.
pub mod names {
    /// Circuit breaker state transitions.
    pub const CIRCUIT_TRANSITIONS_TOTAL: &str = "stratus_circuit_transitions_total";
    /// Calls rejected by an open circuit.
    pub const CIRCUIT_REJECTED_TOTAL: &str = "stratus_circuit_rejected_total";
    /// Upstream attempts, labelled by outcome.
    pub const UPSTREAM_ATTEMPTS_TOTAL: &str = "stratus_upstream_attempts_total";
    /// Retries scheduled after a failed attempt.
    pub const UPSTREAM_RETRIES_TOTAL: &str = "stratus_upstream_retries_total";
    /// Fallback invocations.
    pub const FALLBACKS_TOTAL: &str = "stratus_fallbacks_total";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        names::CIRCUIT_TRANSITIONS_TOTAL,
        "Total number of circuit breaker state transitions"
    );
    describe_counter!(
        names::CIRCUIT_REJECTED_TOTAL,
        "Total number of calls rejected by an open circuit breaker"
    );
    describe_counter!(
        names::UPSTREAM_ATTEMPTS_TOTAL,
        "Total number of upstream call attempts"
    );
    describe_counter!(
        names::UPSTREAM_RETRIES_TOTAL,
        "Total number of upstream retries"
    );
    describe_counter!(
        names::FALLBACKS_TOTAL,
        "Total number of fallback invocations"
    );
}

/// Resilience metrics recorder.
#[derive(Clone)]
pub struct ResilienceMetrics;

impl ResilienceMetrics {
    /// Record a breaker transition.
    pub fn circuit_transition(breaker: &str, to: &str) {
        counter!(
            names::CIRCUIT_TRANSITIONS_TOTAL,
            "breaker" => breaker.to_string(),
            "to" => to.to_string()
        )
        .increment(1);
    }

    /// Record a rejected call.
    pub fn circuit_rejected(breaker: &str) {
        counter!(
            names::CIRCUIT_REJECTED_TOTAL,
            "breaker" => breaker.to_string()
        )
        .increment(1);
    }

    /// Record an upstream attempt.
    pub fn attempt(operation: &str, outcome: &str) {
        counter!(
            names::UPSTREAM_ATTEMPTS_TOTAL,
            "operation" => operation.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }

    /// Record a scheduled retry.
    pub fn retry(operation: &str, attempt: u32) {
        counter!(
            names::UPSTREAM_RETRIES_TOTAL,
            "operation" => operation.to_string(),
            "attempt" => attempt.to_string()
        )
        .increment(1);
    }

    /// Record a fallback invocation.
    pub fn fallback(operation: &str, kind: &str) {
        counter!(
            names::FALLBACKS_TOTAL,
            "operation" => operation.to_string(),
            "kind" => kind.to_string()
        )
        .increment(1);
    }
}
