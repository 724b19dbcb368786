//! Prometheus metrics for the match engine.
//!
//! Tracks how often expectations match, how often requests fall through, and
//! how many expectations are currently active.
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};

pub struct MatchMetrics {
    /// Requests that matched an expectation, by action kind
    pub expectations_matched: IntCounterVec,
    /// Requests that matched no expectation
    pub expectations_not_matched: IntCounterVec,
    /// Expectations currently held by the store
    pub expectations_active: IntGauge,
}

impl MatchMetrics {
    fn register() -> Result<Self, prometheus::Error> {
        Ok(Self {
            expectations_matched: register_int_counter_vec!(
                "rift_match_expectations_matched_total",
                "Total number of requests that matched an expectation",
                &["action"] // action: response|forward|error|none
            )?,
            expectations_not_matched: register_int_counter_vec!(
                "rift_match_expectations_not_matched_total",
                "Total number of requests that matched no expectation",
                &["store"]
            )?,
            expectations_active: register_int_gauge!(
                "rift_match_expectations_active",
                "Number of expectations currently registered"
            )?,
        })
    }
}

lazy_static! {
    static ref METRICS: Option<MatchMetrics> = match MatchMetrics::register() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            tracing::warn!("Failed to register match metrics: {}", e);
            None
        }
    };
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record a request matching an expectation
pub fn record_match(action: &str) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.expectations_matched.with_label_values(&[action]).inc();
    }
}

/// Helper to record a request that matched nothing
pub fn record_no_match(store: &str) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.expectations_not_matched.with_label_values(&[store]).inc();
    }
}

/// Helper to publish the number of active expectations
pub fn set_active_expectations(count: usize) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.expectations_active.set(count as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_metrics_are_exposed() {
        record_match("response");
        record_no_match("default");
        set_active_expectations(3);

        let output = collect_metrics();
        assert!(output.contains("rift_match_expectations_matched_total"));
        assert!(output.contains("rift_match_expectations_not_matched_total"));
        assert!(output.contains("rift_match_expectations_active"));
    }
}
