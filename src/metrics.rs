//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Submission outcomes and latency
//! - Individual attempt outcomes
//! - Nonce cache refreshes and invalidations
//! - Gas price fallbacks

use anyhow::Result;
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};

lazy_static! {
    pub static ref SUBMISSIONS: CounterVec = register_counter_vec!(
        "submitter_submissions_total",
        "Total submissions by final outcome",
        &["outcome"]
    ).unwrap();

    pub static ref ATTEMPTS: CounterVec = register_counter_vec!(
        "submitter_attempts_total",
        "Total broadcast attempts by result",
        &["result"]
    ).unwrap();

    pub static ref SUBMISSION_LATENCY: Histogram = register_histogram!(
        "submitter_submission_latency_seconds",
        "Time from submit call to final outcome",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    pub static ref NONCE_REFRESHES: Counter = register_counter!(
        "submitter_nonce_refreshes_total",
        "Nonce reservations served by a remote query"
    ).unwrap();

    pub static ref NONCE_INVALIDATIONS: Counter = register_counter!(
        "submitter_nonce_invalidations_total",
        "Nonce cache invalidations after sequencing conflicts"
    ).unwrap();

    pub static ref GAS_FALLBACKS: Counter = register_counter!(
        "submitter_gas_price_fallbacks_total",
        "Dynamic gas lookups that fell back to the configured hint"
    ).unwrap();
}

/// Render all registered metrics in the text exposition format
pub fn encode() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

// Helper functions to record metrics

pub fn record_submission(outcome: &str, latency_secs: f64) {
    SUBMISSIONS.with_label_values(&[outcome]).inc();
    SUBMISSION_LATENCY.observe(latency_secs);
}

pub fn record_attempt(result: &str) {
    ATTEMPTS.with_label_values(&[result]).inc();
}

pub fn record_nonce_refresh() {
    NONCE_REFRESHES.inc();
}

pub fn record_nonce_invalidation() {
    NONCE_INVALIDATIONS.inc();
}

pub fn record_gas_fallback() {
    GAS_FALLBACKS.inc();
}
