//! Request correlation and guard metrics.
//!
//! This module provides:
//! - Correlation IDs for tying log lines to one request
//! - Atomic counters for guard and verification outcomes

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Generate a short correlation ID (8 characters) for compact logging.
pub fn generate_short_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Request context carried through one pipeline run.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request.
    pub correlation_id: String,
    /// When the request was received.
    pub start_time: Instant,
    /// Pipeline stage being executed.
    pub operation: Option<String>,
}

impl RequestContext {
    /// Create a new request context with a generated correlation ID.
    pub fn new() -> Self {
        Self::with_correlation_id(generate_short_correlation_id())
    }

    /// Create a new request context with a specific correlation ID.
    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            start_time: Instant::now(),
            operation: None,
        }
    }

    /// Set the operation name.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Get the elapsed time since the request started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Create a log prefix for consistent logging format.
    pub fn log_prefix(&self) -> String {
        match &self.operation {
            Some(op) => format!("[{}] [{}]", self.correlation_id, op),
            None => format!("[{}]", self.correlation_id),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard and verification counters.
#[derive(Debug, Default)]
pub struct GuardMetrics {
    /// Requests that reached input validation
    pub requests_total: AtomicU64,
    /// Requests rejected at the input guard
    pub inputs_rejected: AtomicU64,
    /// Oracle outputs replaced by the refusal
    pub outputs_suppressed: AtomicU64,
    /// Oracle outputs cut to the length limit
    pub outputs_truncated: AtomicU64,
    /// Repair calls made by the correction loop
    pub corrections_total: AtomicU64,
    /// Correction loop runs that ended valid
    pub verifications_accepted: AtomicU64,
    /// Correction loop runs that ran out of repairs
    pub verifications_exhausted: AtomicU64,
    /// Failed oracle calls
    pub oracle_failures: AtomicU64,
}

impl GuardMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request entering validation.
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an input rejection.
    pub fn record_rejection(&self) {
        self.inputs_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an output replaced by the refusal.
    pub fn record_suppression(&self) {
        self.outputs_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a truncated output.
    pub fn record_truncation(&self) {
        self.outputs_truncated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed oracle call.
    pub fn record_oracle_failure(&self) {
        self.oracle_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one correction loop run.
    pub fn record_verification(&self, is_valid: bool, corrections: u32) {
        self.corrections_total
            .fetch_add(u64::from(corrections), Ordering::Relaxed);
        if is_valid {
            self.verifications_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.verifications_exhausted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            inputs_rejected: self.inputs_rejected.load(Ordering::Relaxed),
            outputs_suppressed: self.outputs_suppressed.load(Ordering::Relaxed),
            outputs_truncated: self.outputs_truncated.load(Ordering::Relaxed),
            corrections_total: self.corrections_total.load(Ordering::Relaxed),
            verifications_accepted: self.verifications_accepted.load(Ordering::Relaxed),
            verifications_exhausted: self.verifications_exhausted.load(Ordering::Relaxed),
            oracle_failures: self.oracle_failures.load(Ordering::Relaxed),
        }
    }

    /// Percentage of requests rejected at the input guard.
    pub fn rejection_rate(&self) -> f64 {
        let total = self.requests_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let rejected = self.inputs_rejected.load(Ordering::Relaxed);
        (rejected as f64 / total as f64) * 100.0
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Requests that reached input validation
    pub requests_total: u64,
    /// Requests rejected at the input guard
    pub inputs_rejected: u64,
    /// Oracle outputs replaced by the refusal
    pub outputs_suppressed: u64,
    /// Oracle outputs cut to the length limit
    pub outputs_truncated: u64,
    /// Repair calls made by the correction loop
    pub corrections_total: u64,
    /// Correction loop runs that ended valid
    pub verifications_accepted: u64,
    /// Correction loop runs that ran out of repairs
    pub verifications_exhausted: u64,
    /// Failed oracle calls
    pub oracle_failures: u64,
}

/// Shared metrics handle.
pub type SharedMetrics = Arc<GuardMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_short() {
        let id = generate_short_correlation_id();
        assert_eq!(id.len(), 8);
        assert_ne!(id, generate_short_correlation_id());
    }

    #[test]
    fn test_log_prefix() {
        let ctx = RequestContext::with_correlation_id("abc12345");
        assert_eq!(ctx.log_prefix(), "[abc12345]");

        let ctx = ctx.with_operation("verify");
        assert_eq!(ctx.log_prefix(), "[abc12345] [verify]");
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = GuardMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_rejection();
        metrics.record_verification(true, 2);
        metrics.record_verification(false, 3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.inputs_rejected, 1);
        assert_eq!(snapshot.corrections_total, 5);
        assert_eq!(snapshot.verifications_accepted, 1);
        assert_eq!(snapshot.verifications_exhausted, 1);
        assert!((metrics.rejection_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_rejection_rate() {
        assert_eq!(GuardMetrics::new().rejection_rate(), 0.0);
    }
}
