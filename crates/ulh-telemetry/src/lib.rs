// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured telemetry and call metrics aggregation for the host.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::info;

// ---------------------------------------------------------------------------
// CallMetrics
// ---------------------------------------------------------------------------

/// Metrics captured for a single dispatched call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CallMetrics {
    /// App the call targeted.
    pub app_id: String,
    /// JSON-RPC method invoked.
    pub method: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the call succeeded.
    pub success: bool,
    /// BYOK AI cost incurred, in cents.
    pub ai_cost_cents: i64,
    /// Balance charged to the caller, in cents.
    pub balance_charge_cents: i64,
}

// ---------------------------------------------------------------------------
// MetricsSummary
// ---------------------------------------------------------------------------

/// Aggregated statistics across multiple calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    /// Number of calls recorded.
    pub count: usize,
    /// Mean duration in milliseconds.
    pub mean_duration_ms: f64,
    /// Median (p50) duration in milliseconds.
    pub p50_duration_ms: f64,
    /// 99th-percentile duration in milliseconds.
    pub p99_duration_ms: f64,
    /// Total AI cost across all calls, in cents.
    pub total_ai_cost_cents: i64,
    /// Total balance charged across all calls, in cents.
    pub total_balance_charge_cents: i64,
    /// Error rate (failed calls / total calls).
    pub error_rate: f64,
    /// Per-app call counts (deterministic ordering).
    pub app_counts: BTreeMap<String, usize>,
}

impl Default for MetricsSummary {
    fn default() -> Self {
        Self {
            count: 0,
            mean_duration_ms: 0.0,
            p50_duration_ms: 0.0,
            p99_duration_ms: 0.0,
            total_ai_cost_cents: 0,
            total_balance_charge_cents: 0,
            error_rate: 0.0,
            app_counts: BTreeMap::new(),
        }
    }
}

/// Compute a percentile value from a **sorted** slice.
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

// ---------------------------------------------------------------------------
// MetricsCollector
// ---------------------------------------------------------------------------

/// Thread-safe collector for call metrics.
///
/// Wrap in an `Arc` to share across tasks (the inner storage is already
/// behind a `Mutex`).
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Vec<CallMetrics>>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Create a new, empty collector.
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Record a completed call's metrics.
    pub fn record(&self, metrics: CallMetrics) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.push(metrics);
    }

    /// Return all recorded call metrics.
    pub fn calls(&self) -> Vec<CallMetrics> {
        let data = self.inner.lock().expect("metrics lock poisoned");
        data.clone()
    }

    /// Number of calls recorded so far.
    pub fn len(&self) -> usize {
        let data = self.inner.lock().expect("metrics lock poisoned");
        data.len()
    }

    /// Whether the collector has no recorded calls.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute an aggregated summary of all recorded calls.
    pub fn summary(&self) -> MetricsSummary {
        let data = self.inner.lock().expect("metrics lock poisoned");
        if data.is_empty() {
            return MetricsSummary::default();
        }

        let count = data.len();
        let mut durations: Vec<u64> = data.iter().map(|c| c.duration_ms).collect();
        durations.sort_unstable();

        let total_duration: u64 = durations.iter().sum();
        let mean_duration_ms = total_duration as f64 / count as f64;
        let p50_duration_ms = percentile(&durations, 50.0);
        let p99_duration_ms = percentile(&durations, 99.0);

        let total_ai_cost_cents: i64 = data.iter().map(|c| c.ai_cost_cents).sum();
        let total_balance_charge_cents: i64 = data.iter().map(|c| c.balance_charge_cents).sum();

        let failures = data.iter().filter(|c| !c.success).count();
        let error_rate = failures as f64 / count as f64;

        let mut app_counts: BTreeMap<String, usize> = BTreeMap::new();
        for c in data.iter() {
            *app_counts.entry(c.app_id.clone()).or_insert(0) += 1;
        }

        MetricsSummary {
            count,
            mean_duration_ms,
            p50_duration_ms,
            p99_duration_ms,
            total_ai_cost_cents,
            total_balance_charge_cents,
            error_rate,
            app_counts,
        }
    }

    /// Clear all recorded metrics.
    pub fn clear(&self) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.clear();
    }
}

// ---------------------------------------------------------------------------
// TelemetrySpan
// ---------------------------------------------------------------------------

/// A structured span for tracing integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySpan {
    /// Span name / operation.
    pub name: String,
    /// Arbitrary key-value attributes (deterministic ordering).
    pub attributes: BTreeMap<String, String>,
}

impl TelemetrySpan {
    /// Create a new span with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), attributes: BTreeMap::new() }
    }

    /// Insert an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Emit the span via `tracing::info!`.
    pub fn emit(&self) {
        info!(span_name = %self.name, attributes = ?self.attributes, "telemetry_span");
    }
}

// ---------------------------------------------------------------------------
// TelemetryExporter
// ---------------------------------------------------------------------------

/// Trait for exporting collected metrics.
pub trait TelemetryExporter: Send + Sync {
    /// Export the given summary. Returns the serialized output on success.
    fn export(&self, summary: &MetricsSummary) -> Result<String, String>;
}

/// Exports metrics as pretty-printed JSON to a string.
#[derive(Debug, Default)]
pub struct JsonExporter;

impl TelemetryExporter for JsonExporter {
    fn export(&self, summary: &MetricsSummary) -> Result<String, String> {
        serde_json::to_string_pretty(summary).map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn sample_metrics(app_id: &str, duration: u64, success: bool) -> CallMetrics {
        CallMetrics {
            app_id: app_id.to_string(),
            method: "tools/call".to_string(),
            duration_ms: duration,
            success,
            ai_cost_cents: 3,
            balance_charge_cents: 5,
        }
    }

    #[test]
    fn collector_new_is_empty() {
        let c = MetricsCollector::new();
        assert!(c.is_empty());
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn collector_record_and_len() {
        let c = MetricsCollector::new();
        c.record(sample_metrics("app1", 100, true));
        assert_eq!(c.len(), 1);
        assert!(!c.is_empty());
    }

    #[test]
    fn collector_calls_returns_all_in_order() {
        let c = MetricsCollector::new();
        c.record(sample_metrics("a", 10, true));
        c.record(sample_metrics("b", 20, true));
        let calls = c.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].app_id, "a");
        assert_eq!(calls[1].app_id, "b");
    }

    #[test]
    fn collector_clear() {
        let c = MetricsCollector::new();
        c.record(sample_metrics("x", 50, true));
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn empty_collector_summary() {
        let c = MetricsCollector::new();
        let s = c.summary();
        assert_eq!(s.count, 0);
        assert_eq!(s.mean_duration_ms, 0.0);
        assert_eq!(s.error_rate, 0.0);
        assert!(s.app_counts.is_empty());
    }

    #[test]
    fn single_call_summary_matches() {
        let c = MetricsCollector::new();
        c.record(sample_metrics("app1", 42, true));
        let s = c.summary();
        assert_eq!(s.count, 1);
        assert_eq!(s.mean_duration_ms, 42.0);
        assert_eq!(s.p50_duration_ms, 42.0);
        assert_eq!(s.total_ai_cost_cents, 3);
        assert_eq!(s.total_balance_charge_cents, 5);
        assert_eq!(s.error_rate, 0.0);
        assert_eq!(s.app_counts["app1"], 1);
    }

    #[test]
    fn summary_mean_duration() {
        let c = MetricsCollector::new();
        c.record(sample_metrics("a", 100, true));
        c.record(sample_metrics("a", 200, true));
        c.record(sample_metrics("a", 300, true));
        let s = c.summary();
        assert!((s.mean_duration_ms - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_p50_odd_count() {
        let c = MetricsCollector::new();
        for d in [10, 20, 30, 40, 50] {
            c.record(sample_metrics("a", d, true));
        }
        let s = c.summary();
        assert!((s.p50_duration_ms - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_p50_even_count() {
        let c = MetricsCollector::new();
        for d in [10, 20, 30, 40] {
            c.record(sample_metrics("a", d, true));
        }
        let s = c.summary();
        assert!((s.p50_duration_ms - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_p99() {
        let c = MetricsCollector::new();
        for d in 1..=100 {
            c.record(sample_metrics("a", d, true));
        }
        let s = c.summary();
        assert!(s.p99_duration_ms > 98.0);
        assert!(s.p99_duration_ms <= 100.0);
    }

    #[test]
    fn summary_totals_ai_and_balance_cost() {
        let c = MetricsCollector::new();
        c.record(sample_metrics("a", 10, true));
        c.record(sample_metrics("b", 20, true));
        let s = c.summary();
        assert_eq!(s.total_ai_cost_cents, 6);
        assert_eq!(s.total_balance_charge_cents, 10);
    }

    #[test]
    fn summary_error_rate() {
        let c = MetricsCollector::new();
        c.record(sample_metrics("a", 10, false));
        c.record(sample_metrics("a", 20, true));
        c.record(sample_metrics("a", 30, false));
        let s = c.summary();
        assert!((s.error_rate - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn summary_app_counts() {
        let c = MetricsCollector::new();
        c.record(sample_metrics("alpha", 10, true));
        c.record(sample_metrics("beta", 20, true));
        c.record(sample_metrics("alpha", 30, true));
        let s = c.summary();
        assert_eq!(s.app_counts["alpha"], 2);
        assert_eq!(s.app_counts["beta"], 1);
    }

    #[test]
    fn call_metrics_serde_roundtrip() {
        let m = sample_metrics("serde_test", 999, false);
        let json = serde_json::to_string(&m).unwrap();
        let m2: CallMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(m, m2);
    }

    #[test]
    fn call_metrics_default_values() {
        let m = CallMetrics::default();
        assert_eq!(m.app_id, "");
        assert_eq!(m.duration_ms, 0);
        assert!(!m.success);
    }

    #[test]
    fn metrics_summary_serde_roundtrip() {
        let c = MetricsCollector::new();
        c.record(sample_metrics("a", 50, false));
        let s = c.summary();
        let json = serde_json::to_string(&s).unwrap();
        let s2: MetricsSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(s, s2);
    }

    #[test]
    fn concurrent_recording() {
        let c = MetricsCollector::new();
        let mut handles = vec![];
        for i in 0..10 {
            let cc = c.clone();
            handles.push(thread::spawn(move || {
                cc.record(sample_metrics("thread", i * 10, true));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.len(), 10);
    }

    #[test]
    fn telemetry_span_attributes() {
        let span = TelemetrySpan::new("op").with_attribute("key", "val").with_attribute("another", "thing");
        assert_eq!(span.name, "op");
        assert_eq!(span.attributes.len(), 2);
        assert_eq!(span.attributes["key"], "val");
    }

    #[test]
    fn telemetry_span_serde_roundtrip() {
        let span = TelemetrySpan::new("dispatch").with_attribute("app_id", "app1");
        let json = serde_json::to_string(&span).unwrap();
        let span2: TelemetrySpan = serde_json::from_str(&json).unwrap();
        assert_eq!(span2.name, "dispatch");
        assert_eq!(span2.attributes["app_id"], "app1");
    }

    #[test]
    fn json_exporter_valid_output() {
        let c = MetricsCollector::new();
        c.record(sample_metrics("app1", 100, true));
        let s = c.summary();
        let exporter = JsonExporter;
        let json = exporter.export(&s).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["count"], 1);
    }

    #[test]
    fn json_exporter_app_counts_deterministic() {
        let c = MetricsCollector::new();
        c.record(sample_metrics("zebra", 10, true));
        c.record(sample_metrics("alpha", 20, true));
        let s = c.summary();
        let exporter = JsonExporter;
        let json = exporter.export(&s).unwrap();
        let keys_start = json.find("\"alpha\"").unwrap();
        let keys_end = json.find("\"zebra\"").unwrap();
        assert!(keys_start < keys_end);
    }

    #[test]
    fn percentile_empty() {
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn percentile_single() {
        assert_eq!(percentile(&[42], 99.0), 42.0);
    }
}
