//! Metrics for report assembly.
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op, so the pure pipeline stays usable in tests.

use std::fmt;
use std::sync::OnceLock;

use ::metrics::Unit;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Report metrics
    ReportsAssembled,
    ReportRows,
    ReportAssemblyDuration,
    ReportSlotOverflow,
    ReportSentinelSubstituted,

    // Source metrics
    SourceFetchSuccess,
    SourceFetchError,
    SourceFetchDuration,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ReportsAssembled => "ops_reports_assembled_total",
            MetricName::ReportRows => "ops_reports_rows_total",
            MetricName::ReportAssemblyDuration => "ops_reports_assembly_duration_seconds",
            MetricName::ReportSlotOverflow => "ops_reports_slot_overflow_total",
            MetricName::ReportSentinelSubstituted => "ops_reports_sentinel_substituted_total",

            MetricName::SourceFetchSuccess => "ops_reports_source_fetch_success_total",
            MetricName::SourceFetchError => "ops_reports_source_fetch_error_total",
            MetricName::SourceFetchDuration => "ops_reports_source_fetch_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            ReportsAssembled,
            ReportRows,
            ReportAssemblyDuration,
            ReportSlotOverflow,
            ReportSentinelSubstituted,
            SourceFetchSuccess,
            SourceFetchError,
            SourceFetchDuration,
        ]
        .into_iter()
    }

    /// Returns (phase, description, unit)
    pub fn metadata(&self) -> (&'static str, &'static str, Option<&'static str>) {
        match self {
            MetricName::ReportsAssembled => ("report", "Reports assembled", None),
            MetricName::ReportRows => ("report", "Report rows produced", None),
            MetricName::ReportAssemblyDuration => ("report", "Assembly duration", Some("s")),
            MetricName::ReportSlotOverflow => {
                ("report", "Child records dropped by slot capacity", None)
            }
            MetricName::ReportSentinelSubstituted => {
                ("report", "Unresolved lookups replaced by a sentinel", None)
            }

            MetricName::SourceFetchSuccess => ("source", "Successful upstream fetches", None),
            MetricName::SourceFetchError => ("source", "Failed or timed out upstream fetches", None),
            MetricName::SourceFetchDuration => ("source", "Upstream fetch duration", Some("s")),
        }
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is harmless.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    describe_all();
    info!("Metrics system initialized");
    Ok(())
}

/// Register the description and unit of every metric with the recorder.
pub fn describe_all() {
    for metric in MetricName::all_metrics() {
        let (_phase, description, unit) = metric.metadata();
        match unit {
            Some("s") => {
                ::metrics::describe_histogram!(metric.as_str(), Unit::Seconds, description);
            }
            _ => {
                ::metrics::describe_counter!(metric.as_str(), Unit::Count, description);
            }
        }
    }
}

/// Render the current metrics in Prometheus exposition format
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

// ============================================================================
// Report Metrics
// ============================================================================

pub mod report {
    use super::MetricName;

    /// Record one assembled report
    pub fn assembled(report: &str, rows: usize, secs: f64) {
        ::metrics::counter!(MetricName::ReportsAssembled.as_str(), "report" => report.to_string())
            .increment(1);
        ::metrics::counter!(MetricName::ReportRows.as_str(), "report" => report.to_string())
            .increment(rows as u64);
        ::metrics::histogram!(MetricName::ReportAssemblyDuration.as_str()).record(secs);
    }

    /// Record child records cut off by the slot capacity
    pub fn slot_overflow(report: &str, dropped: usize) {
        ::metrics::counter!(MetricName::ReportSlotOverflow.as_str(), "report" => report.to_string())
            .increment(dropped as u64);
    }

    /// Record a lookup replaced by its sentinel
    pub fn sentinel_substituted() {
        ::metrics::counter!(MetricName::ReportSentinelSubstituted.as_str()).increment(1);
    }
}

// ============================================================================
// Source Metrics
// ============================================================================

pub mod source {
    use super::MetricName;

    pub fn fetch_success(report: &str, secs: f64) {
        ::metrics::counter!(MetricName::SourceFetchSuccess.as_str(), "report" => report.to_string())
            .increment(1);
        ::metrics::histogram!(MetricName::SourceFetchDuration.as_str()).record(secs);
    }

    pub fn fetch_error(report: &str) {
        ::metrics::counter!(MetricName::SourceFetchError.as_str(), "report" => report.to_string())
            .increment(1);
    }
}
