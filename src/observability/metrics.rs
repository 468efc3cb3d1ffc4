//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the delivery metrics the handler reports
//! - Expose them in Prometheus format
//! - Keep the handler independent of the sink (`StatsReporter`)
//!
//! # Metrics
//! - `event_count` (counter): delivered or failed events by namespace,
//!   event type, response code and code class
//! - `event_dispatch_latencies` (histogram, ms): time spent dispatching,
//!   same labels
//!
//! # Design Decisions
//! - Reporting is best effort: failures are returned, never panicked on
//! - Empty event types are reported as `unknown`

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;

use crate::dispatch::engine::{is_valid_status, DispatchError};

pub const EVENT_COUNT: &str = "event_count";
pub const EVENT_DISPATCH_LATENCIES: &str = "event_dispatch_latencies";

const UNKNOWN_EVENT_TYPE: &str = "unknown";

/// Errors raised while reporting metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid response code {0}")]
    InvalidResponseCode(u16),

    #[error("failed to install metrics exporter: {0}")]
    Exporter(String),
}

/// Labels shared by every metric of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportArgs {
    pub namespace: String,
    pub event_type: String,
}

impl ReportArgs {
    pub fn new(namespace: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            event_type: event_type.into(),
        }
    }
}

/// Metrics sink used by the message handler.
pub trait StatsReporter: Send + Sync {
    /// Count one event under `response_code`.
    fn report_event_count(&self, args: &ReportArgs, response_code: u16) -> Result<(), MetricsError>;

    /// Record how long a dispatch took.
    fn report_event_dispatch_time(
        &self,
        args: &ReportArgs,
        response_code: u16,
        duration: Duration,
    ) -> Result<(), MetricsError>;

    /// Count one failed event, bucketed by the error's own status code.
    fn report_event_count_for_error(&self, err: &DispatchError, args: &ReportArgs) {
        if let Err(e) = self.report_event_count(args, err.status_code()) {
            tracing::debug!(error = %e, dispatch_error = err.kind(), "Failed to report event count");
        }
    }
}

/// `StatsReporter` backed by the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusStatsReporter;

impl PrometheusStatsReporter {
    pub fn new() -> Self {
        Self
    }
}

fn labels(args: &ReportArgs, response_code: u16) -> Result<(String, String, String, String), MetricsError> {
    if !is_valid_status(response_code) {
        return Err(MetricsError::InvalidResponseCode(response_code));
    }
    let event_type = if args.event_type.is_empty() {
        UNKNOWN_EVENT_TYPE.to_string()
    } else {
        args.event_type.clone()
    };
    Ok((
        args.namespace.clone(),
        event_type,
        response_code.to_string(),
        response_code_class(response_code),
    ))
}

/// `2xx`, `4xx`, ...
pub fn response_code_class(code: u16) -> String {
    format!("{}xx", code / 100)
}

impl StatsReporter for PrometheusStatsReporter {
    fn report_event_count(&self, args: &ReportArgs, response_code: u16) -> Result<(), MetricsError> {
        let (namespace, event_type, code, class) = labels(args, response_code)?;
        metrics::counter!(
            EVENT_COUNT,
            "namespace_name" => namespace,
            "event_type" => event_type,
            "response_code" => code,
            "response_code_class" => class
        )
        .increment(1);
        Ok(())
    }

    fn report_event_dispatch_time(
        &self,
        args: &ReportArgs,
        response_code: u16,
        duration: Duration,
    ) -> Result<(), MetricsError> {
        let (namespace, event_type, code, class) = labels(args, response_code)?;
        metrics::histogram!(
            EVENT_DISPATCH_LATENCIES,
            "namespace_name" => namespace,
            "event_type" => event_type,
            "response_code" => code,
            "response_code_class" => class
        )
        .record(duration.as_secs_f64() * 1000.0);
        Ok(())
    }
}

/// Install the Prometheus exporter, serving `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Exporter(e.to_string()))?;

    metrics::describe_counter!(EVENT_COUNT, "Number of events dispatched by the channel");
    metrics::describe_histogram!(
        EVENT_DISPATCH_LATENCIES,
        metrics::Unit::Milliseconds,
        "Time spent dispatching an event to a subscriber"
    );

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}
