//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every handled record produces:
//!     → logging.rs (structured log events)
//!     → metrics.rs (event counts, dispatch latencies)
//!     → tracing.rs (one span per message, linked to the producer's span)
//!
//! Trace context crosses the broker through:
//!     → propagation.rs (traceparent / tracestate record headers)
//! ```
//!
//! # Design Decisions
//! - Trace context travels in record headers, never in the event body
//! - Metric reporting sits behind a trait so tests can observe it
//! - Reporting failures are logged, never surfaced as delivery failures

pub mod logging;
pub mod metrics;
pub mod propagation;
pub mod tracing;
