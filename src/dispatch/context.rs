//! Per-message context handed to the dispatch engine.

use tokio_util::sync::CancellationToken;

use crate::message::record::RecordHeader;
use crate::observability::propagation::{serialize_trace, TraceContext};

/// Trace identity and cancellation scope of one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    trace: TraceContext,
    cancellation: CancellationToken,
}

impl DispatchContext {
    pub fn new(trace: TraceContext, cancellation: CancellationToken) -> Self {
        Self { trace, cancellation }
    }

    pub fn trace_context(&self) -> &TraceContext {
        &self.trace
    }

    /// Headers a dispatcher attaches to outbound requests to continue the trace.
    pub fn trace_headers(&self) -> Vec<RecordHeader> {
        serialize_trace(&self.trace)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the enclosing operation is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }
}
