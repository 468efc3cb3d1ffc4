//! Distributed tracing support.
//!
//! # Responsibilities
//! - Extract trace context from incoming record headers
//! - Start a child span of the producer's span, or a new root span
//! - Hand the dispatch engine a context it can propagate downstream
//!
//! # Design Decisions
//! - Never fails: unreadable trace headers degrade to a root span
//! - The message span is parented on the producer through OpenTelemetry, so an
//!   exporting layer sees the same trace; without one, ids are generated here
//! - Spans end exactly once, explicitly or on drop (covers panic unwinding)

use std::time::Instant;

use opentelemetry::trace::TraceContextExt;
use tokio_util::sync::CancellationToken;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::dispatch::context::DispatchContext;
use crate::message::envelope::Envelope;
use crate::observability::propagation::{parse_span_context, SpanId, TraceContext, TRACE_PARENT_HEADER};

/// Name of the span opened for every dispatched message.
pub const DISPATCH_SPAN_NAME: &str = "channel.dispatch";

/// Active span for one message.
#[derive(Debug)]
pub struct MessageSpan {
    span: tracing::Span,
    context: TraceContext,
    parent_span_id: Option<SpanId>,
    started: Instant,
    ended: bool,
}

impl MessageSpan {
    fn start(topic: &str, parent: Option<&TraceContext>) -> Self {
        let span = tracing::info_span!(
            DISPATCH_SPAN_NAME,
            otel.kind = "consumer",
            messaging.destination = %topic,
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            parent_span_id = tracing::field::Empty,
        );
        if let Some(parent) = parent {
            span.set_parent(parent.to_otel_context());
            span.record("parent_span_id", tracing::field::display(parent.span_id()));
        }

        let context = exported_context(&span, parent).unwrap_or_else(|| match parent {
            Some(parent) => parent.new_child(),
            None => TraceContext::new_root(),
        });
        span.record("trace_id", tracing::field::display(context.trace_id()));
        span.record("span_id", tracing::field::display(context.span_id()));

        Self {
            span,
            context,
            parent_span_id: parent.map(TraceContext::span_id),
            started: Instant::now(),
            ended: false,
        }
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn trace_context(&self) -> &TraceContext {
        &self.context
    }

    /// Span id of the producer, when the trace was resumed.
    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// End the span. Later calls are no-ops.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        tracing::trace!(
            parent: &self.span,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Span ended"
        );
        drop(std::mem::replace(&mut self.span, tracing::Span::none()));
    }
}

impl Drop for MessageSpan {
    fn drop(&mut self) {
        self.end();
    }
}

/// Identity an OpenTelemetry layer assigned to `span`, carrying the parent's state.
fn exported_context(span: &tracing::Span, parent: Option<&TraceContext>) -> Option<TraceContext> {
    let otel = span.context();
    let assigned = otel.span().span_context().clone();
    if !assigned.is_valid() {
        return None;
    }
    let context = match parent {
        Some(parent) if parent.trace_id() == assigned.trace_id() => parent.with_span_id(assigned.span_id()),
        _ => TraceContext::from_span_context(assigned),
    };
    Some(context)
}

/// Resume the trace embedded in `envelope`, or start a new one.
///
/// The returned context carries a child cancellation token of `parent`.
pub fn start_trace_from_message(
    parent: &CancellationToken,
    envelope: &Envelope<'_>,
    topic: &str,
) -> (DispatchContext, MessageSpan) {
    let headers = envelope.headers();

    let span = match parse_span_context(headers) {
        Some(remote) => MessageSpan::start(topic, Some(&remote)),
        None => {
            if headers.get(TRACE_PARENT_HEADER).is_some() {
                tracing::debug!(topic = %topic, "Malformed trace headers, starting a new trace");
            }
            MessageSpan::start(topic, None)
        }
    };

    let context = DispatchContext::new(span.trace_context().clone(), parent.child_token());
    (context, span)
}
