//! Trace context propagation through record headers.
//!
//! Uses the W3C Trace Context layout (`traceparent`, `tracestate`) through the
//! OpenTelemetry propagator, so producers in any language can link their spans
//! to ours.
//!
//! ```text
//! traceparent: 00-<32 hex trace id>-<16 hex span id>-<2 hex flags>
//! tracestate:  key=value[,key=value]*   (value percent-encoded)
//! ```
//!
//! # Design Decisions
//! - Trace-state values are percent-encoded so they may carry `,` and `=`
//! - A malformed `traceparent` means "no parent"; a malformed `tracestate`
//!   only drops the state, the trace itself is kept
//! - Trace-state entries are validated when built, so anything this crate
//!   serializes parses back unchanged

use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use rand::Rng;
use thiserror::Error;

use crate::message::record::{RecordHeader, RecordHeaders};

pub use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};

/// Header carrying version, trace id, span id and flags.
pub const TRACE_PARENT_HEADER: &str = "traceparent";

/// Header carrying vendor trace state.
pub const TRACE_STATE_HEADER: &str = "tracestate";

/// Upper bound on trace-state members.
pub const MAX_TRACE_STATE_ENTRIES: usize = 32;

/// Field widths of a `traceparent` value: version, trace id, span id, flags.
const TRACE_PARENT_WIDTHS: [usize; 4] = [2, 32, 16, 2];

/// Why a set of trace-state entries was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraceStateError {
    #[error("trace-state key must not be empty")]
    EmptyKey,

    #[error("trace-state key {0:?} appears more than once")]
    DuplicateKey(String),

    #[error("trace state has {0} entries, at most {max} allowed", max = MAX_TRACE_STATE_ENTRIES)]
    TooManyEntries(usize),

    #[error("trace state rejected: {0}")]
    Rejected(String),
}

fn random_trace_id() -> TraceId {
    let mut rng = rand::thread_rng();
    loop {
        let id = TraceId::from_bytes(rng.gen());
        if id != TraceId::INVALID {
            return id;
        }
    }
}

fn random_span_id() -> SpanId {
    let mut rng = rand::thread_rng();
    loop {
        let id = SpanId::from_bytes(rng.gen());
        if id != SpanId::INVALID {
            return id;
        }
    }
}

/// Check decoded entries and build the wire-form state.
fn encode_trace_state(entries: &[(String, String)]) -> Result<TraceState, TraceStateError> {
    if entries.len() > MAX_TRACE_STATE_ENTRIES {
        return Err(TraceStateError::TooManyEntries(entries.len()));
    }
    for (i, (key, _)) in entries.iter().enumerate() {
        if key.is_empty() {
            return Err(TraceStateError::EmptyKey);
        }
        if entries[..i].iter().any(|(k, _)| k == key) {
            return Err(TraceStateError::DuplicateKey(key.clone()));
        }
    }
    TraceState::from_key_value(
        entries
            .iter()
            .map(|(k, v)| (k.as_str(), urlencoding::encode(v).into_owned())),
    )
    .map_err(|e| TraceStateError::Rejected(e.to_string()))
}

/// Decode a wire-form state; `None` when any member is unusable.
fn decode_trace_state(state: &TraceState) -> Option<Vec<(String, String)>> {
    let header = state.header();
    let mut entries: Vec<(String, String)> = Vec::new();
    for member in header.split(',').filter(|m| !m.is_empty()) {
        let (key, value) = member.split_once('=')?;
        let value = urlencoding::decode(value).ok()?.into_owned();
        entries.push((key.to_string(), value));
    }
    encode_trace_state(&entries).ok()?;
    Some(entries)
}

/// Propagatable identity of a distributed trace.
#[derive(Debug, Clone)]
pub struct TraceContext {
    span_context: SpanContext,
}

impl TraceContext {
    /// Start of a new trace, sampled, no trace state.
    pub fn new_root() -> Self {
        Self::from_span_context(SpanContext::new(
            random_trace_id(),
            random_span_id(),
            TraceFlags::SAMPLED,
            false,
            TraceState::default(),
        ))
    }

    pub fn from_span_context(span_context: SpanContext) -> Self {
        Self { span_context }
    }

    /// Same trace and state, fresh span id.
    pub fn new_child(&self) -> Self {
        self.with_span_id(random_span_id())
    }

    /// Same trace and state under `span_id`.
    pub fn with_span_id(&self, span_id: SpanId) -> Self {
        Self::from_span_context(SpanContext::new(
            self.trace_id(),
            span_id,
            self.trace_flags(),
            false,
            self.span_context.trace_state().clone(),
        ))
    }

    /// Replace the trace state. Values may hold any characters.
    pub fn with_trace_state<K, V>(self, entries: impl IntoIterator<Item = (K, V)>) -> Result<Self, TraceStateError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entries: Vec<(String, String)> = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let state = encode_trace_state(&entries)?;
        Ok(self.replace_trace_state(state))
    }

    fn replace_trace_state(self, state: TraceState) -> Self {
        let sc = &self.span_context;
        Self::from_span_context(SpanContext::new(
            sc.trace_id(),
            sc.span_id(),
            sc.trace_flags(),
            sc.is_remote(),
            state,
        ))
    }

    pub fn trace_id(&self) -> TraceId {
        self.span_context.trace_id()
    }

    pub fn span_id(&self) -> SpanId {
        self.span_context.span_id()
    }

    pub fn trace_flags(&self) -> TraceFlags {
        self.span_context.trace_flags()
    }

    pub fn is_sampled(&self) -> bool {
        self.span_context.is_sampled()
    }

    /// True when the context was read from a producer's headers.
    pub fn is_remote(&self) -> bool {
        self.span_context.is_remote()
    }

    pub fn is_valid(&self) -> bool {
        self.span_context.is_valid()
    }

    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    /// Decoded trace-state entries, in order.
    pub fn trace_state(&self) -> Vec<(String, String)> {
        decode_trace_state(self.span_context.trace_state()).unwrap_or_default()
    }

    /// Decoded trace-state value of `key`.
    pub fn trace_state_value(&self, key: &str) -> Option<String> {
        let raw = self.span_context.trace_state().get(key)?;
        urlencoding::decode(raw).ok().map(|v| v.into_owned())
    }

    /// OpenTelemetry context whose remote parent is this trace.
    pub fn to_otel_context(&self) -> Context {
        Context::new().with_remote_span_context(self.span_context.clone())
    }
}

/// Equal when ids, flags and state match; where the context came from is ignored.
impl PartialEq for TraceContext {
    fn eq(&self, other: &Self) -> bool {
        self.trace_id() == other.trace_id()
            && self.span_id() == other.span_id()
            && self.trace_flags() == other.trace_flags()
            && self.span_context.trace_state().header() == other.span_context.trace_state().header()
    }
}

impl Eq for TraceContext {}

struct HeaderExtractor<'a>(&'a RecordHeaders);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get_str(key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|h| h.key.as_str()).collect()
    }
}

struct HeaderInjector<'a>(&'a mut Vec<RecordHeader>);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        // The propagator writes an empty tracestate for stateless contexts
        if value.is_empty() {
            return;
        }
        self.0.push(RecordHeader::new(key, value));
    }
}

fn has_fixed_width_fields(trace_parent: &str) -> bool {
    let fields: Vec<&str> = trace_parent.trim().split('-').collect();
    fields.len() >= TRACE_PARENT_WIDTHS.len()
        && fields.iter().zip(TRACE_PARENT_WIDTHS).all(|(f, width)| f.len() == width)
}

/// Encode a trace context as record headers.
///
/// `tracestate` is omitted when the state is empty. Nothing is written for an
/// invalid context.
pub fn serialize_trace(context: &TraceContext) -> Vec<RecordHeader> {
    let mut headers = Vec::with_capacity(2);
    TraceContextPropagator::new().inject_context(&context.to_otel_context(), &mut HeaderInjector(&mut headers));
    headers
}

/// Decode the trace context carried by `headers`.
///
/// Returns `None` when no trace headers are present or when `traceparent` is
/// malformed; both mean "no parent trace".
pub fn parse_span_context(headers: &RecordHeaders) -> Option<TraceContext> {
    if !has_fixed_width_fields(headers.get_str(TRACE_PARENT_HEADER)?) {
        return None;
    }

    let cx = TraceContextPropagator::new().extract_with_context(&Context::new(), &HeaderExtractor(headers));
    let span_context = cx.span().span_context().clone();
    if !span_context.is_valid() {
        return None;
    }

    let context = TraceContext::from_span_context(span_context);
    if decode_trace_state(context.span_context.trace_state()).is_none() {
        tracing::debug!(
            trace_id = %context.trace_id(),
            "Malformed trace state, keeping the trace without it"
        );
        return Some(context.replace_trace_state(TraceState::default()));
    }
    Some(context)
}
