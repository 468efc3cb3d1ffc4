//! Shared fakes for integration testing.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use channel_dispatcher::consumer::ConsumerSession;
use channel_dispatcher::dispatch::{
    ConsumerMessageHandler, DispatchContext, DispatchError, DispatchExecutionInfo, DispatchRequest,
    DispatchResult, MessageDispatcher, ReadinessTracker, Subscription,
};
use channel_dispatcher::message::{RawRecord, RecordHeaders};
use channel_dispatcher::observability::metrics::{MetricsError, ReportArgs, StatsReporter};
use channel_dispatcher::observability::propagation::{TraceContext, TraceId};
use channel_dispatcher::observability::tracing::DISPATCH_SPAN_NAME;
use tokio_util::sync::CancellationToken;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;
use url::Url;
use uuid::Uuid;

pub const TOPIC: &str = "knative-messaging-kafka.default.orders";
pub const NAMESPACE: &str = "default";

/// What the fake dispatcher does on one call.
#[derive(Debug, Clone)]
pub enum Behavior {
    Respond(Option<DispatchExecutionInfo>, Result<(), DispatchError>),
    Delay(Duration),
    Panic(&'static str),
    Hang,
}

impl Behavior {
    pub fn accepted() -> Self {
        Behavior::Respond(Some(DispatchExecutionInfo::new(Duration::from_millis(5), 202)), Ok(()))
    }
}

/// One call observed by [`RecordingDispatcher`].
#[derive(Debug, Clone)]
pub struct SeenDispatch {
    pub trace: TraceContext,
    pub trace_headers: RecordHeaders,
    pub value: Option<bytes::Bytes>,
    pub subscriber: Option<Url>,
}

/// Dispatcher that plays back scripted behaviors and records every call.
pub struct RecordingDispatcher {
    script: Mutex<VecDeque<Behavior>>,
    fallback: Behavior,
    seen: Mutex<Vec<SeenDispatch>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordingDispatcher {
    pub fn new(fallback: Behavior) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            seen: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn accepting() -> Self {
        Self::new(Behavior::accepted())
    }

    /// Queue behaviors used before falling back.
    pub fn then(self, behavior: Behavior) -> Self {
        self.script.lock().unwrap().push_back(behavior);
        self
    }

    pub fn seen(&self) -> Vec<SeenDispatch> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageDispatcher for RecordingDispatcher {
    async fn dispatch_message_with_retries(
        &self,
        cx: &DispatchContext,
        request: DispatchRequest<'_>,
    ) -> DispatchResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        self.seen.lock().unwrap().push(SeenDispatch {
            trace: cx.trace_context().clone(),
            trace_headers: cx.trace_headers().into_iter().collect(),
            value: request.message.value.clone(),
            subscriber: request.subscriber.cloned(),
        });

        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match behavior {
            Behavior::Respond(info, result) => (info, result),
            Behavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                (Some(DispatchExecutionInfo::new(delay, 200)), Ok(()))
            }
            Behavior::Panic(message) => panic!("{}", message),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                (None, Ok(()))
            }
        }
    }
}

/// One metric report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Count { event_type: String, code: u16 },
    Time { code: u16 },
}

/// Reporter that keeps every report in memory.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    /// Drain the reports seen so far.
    pub fn take(&self) -> Vec<Report> {
        std::mem::take(&mut *self.reports.lock().unwrap())
    }
}

impl StatsReporter for RecordingReporter {
    fn report_event_count(&self, args: &ReportArgs, response_code: u16) -> Result<(), MetricsError> {
        self.reports.lock().unwrap().push(Report::Count {
            event_type: args.event_type.clone(),
            code: response_code,
        });
        Ok(())
    }

    fn report_event_dispatch_time(
        &self,
        _args: &ReportArgs,
        response_code: u16,
        _duration: Duration,
    ) -> Result<(), MetricsError> {
        self.reports.lock().unwrap().push(Report::Time { code: response_code });
        Ok(())
    }
}

/// Session that records marked offsets.
#[derive(Default)]
pub struct RecordingSession {
    marked: Mutex<Vec<(i32, i64)>>,
    cancel: CancellationToken,
}

impl RecordingSession {
    pub fn marked(&self) -> Vec<(i32, i64)> {
        self.marked.lock().unwrap().clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl ConsumerSession for RecordingSession {
    fn mark_message(&self, record: &RawRecord) {
        self.marked.lock().unwrap().push((record.partition, record.offset));
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Everything a handler test needs.
pub struct Fixture {
    pub dispatcher: Arc<RecordingDispatcher>,
    pub reporter: Arc<RecordingReporter>,
    pub readiness: Arc<ReadinessTracker>,
    pub handler: Arc<ConsumerMessageHandler>,
}

impl Fixture {
    pub fn new(dispatcher: RecordingDispatcher) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let reporter = Arc::new(RecordingReporter::default());
        let readiness = Arc::new(ReadinessTracker::new());
        let uid = Uuid::new_v4();
        let handler = Arc::new(ConsumerMessageHandler::new(
            Arc::new(subscription(uid)),
            format!("kafka.{}.orders.{}", NAMESPACE, uid),
            NAMESPACE,
            dispatcher.clone(),
            reporter.clone(),
            readiness.clone(),
        ));
        Self {
            dispatcher,
            reporter,
            readiness,
            handler,
        }
    }
}

pub fn subscription(uid: Uuid) -> Subscription {
    let mut sub = Subscription::new(uid);
    sub.subscriber = Some(Url::parse("http://billing.default.svc.cluster.local/").unwrap());
    sub
}

/// Binary-mode event of type `event_type`.
pub fn binary_event(partition: i32, offset: i64, event_type: &str) -> RawRecord {
    RawRecord::new(TOPIC, partition, offset)
        .with_header("ce_specversion", "1.0")
        .with_header("ce_id", format!("evt-{}", offset))
        .with_header("ce_source", "/orders")
        .with_header("ce_type", event_type.to_string())
        .with_header("content-type", "application/json")
        .with_value(format!("{{\"offset\":{}}}", offset))
}

/// Structured-mode event of type `event_type`.
pub fn structured_event(partition: i32, offset: i64, event_type: &str) -> RawRecord {
    let body = serde_json::json!({
        "specversion": "1.0",
        "id": format!("evt-{}", offset),
        "source": "/orders",
        "type": event_type,
        "data": { "offset": offset },
    });
    RawRecord::new(TOPIC, partition, offset)
        .with_header("content-type", "application/cloudevents+json")
        .with_value(body.to_string())
}

/// A record that is not a CloudEvent.
pub fn plain_record(partition: i32, offset: i64) -> RawRecord {
    RawRecord::new(TOPIC, partition, offset).with_value("not an event")
}

/// `record` with the producer's trace attached.
pub fn with_trace(mut record: RawRecord, trace: &TraceContext) -> RawRecord {
    for header in channel_dispatcher::observability::propagation::serialize_trace(trace) {
        record.headers.push(header.key, header.value);
    }
    record
}

pub fn trace_ids(seen: &[SeenDispatch]) -> Vec<TraceId> {
    seen.iter().map(|s| s.trace.trace_id()).collect()
}

/// Counts of dispatch spans and envelope releases seen by [`LifecycleRecorder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifecycle {
    pub spans_opened: usize,
    pub spans_closed: usize,
    pub envelopes_released: usize,
}

/// Layer that tracks message spans and envelope releases.
#[derive(Clone, Default)]
pub struct LifecycleRecorder {
    counts: Arc<Mutex<Lifecycle>>,
}

impl LifecycleRecorder {
    pub fn counts(&self) -> Lifecycle {
        *self.counts.lock().unwrap()
    }
}

struct MessageField(Option<String>);

impl Visit for MessageField {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{:?}", value));
        }
    }
}

impl<S> Layer<S> for LifecycleRecorder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() == DISPATCH_SPAN_NAME {
            self.counts.lock().unwrap().spans_opened += 1;
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        if ctx.span(&id).is_some_and(|span| span.name() == DISPATCH_SPAN_NAME) {
            self.counts.lock().unwrap().spans_closed += 1;
        }
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = MessageField(None);
        event.record(&mut message);
        if message.0.as_deref() == Some("Envelope released") {
            self.counts.lock().unwrap().envelopes_released += 1;
        }
    }
}
