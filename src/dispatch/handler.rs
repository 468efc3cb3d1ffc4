//! Per-record message handler.
//!
//! # Responsibilities
//! - Decode the record and reject unknown encodings
//! - Resume or start the trace of the message
//! - Copy the event for transport and extract its type
//! - Invoke the dispatch engine and report the outcome
//! - Trap panics so the partition worker survives
//!
//! # Design Decisions
//! - No retry logic here; the dispatch engine owns retries and dead letters
//! - Cancellation of the caller's token aborts the dispatch, and the outcome
//!   is still classified and reported as a dispatch error
//! - Only a completed delivery acknowledges the record

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::consumer::ConsumerHandler;
use crate::dispatch::engine::{DispatchError, DispatchRequest, MessageDispatcher};
use crate::dispatch::outcome::parse_dispatch_result_and_report_metrics;
use crate::dispatch::readiness::ReadinessTracker;
use crate::dispatch::subscription::Subscription;
use crate::message::{BufferedMessage, Encoding, Envelope, RawRecord, TypeExtractor};
use crate::observability::metrics::{ReportArgs, StatsReporter};
use crate::observability::tracing::start_trace_from_message;
use crate::resilience::isolate;

/// Why a record was not acknowledged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandleError {
    /// The record is not an event this channel understands. Terminal.
    #[error("received a message with unknown encoding")]
    UnknownEncoding,

    /// Delivery did not complete.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Handling panicked; the panic was contained.
    #[error("panic while handling message: {0}")]
    Panicked(String),
}

/// Delivers the records of one channel topic to one subscription.
pub struct ConsumerMessageHandler {
    subscription: Arc<Subscription>,
    consumer_group: String,
    channel_namespace: String,
    dispatcher: Arc<dyn MessageDispatcher>,
    reporter: Arc<dyn StatsReporter>,
    readiness: Arc<ReadinessTracker>,
}

impl ConsumerMessageHandler {
    pub fn new(
        subscription: Arc<Subscription>,
        consumer_group: impl Into<String>,
        channel_namespace: impl Into<String>,
        dispatcher: Arc<dyn MessageDispatcher>,
        reporter: Arc<dyn StatsReporter>,
        readiness: Arc<ReadinessTracker>,
    ) -> Self {
        Self {
            subscription,
            consumer_group: consumer_group.into(),
            channel_namespace: channel_namespace.into(),
            dispatcher,
            reporter,
            readiness,
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Handle one record. `Ok` means delivered and safe to advance past.
    pub async fn handle(&self, cx: &CancellationToken, record: &RawRecord) -> Result<(), HandleError> {
        match isolate(self.handle_message(cx, record)).await {
            Ok(result) => result,
            Err(payload) => {
                tracing::warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    subscription = %self.subscription,
                    panic = %payload,
                    "Panic happened while handling a message"
                );
                Err(HandleError::Panicked(payload.0))
            }
        }
    }

    async fn handle_message(&self, cx: &CancellationToken, record: &RawRecord) -> Result<(), HandleError> {
        // 1. Decode
        let mut envelope = Envelope::from_record(record);
        if envelope.encoding() == Encoding::Unknown {
            return Err(HandleError::UnknownEncoding);
        }

        tracing::debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            subscription = %self.subscription,
            "Going to dispatch the message"
        );

        // 2. Trace
        let (dispatch_cx, mut span) = start_trace_from_message(cx, &envelope, &record.topic);

        // 3. Copy for transport; the original bytes are not needed afterwards
        let mut type_extractor = TypeExtractor::new();
        let message = BufferedMessage::copy_from(&envelope, &mut [&mut type_extractor]);
        let args = ReportArgs::new(self.channel_namespace.as_str(), type_extractor.into_event_type());
        envelope.finish();

        // 4. Dispatch
        let request = DispatchRequest {
            message,
            additional_headers: None,
            subscriber: self.subscription.subscriber.as_ref(),
            reply: self.subscription.reply.as_ref(),
            dead_letter: self.subscription.dead_letter.as_ref(),
            retry_config: self.subscription.retry_config.as_ref(),
        };
        let dispatch = self
            .dispatcher
            .dispatch_message_with_retries(&dispatch_cx, request)
            .instrument(span.span().clone());

        let (info, result) = tokio::select! {
            biased;
            outcome = dispatch => outcome,
            _ = dispatch_cx.cancelled() => (None, Err(DispatchError::Cancelled)),
        };

        // 5. Report
        let result =
            parse_dispatch_result_and_report_metrics(info.as_ref(), self.reporter.as_ref(), &args, result);
        if let Err(e) = &result {
            tracing::debug!(
                parent: span.span(),
                error = %e,
                kind = e.kind(),
                "Dispatch failed"
            );
        }
        span.end();

        // 6. Acknowledge only a completed delivery
        result.map_err(HandleError::from)
    }
}

#[async_trait]
impl ConsumerHandler for ConsumerMessageHandler {
    fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    async fn handle(&self, cx: &CancellationToken, record: &RawRecord) -> Result<(), HandleError> {
        ConsumerMessageHandler::handle(self, cx, record).await
    }

    fn set_ready(&self, partition: i32, ready: bool) {
        self.readiness.set_ready(self.subscription.uid, partition, ready);
    }
}
