//! Sequential consumption of one claimed partition.

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::consumer::ConsumerHandler;
use crate::dispatch::handler::HandleError;
use crate::message::RawRecord;

/// The runtime's view of the current group generation.
pub trait ConsumerSession: Send + Sync {
    /// Record that `record` was consumed; the runtime commits it later.
    fn mark_message(&self, record: &RawRecord);

    /// Cancelled when the generation ends (rebalance or shutdown).
    fn cancellation(&self) -> &CancellationToken;
}

/// Totals of one claim loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimSummary {
    pub acked: u64,
    pub failed: u64,
}

/// Feed the records of `partition` to `handler`, one at a time.
///
/// Acknowledged records are marked on the session. Failures are logged,
/// forwarded to `errors` when there is room, and flip the partition to not
/// ready until the next success. Returns when the stream ends or the session
/// is cancelled.
pub async fn consume_claim<H, S, R>(
    handler: &H,
    session: &S,
    partition: i32,
    records: R,
    errors: Option<mpsc::Sender<HandleError>>,
) -> ClaimSummary
where
    H: ConsumerHandler + ?Sized,
    S: ConsumerSession + ?Sized,
    R: Stream<Item = RawRecord>,
{
    let cx = session.cancellation();
    let mut summary = ClaimSummary::default();
    futures_util::pin_mut!(records);

    handler.set_ready(partition, true);

    loop {
        let record = tokio::select! {
            biased;
            _ = cx.cancelled() => break,
            next = records.next() => match next {
                Some(record) => record,
                None => break,
            },
        };

        match handler.handle(cx, &record).await {
            Ok(()) => {
                session.mark_message(&record);
                handler.set_ready(partition, true);
                summary.acked += 1;
            }
            Err(err) => {
                tracing::info!(
                    consumer_group = handler.consumer_group(),
                    topic = %record.topic,
                    partition,
                    offset = record.offset,
                    error = %err,
                    "Failure while handling a message"
                );
                if let Some(errors) = &errors {
                    if errors.try_send(err).is_err() {
                        tracing::debug!(partition, "Error channel full or closed, dropping error");
                    }
                }
                handler.set_ready(partition, false);
                summary.failed += 1;
            }
        }
    }

    tracing::debug!(
        consumer_group = handler.consumer_group(),
        partition,
        acked = summary.acked,
        failed = summary.failed,
        "Claim finished"
    );
    summary
}
