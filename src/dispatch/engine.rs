//! Contract with the dispatch engine.
//!
//! The engine owns outbound delivery, retries and dead-letter fallback. The
//! handler only builds a [`DispatchRequest`] and records what comes back.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::dispatch::context::DispatchContext;
use crate::dispatch::subscription::RetryConfig;
use crate::message::buffered::BufferedMessage;
use crate::message::record::RecordHeaders;

/// Status code used when a failure has no response of its own.
pub const INTERNAL_ERROR_CODE: u16 = 500;

/// What the engine observed while delivering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchExecutionInfo {
    /// Time spent delivering. `None` or zero means not measured.
    pub duration: Option<Duration>,

    /// Status of the last response. `None` means no response.
    pub response_code: Option<u16>,

    /// Body of the last response, if the engine kept it.
    pub response_body: Option<Bytes>,
}

impl DispatchExecutionInfo {
    pub fn new(duration: Duration, response_code: u16) -> Self {
        Self {
            duration: Some(duration),
            response_code: Some(response_code),
            response_body: None,
        }
    }

    /// Duration, if it was actually measured.
    pub fn measured_duration(&self) -> Option<Duration> {
        self.duration.filter(|d| !d.is_zero())
    }

    /// Response code, if it is a real status code.
    pub fn valid_response_code(&self) -> Option<u16> {
        self.response_code.filter(|code| is_valid_status(*code))
    }
}

pub(crate) fn is_valid_status(code: u16) -> bool {
    (100..=599).contains(&code)
}

/// Delivery failures reported by the engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Neither a subscriber nor a reply destination was given.
    #[error("no destination to dispatch to")]
    NoDestination,

    /// The destination could not be reached.
    #[error("destination {url} unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    /// The destination answered with a non-success status.
    #[error("destination responded with status {status}")]
    ResponseStatus { status: u16 },

    /// Every retry failed.
    #[error("delivery failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32, last_status: Option<u16> },

    /// Delivery failed and so did the dead-letter fallback.
    #[error("dead letter delivery failed: {reason}")]
    DeadLetterFailed { reason: String, status: Option<u16> },

    /// The destination answered with something that is not a valid event.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// An attempt exceeded its timeout.
    #[error("dispatch timed out after {0:?}")]
    Timeout(Duration),

    /// The enclosing operation was cancelled.
    #[error("dispatch cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Status code this error is counted under.
    pub fn status_code(&self) -> u16 {
        let code = match self {
            DispatchError::NoDestination => Some(404),
            DispatchError::ResponseStatus { status } => Some(*status),
            DispatchError::RetriesExhausted { last_status, .. } => *last_status,
            DispatchError::DeadLetterFailed { status, .. } => *status,
            DispatchError::Unreachable { .. }
            | DispatchError::MalformedResponse(_)
            | DispatchError::Timeout(_)
            | DispatchError::Cancelled => None,
        };
        code.filter(|c| is_valid_status(*c)).unwrap_or(INTERNAL_ERROR_CODE)
    }

    /// Short label of the error class, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NoDestination => "no_destination",
            DispatchError::Unreachable { .. } => "unreachable",
            DispatchError::ResponseStatus { .. } => "response_status",
            DispatchError::RetriesExhausted { .. } => "retries_exhausted",
            DispatchError::DeadLetterFailed { .. } => "dead_letter_failed",
            DispatchError::MalformedResponse(_) => "malformed_response",
            DispatchError::Timeout(_) => "timeout",
            DispatchError::Cancelled => "cancelled",
        }
    }
}

/// Everything the engine needs to deliver one message.
#[derive(Debug)]
pub struct DispatchRequest<'a> {
    pub message: BufferedMessage,
    pub additional_headers: Option<&'a RecordHeaders>,
    pub subscriber: Option<&'a Url>,
    pub reply: Option<&'a Url>,
    pub dead_letter: Option<&'a Url>,
    pub retry_config: Option<&'a RetryConfig>,
}

/// Result of a dispatch: what was observed, and whether it failed.
///
/// Both halves are independent: a failed dispatch may still carry timing and
/// a response code.
pub type DispatchResult = (Option<DispatchExecutionInfo>, Result<(), DispatchError>);

/// Delivers messages to subscribers.
///
/// Implementations must honor `cx` cancellation and may retry internally.
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    async fn dispatch_message_with_retries(
        &self,
        cx: &DispatchContext,
        request: DispatchRequest<'_>,
    ) -> DispatchResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measured_duration() {
        let mut info = DispatchExecutionInfo::default();
        assert!(info.measured_duration().is_none());

        info.duration = Some(Duration::ZERO);
        assert!(info.measured_duration().is_none());

        info.duration = Some(Duration::from_millis(3));
        assert_eq!(info.measured_duration(), Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_valid_response_code() {
        let mut info = DispatchExecutionInfo::new(Duration::from_millis(1), 202);
        assert_eq!(info.valid_response_code(), Some(202));

        info.response_code = Some(0);
        assert_eq!(info.valid_response_code(), None);

        info.response_code = Some(600);
        assert_eq!(info.valid_response_code(), None);
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(DispatchError::NoDestination.status_code(), 404);
        assert_eq!(DispatchError::ResponseStatus { status: 503 }.status_code(), 503);
        assert_eq!(
            DispatchError::RetriesExhausted { attempts: 3, last_status: Some(429) }.status_code(),
            429
        );
        assert_eq!(
            DispatchError::RetriesExhausted { attempts: 3, last_status: None }.status_code(),
            500
        );
        assert_eq!(DispatchError::Cancelled.status_code(), 500);
        assert_eq!(DispatchError::ResponseStatus { status: 42 }.status_code(), 500);
    }
}
