//! Structured event envelope over a raw record.
//!
//! # Responsibilities
//! - Classify the record encoding (structured, binary, unknown)
//! - Expose a read-only view of headers and payload
//! - Release the view once its bytes have been copied downstream
//!
//! # Design Decisions
//! - The envelope borrows the record; it never owns payload storage
//! - Structured mode is keyed on the `content-type` header, binary mode on a
//!   known `ce_specversion` header
//! - `finish` is idempotent and also runs on drop

use bytes::Bytes;

use crate::message::record::{RawRecord, RecordHeaders};

/// Header carrying the record content type.
pub const CONTENT_TYPE_HEADER: &str = "content-type";

/// Content type of a structured-mode JSON event.
pub const STRUCTURED_JSON_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Binary-mode spec version header.
pub const SPEC_VERSION_HEADER: &str = "ce_specversion";

/// Binary-mode event type header.
pub const TYPE_HEADER: &str = "ce_type";

const KNOWN_SPEC_VERSIONS: [&str; 2] = ["1.0", "0.3"];

/// How an event is laid out inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// The whole event (attributes and data) is the record value.
    Structured,
    /// Attributes travel as `ce_` headers, data is the record value.
    Binary,
    /// Not an event this channel can interpret.
    Unknown,
}

impl Encoding {
    /// Classify a header set.
    pub fn detect(headers: &RecordHeaders) -> Self {
        if let Some(content_type) = headers.get_ignore_case(CONTENT_TYPE_HEADER) {
            if is_structured_content_type(content_type) {
                return Encoding::Structured;
            }
        }

        match headers.get_str(SPEC_VERSION_HEADER) {
            Some(version) if KNOWN_SPEC_VERSIONS.contains(&version.trim()) => Encoding::Binary,
            _ => Encoding::Unknown,
        }
    }
}

fn is_structured_content_type(value: &[u8]) -> bool {
    let Ok(value) = std::str::from_utf8(value) else {
        return false;
    };
    let media_type = value.split(';').next().unwrap_or_default().trim();
    media_type.eq_ignore_ascii_case(STRUCTURED_JSON_CONTENT_TYPE)
}

/// Read-only event view over a [`RawRecord`].
#[derive(Debug)]
pub struct Envelope<'a> {
    record: &'a RawRecord,
    encoding: Encoding,
    finished: bool,
}

impl<'a> Envelope<'a> {
    /// Wrap a record and compute its encoding.
    pub fn from_record(record: &'a RawRecord) -> Self {
        Self {
            record,
            encoding: Encoding::detect(&record.headers),
            finished: false,
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn headers(&self) -> &'a RecordHeaders {
        &self.record.headers
    }

    pub fn key(&self) -> Option<&'a Bytes> {
        self.record.key.as_ref()
    }

    pub fn value(&self) -> Option<&'a Bytes> {
        self.record.value.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Release the view. Calling it again is a no-op.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        tracing::trace!(
            topic = %self.record.topic,
            partition = self.record.partition,
            offset = self.record.offset,
            "Envelope released"
        );
    }
}

impl Drop for Envelope<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
