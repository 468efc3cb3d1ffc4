//! Transport-ready copy of an envelope.

use bytes::Bytes;
use serde::Deserialize;

use crate::message::envelope::{Encoding, Envelope, TYPE_HEADER};
use crate::message::record::RecordHeaders;

/// Owned message handed to the dispatch engine.
///
/// Outlives the record it was copied from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedMessage {
    pub encoding: Encoding,
    pub headers: RecordHeaders,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

impl BufferedMessage {
    /// Copy an envelope, running each transformer over the copy in order.
    pub fn copy_from(envelope: &Envelope<'_>, transformers: &mut [&mut dyn MessageTransformer]) -> Self {
        let mut message = Self {
            encoding: envelope.encoding(),
            headers: envelope.headers().clone(),
            key: envelope.key().cloned(),
            value: envelope.value().cloned(),
        };
        for transformer in transformers.iter_mut() {
            transformer.transform(&mut message);
        }
        message
    }
}

/// A step applied to a message while it is being copied.
pub trait MessageTransformer {
    fn transform(&mut self, message: &mut BufferedMessage);
}

/// Records the event type of the message it transforms. Leaves the message untouched.
#[derive(Debug, Default, Clone)]
pub struct TypeExtractor {
    event_type: String,
}

impl TypeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracted type; empty when the message carried none.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn into_event_type(self) -> String {
        self.event_type
    }
}

#[derive(Deserialize)]
struct StructuredType {
    #[serde(rename = "type")]
    event_type: Option<String>,
}

impl MessageTransformer for TypeExtractor {
    fn transform(&mut self, message: &mut BufferedMessage) {
        let extracted = match message.encoding {
            Encoding::Binary => message.headers.get_str(TYPE_HEADER).map(str::to_owned),
            Encoding::Structured => message.value.as_deref().and_then(|value| {
                match serde_json::from_slice::<StructuredType>(value) {
                    Ok(parsed) => parsed.event_type,
                    Err(e) => {
                        tracing::debug!(error = %e, "Structured event body is not valid JSON");
                        None
                    }
                }
            }),
            Encoding::Unknown => None,
        };
        self.event_type = extracted.unwrap_or_default();
    }
}
