//! Raw broker records as handed over by the consumer group runtime.

use bytes::Bytes;

/// A single record header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub key: String,
    pub value: Bytes,
}

impl RecordHeader {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered header set of a record.
///
/// Keys may repeat across unrelated namespaces; lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordHeaders(Vec<RecordHeader>);

impl RecordHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping insertion order.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.0.push(RecordHeader::new(key, value));
    }

    /// First value stored under `key` (exact match).
    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.0.iter().find(|h| h.key == key).map(|h| &h.value)
    }

    /// First value stored under `key`, compared ASCII case-insensitively.
    pub fn get_ignore_case(&self, key: &str) -> Option<&Bytes> {
        self.0
            .iter()
            .find(|h| h.key.eq_ignore_ascii_case(key))
            .map(|h| &h.value)
    }

    /// First value under `key` decoded as UTF-8.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordHeader> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<RecordHeader>> for RecordHeaders {
    fn from(headers: Vec<RecordHeader>) -> Self {
        Self(headers)
    }
}

impl FromIterator<RecordHeader> for RecordHeaders {
    fn from_iter<I: IntoIterator<Item = RecordHeader>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<RecordHeader> for RecordHeaders {
    fn extend<I: IntoIterator<Item = RecordHeader>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl<'a> IntoIterator for &'a RecordHeaders {
    type Item = &'a RecordHeader;
    type IntoIter = std::slice::Iter<'a, RecordHeader>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An immutable record fetched from a topic partition.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub topic: String,
    pub partition: i32,
    /// Monotonic within a partition.
    pub offset: i64,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    pub headers: RecordHeaders,
}

impl RawRecord {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.headers.push(key, value);
        self
    }
}
