//! Message subsystem.
//!
//! # Data Flow
//! ```text
//! RawRecord (from the consumer group runtime)
//!     → envelope.rs (encoding classification, read-only view)
//!     → buffered.rs (owned copy + type extraction)
//!     → handed to the dispatch engine
//! ```
//!
//! # Design Decisions
//! - Records are immutable; every later stage reads or copies
//! - The envelope is released as soon as its bytes are copied

pub mod buffered;
pub mod envelope;
pub mod record;

pub use buffered::{BufferedMessage, MessageTransformer, TypeExtractor};
pub use envelope::{Encoding, Envelope};
pub use record::{RawRecord, RecordHeader, RecordHeaders};
