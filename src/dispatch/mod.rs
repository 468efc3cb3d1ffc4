//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RawRecord from a claimed partition
//!     → handler.rs (decode, trace, copy, dispatch)
//!     → engine.rs (MessageDispatcher: delivery, retries, reply, dead letter)
//!     → outcome.rs (classify result, report count and latency)
//!     → ack or failure back to the consumer loop
//!
//! Partition flow state:
//!     consumer loop → handler.set_ready → readiness.rs
//! ```
//!
//! # Design Decisions
//! - The delivery engine is a trait; this crate ships no HTTP client
//! - A handler is shared by every partition of its consumer group
//! - Subscriptions are immutable and shared via Arc

pub mod context;
pub mod engine;
pub mod handler;
pub mod outcome;
pub mod readiness;
pub mod subscription;

pub use context::DispatchContext;
pub use engine::{DispatchError, DispatchExecutionInfo, DispatchRequest, DispatchResult, MessageDispatcher};
pub use handler::{ConsumerMessageHandler, HandleError};
pub use outcome::parse_dispatch_result_and_report_metrics;
pub use readiness::ReadinessTracker;
pub use subscription::{BackoffPolicy, RetryConfig, Subscription};
