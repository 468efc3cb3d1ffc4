//! Channel dispatcher library.
//!
//! Consumes events from the broker topic backing a channel and delivers each
//! one to a subscription, carrying the producer's trace across the broker.

pub mod config;
pub mod consumer;
pub mod dispatch;
pub mod message;
pub mod observability;
pub mod resilience;

pub use config::schema::DispatcherConfig;
pub use consumer::{consume_claim, ConsumerHandler, ConsumerSession};
pub use dispatch::{ConsumerMessageHandler, HandleError, MessageDispatcher, ReadinessTracker};
pub use message::RawRecord;
