//! Consumer group contract.
//!
//! # Data Flow
//! ```text
//! Consumer group runtime (assignment, rebalancing, offset commit)
//!     → claim.rs (one sequential loop per claimed partition)
//!     → ConsumerHandler::handle (one record at a time)
//!     → ack: session marks the offset; failure: readiness drops
//! ```
//!
//! # Design Decisions
//! - The runtime itself is external; this module only fixes the contract
//! - Records of one partition are never handled concurrently

pub mod claim;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::dispatch::handler::HandleError;
use crate::message::RawRecord;

pub use claim::{consume_claim, ClaimSummary, ConsumerSession};

/// Callbacks the consumer group runtime drives.
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    /// Group this handler consumes as.
    fn consumer_group(&self) -> &str;

    /// Handle one record. `Ok` means the record may be marked as consumed.
    async fn handle(&self, cx: &CancellationToken, record: &RawRecord) -> Result<(), HandleError>;

    /// Report whether `partition` is currently flowing.
    fn set_ready(&self, partition: i32, ready: bool);
}
