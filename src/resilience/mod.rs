//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Record handed to the handler:
//!     → isolation.rs (panic trapped at the per-message boundary)
//!     → handler runs decode / trace / dispatch / report
//!     → panic becomes a failed handle result; the partition worker lives on
//! ```
//!
//! # Design Decisions
//! - One bad record must never stall or kill partition consumption
//! - Retries and dead-lettering belong to the dispatch engine, not here

pub mod isolation;

pub use isolation::{isolate, PanicPayload};
