//! Panic isolation for per-message work.
//!
//! # Responsibilities
//! - Run a future so that a panic inside it becomes an ordinary value
//! - Render the panic payload for logging
//!
//! # Design Decisions
//! - The panicking future is dropped before `isolate` returns, so guards it
//!   owns (spans, envelopes, buffers) are released on the failure path too
//! - Only unwinding panics are caught; `panic = "abort"` builds cannot recover

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

/// Rendered payload of a caught panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicPayload(pub String);

impl PanicPayload {
    fn from_any(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self(message)
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Drive `fut` to completion, converting a panic into `Err`.
pub async fn isolate<F>(fut: F) -> Result<F::Output, PanicPayload>
where
    F: Future,
{
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(PanicPayload::from_any)
}
