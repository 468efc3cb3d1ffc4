//! Subscriptions and their delivery settings.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// How the dispatch engine spaces out retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffPolicy {
    Linear,
    #[default]
    Exponential,
}

/// Retry configuration handed verbatim to the dispatch engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub retry_max: u32,

    /// Backoff policy between attempts.
    pub backoff_policy: BackoffPolicy,

    /// Base backoff delay in milliseconds.
    pub backoff_delay_ms: u64,

    /// Per-attempt timeout in milliseconds (none = engine default).
    pub timeout_ms: Option<u64>,
}

impl RetryConfig {
    pub fn backoff_delay(&self) -> Duration {
        Duration::from_millis(self.backoff_delay_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_max: 3,
            backoff_policy: BackoffPolicy::Exponential,
            backoff_delay_ms: 200,
            timeout_ms: None,
        }
    }
}

/// A subscriber of the channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Subscription {
    /// Unique subscription identity.
    pub uid: Uuid,

    /// Where events are delivered.
    #[serde(default)]
    pub subscriber: Option<Url>,

    /// Where the subscriber's response event is forwarded.
    #[serde(default)]
    pub reply: Option<Url>,

    /// Where undeliverable events end up.
    #[serde(default)]
    pub dead_letter: Option<Url>,

    /// Retry settings; none means a single attempt.
    #[serde(default)]
    pub retry_config: Option<RetryConfig>,
}

impl Subscription {
    pub fn new(uid: Uuid) -> Self {
        Self {
            uid,
            subscriber: None,
            reply: None,
            dead_letter: None,
            retry_config: None,
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uid)?;
        if let Some(subscriber) = &self.subscriber {
            write!(f, " subscriber={}", subscriber)?;
        }
        if let Some(reply) = &self.reply {
            write!(f, " reply={}", reply)?;
        }
        if let Some(dead_letter) = &self.dead_letter {
            write!(f, " deadLetter={}", dead_letter)?;
        }
        Ok(())
    }
}
