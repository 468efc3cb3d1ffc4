//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every subscription has somewhere to deliver to
//! - Validate value ranges and address formats
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DispatcherConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::schema::DispatcherConfig;

/// Upper bound on configured retries per subscription.
pub const MAX_RETRIES: u32 = 100;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("channel.{0} must not be empty")]
    EmptyChannelField(&'static str),

    #[error("subscription {0} is declared more than once")]
    DuplicateSubscription(Uuid),

    #[error("subscription {0} has neither a subscriber nor a reply")]
    NoDestination(Uuid),

    #[error("subscription {uid}: {field} must be http or https, got {url}")]
    UnsupportedScheme {
        uid: Uuid,
        field: &'static str,
        url: Url,
    },

    #[error("subscription {uid}: retry_max {retry_max} exceeds {max}", max = MAX_RETRIES)]
    TooManyRetries { uid: Uuid, retry_max: u32 },

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &DispatcherConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let channel = &config.channel;
    for (field, value) in [
        ("namespace", &channel.namespace),
        ("name", &channel.name),
        ("topic", &channel.topic),
    ] {
        if value.trim().is_empty() {
            errors.push(ValidationError::EmptyChannelField(field));
        }
    }

    let mut seen = HashSet::new();
    for sub in &config.subscriptions {
        if !seen.insert(sub.uid) {
            errors.push(ValidationError::DuplicateSubscription(sub.uid));
        }

        if sub.subscriber.is_none() && sub.reply.is_none() {
            errors.push(ValidationError::NoDestination(sub.uid));
        }

        for (field, url) in [
            ("subscriber", &sub.subscriber),
            ("reply", &sub.reply),
            ("dead_letter", &sub.dead_letter),
        ] {
            if let Some(url) = url {
                if !matches!(url.scheme(), "http" | "https") {
                    errors.push(ValidationError::UnsupportedScheme {
                        uid: sub.uid,
                        field,
                        url: url.clone(),
                    });
                }
            }
        }

        if let Some(retry) = &sub.retry_config {
            if retry.retry_max > MAX_RETRIES {
                errors.push(ValidationError::TooManyRetries {
                    uid: sub.uid,
                    retry_max: retry.retry_max,
                });
            }
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
