//! Configuration schema definitions.
//!
//! This module defines the configuration structure of the dispatcher.
//! All types derive Serde traits for deserialization from config files.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::engine::MessageDispatcher;
use crate::dispatch::handler::ConsumerMessageHandler;
use crate::dispatch::readiness::ReadinessTracker;
use crate::dispatch::subscription::Subscription;
use crate::observability::metrics::StatsReporter;

/// Root configuration for one channel dispatcher.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatcherConfig {
    /// The channel whose topic is consumed.
    pub channel: ChannelConfig,

    /// Subscriptions of the channel; one consumer group each.
    pub subscriptions: Vec<Subscription>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl DispatcherConfig {
    /// One handler per subscription, all sharing the same collaborators.
    pub fn build_handlers(
        &self,
        dispatcher: Arc<dyn MessageDispatcher>,
        reporter: Arc<dyn StatsReporter>,
        readiness: Arc<ReadinessTracker>,
    ) -> Vec<Arc<ConsumerMessageHandler>> {
        self.subscriptions
            .iter()
            .map(|subscription| {
                Arc::new(ConsumerMessageHandler::new(
                    Arc::new(subscription.clone()),
                    self.channel.consumer_group(subscription.uid),
                    self.channel.namespace.as_str(),
                    dispatcher.clone(),
                    reporter.clone(),
                    readiness.clone(),
                ))
            })
            .collect()
    }
}

/// Channel identity and backing topic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Namespace of the channel; used as a metric label.
    pub namespace: String,

    /// Channel name.
    pub name: String,

    /// Broker topic backing the channel.
    pub topic: String,

    /// Prefix of every consumer group name.
    pub consumer_group_prefix: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            name: String::new(),
            topic: String::new(),
            consumer_group_prefix: "kafka".to_string(),
        }
    }
}

impl ChannelConfig {
    /// `<prefix>.<namespace>.<name>.<uid>`
    pub fn consumer_group(&self, subscription: Uuid) -> String {
        format!(
            "{}.{}.{}.{}",
            self.consumer_group_prefix, self.namespace, self.name, subscription
        )
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
