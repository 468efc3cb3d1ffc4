//! Per-(subscription, partition) readiness table.
//!
//! # Responsibilities
//! - Record whether a partition of a subscription is currently flowing
//! - Answer readiness queries from traffic shaping
//!
//! # Design Decisions
//! - One table per dispatcher, shared via `Arc`; no global state
//! - DashMap sharding gives per-entry locking for concurrent partition workers

use dashmap::DashMap;
use uuid::Uuid;

/// Concurrent readiness table keyed by subscription and partition.
#[derive(Debug, Default)]
pub struct ReadinessTracker {
    partitions: DashMap<(Uuid, i32), bool>,
}

impl ReadinessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, subscription: Uuid, partition: i32, ready: bool) {
        let previous = self.partitions.insert((subscription, partition), ready);
        if previous != Some(ready) {
            tracing::debug!(
                subscription = %subscription,
                partition,
                ready,
                "Partition readiness changed"
            );
        }
    }

    /// False for partitions never reported.
    pub fn is_ready(&self, subscription: Uuid, partition: i32) -> bool {
        self.partitions
            .get(&(subscription, partition))
            .map(|r| *r.value())
            .unwrap_or(false)
    }

    /// True when the subscription has at least one partition and all are ready.
    pub fn is_subscription_ready(&self, subscription: Uuid) -> bool {
        let mut seen = false;
        for entry in self.partitions.iter() {
            if entry.key().0 == subscription {
                seen = true;
                if !*entry.value() {
                    return false;
                }
            }
        }
        seen
    }

    /// Sorted `(partition, ready)` pairs of a subscription.
    pub fn partitions(&self, subscription: Uuid) -> Vec<(i32, bool)> {
        let mut partitions: Vec<(i32, bool)> = self
            .partitions
            .iter()
            .filter(|entry| entry.key().0 == subscription)
            .map(|entry| (entry.key().1, *entry.value()))
            .collect();
        partitions.sort_unstable();
        partitions
    }

    /// Forget a subscription, e.g. after it was deleted.
    pub fn remove_subscription(&self, subscription: Uuid) {
        self.partitions.retain(|key, _| key.0 != subscription);
    }
}
