//! Daily event counters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use super::{DeviceType, EventError, EventType};

/// Identity of one daily counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventBucket {
    /// Region (or raw token) the event is attributed to.
    pub source: String,
    pub identifier: EventType,
    pub device_type: DeviceType,
    pub date: NaiveDate,
}

/// Persistence of event counters.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Add `count` to `bucket`, creating it at zero first if absent.
    /// Returns the bucket's new total.
    async fn add(&self, bucket: EventBucket, count: u32) -> Result<u64, EventError>;
}

/// In-process [`EventStore`]. Clones share the same counters.
#[derive(Clone, Debug, Default)]
pub struct MemoryEventStore {
    counts: Arc<Mutex<HashMap<EventBucket, u64>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current total of `bucket`, zero if it was never written.
    #[cfg(test)]
    pub async fn total(&self, bucket: &EventBucket) -> u64 {
        self.counts.lock().await.get(bucket).copied().unwrap_or(0)
    }

    /// Number of distinct buckets.
    #[cfg(test)]
    pub async fn buckets(&self) -> usize {
        self.counts.lock().await.len()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn add(&self, bucket: EventBucket, count: u32) -> Result<u64, EventError> {
        let mut counts = self.counts.lock().await;
        let total = counts.entry(bucket).or_insert(0);
        *total = total.saturating_add(u64::from(count));
        Ok(*total)
    }
}
