//! Pending viewer increments per stream

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

/// Count of new sessions per stream since the last reconciliation tick
#[derive(Default)]
pub struct PendingDeltaLedger {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl PendingDeltaLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one new session to `stream_id`
    pub async fn increment(&self, stream_id: &str) {
        if let Some(counter) = self.counters.read().await.get(stream_id) {
            counter.fetch_add(1, Ordering::AcqRel);
            return;
        }

        self.counters
            .write()
            .await
            .entry(stream_id.to_owned())
            .or_default()
            .fetch_add(1, Ordering::AcqRel);
    }

    /// Read the pending count for `stream_id` and reset it to zero
    ///
    /// Must be called once per stream per tick; increments consumed here are
    /// gone for good.
    pub async fn take_and_reset(&self, stream_id: &str) -> u64 {
        match self.counters.read().await.get(stream_id) {
            Some(counter) => counter.swap(0, Ordering::AcqRel),
            None => 0,
        }
    }

    /// Pending count for `stream_id` without consuming it
    pub async fn pending(&self, stream_id: &str) -> u64 {
        match self.counters.read().await.get(stream_id) {
            Some(counter) => counter.load(Ordering::Acquire),
            None => 0,
        }
    }

    /// Drop the counter for `stream_id`
    pub async fn purge(&self, stream_id: &str) {
        self.counters.write().await.remove(stream_id);
    }
}
