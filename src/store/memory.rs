//! In-memory broadcast store

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::StoreError;
use super::{BroadcastRecord, BroadcastStatus, StoreGateway};

/// Broadcast store backed by a `HashMap`
///
/// Failures can be injected with [`MemoryStore::fail_lookups`] and
/// [`MemoryStore::fail_updates`] to exercise the sweep's error paths.
#[derive(Default)]
pub struct MemoryStore {
    broadcasts: RwLock<HashMap<String, BroadcastRecord>>,
    fail_lookups: AtomicBool,
    fail_updates: AtomicBool,
    lookups: AtomicU64,
    updates: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a broadcast record
    pub async fn upsert(&self, record: BroadcastRecord) {
        self.broadcasts
            .write()
            .await
            .insert(record.stream_id.clone(), record);
    }

    /// Create a live broadcast with no viewers
    pub async fn start_broadcast(&self, stream_id: &str) {
        self.upsert(BroadcastRecord::new(stream_id, BroadcastStatus::Broadcasting))
            .await;
    }

    /// Change the status of an existing broadcast
    ///
    /// Returns `false` if the broadcast does not exist.
    pub async fn set_status(&self, stream_id: &str, status: BroadcastStatus) -> bool {
        match self.broadcasts.write().await.get_mut(stream_id) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    /// Delete a broadcast record
    pub async fn remove(&self, stream_id: &str) -> Option<BroadcastRecord> {
        self.broadcasts.write().await.remove(stream_id)
    }

    /// Get a copy of a broadcast record
    pub async fn get(&self, stream_id: &str) -> Option<BroadcastRecord> {
        self.broadcasts.read().await.get(stream_id).cloned()
    }

    /// Persisted HLS viewer count, 0 for unknown broadcasts
    pub async fn hls_viewer_count(&self, stream_id: &str) -> i64 {
        self.get(stream_id)
            .await
            .map(|record| record.hls_viewer_count)
            .unwrap_or(0)
    }

    /// Make every lookup fail until reset
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::Relaxed);
    }

    /// Make every viewer-count update fail until reset
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::Relaxed);
    }

    /// Number of lookups served (including failed ones)
    pub fn lookup_calls(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of viewer-count updates attempted (including failed ones)
    pub fn update_calls(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StoreGateway for MemoryStore {
    async fn lookup_broadcast(
        &self,
        stream_id: &str,
    ) -> Result<Option<BroadcastRecord>, StoreError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        if self.fail_lookups.load(Ordering::Relaxed) {
            return Err(StoreError::NotAvailable("lookups disabled".into()));
        }

        Ok(self.get(stream_id).await)
    }

    async fn apply_viewer_count_delta(&self, stream_id: &str, delta: i64) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::Relaxed);

        if self.fail_updates.load(Ordering::Relaxed) {
            return Err(StoreError::NotAvailable("updates disabled".into()));
        }

        let mut broadcasts = self.broadcasts.write().await;
        let record = broadcasts
            .get_mut(stream_id)
            .ok_or_else(|| StoreError::Backend(format!("broadcast not found: {}", stream_id)))?;
        record.hls_viewer_count += delta;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_missing_is_none() {
        let store = MemoryStore::new();
        let result = store.lookup_broadcast("nope").await.unwrap();
        assert!(result.is_none());
        assert_eq!(store.lookup_calls(), 1);
    }

    #[tokio::test]
    async fn test_apply_delta_accumulates() {
        let store = MemoryStore::new();
        store.start_broadcast("s1").await;

        store.apply_viewer_count_delta("s1", 3).await.unwrap();
        store.apply_viewer_count_delta("s1", -1).await.unwrap();

        assert_eq!(store.hls_viewer_count("s1").await, 2);
        assert_eq!(store.update_calls(), 2);
    }

    #[tokio::test]
    async fn test_apply_delta_to_missing_broadcast_fails() {
        let store = MemoryStore::new();
        let result = store.apply_viewer_count_delta("gone", 1).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        store.start_broadcast("s1").await;

        store.fail_lookups(true);
        assert!(store.lookup_broadcast("s1").await.is_err());
        store.fail_lookups(false);
        assert!(store.lookup_broadcast("s1").await.unwrap().is_some());

        store.fail_updates(true);
        assert!(store.apply_viewer_count_delta("s1", 1).await.is_err());
        assert_eq!(store.hls_viewer_count("s1").await, 0);
    }

    #[tokio::test]
    async fn test_set_status() {
        let store = MemoryStore::new();
        assert!(!store.set_status("s1", BroadcastStatus::Finished).await);

        store.start_broadcast("s1").await;
        assert!(store.set_status("s1", BroadcastStatus::Finished).await);

        let record = store.get("s1").await.unwrap();
        assert_eq!(record.status, BroadcastStatus::Finished);
    }
}
