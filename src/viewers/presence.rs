//! Presence registry
//!
//! Concurrent table of which sessions are watching which stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use super::entry::StreamPresence;

/// Per-stream presence sets
///
/// The outer map is only write-locked to create or purge a stream. Viewer
/// updates take the outer lock for read and the stream's own lock for write,
/// so registrations on different streams never contend with each other.
#[derive(Default)]
pub struct PresenceRegistry {
    streams: RwLock<HashMap<String, Arc<RwLock<StreamPresence>>>>,
}

impl PresenceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request from `session_id` on `stream_id`
    ///
    /// Returns `true` if the session is new for the stream. Empty ids are
    /// ignored and return `false`.
    pub async fn register(&self, stream_id: &str, session_id: &str) -> bool {
        if stream_id.is_empty() || session_id.is_empty() {
            tracing::trace!(
                stream = stream_id,
                session = session_id,
                "Ignoring viewer with empty id"
            );
            return false;
        }

        let now = Instant::now();

        {
            let streams = self.streams.read().await;
            if let Some(entry_arc) = streams.get(stream_id) {
                return entry_arc.write().await.touch(session_id, now);
            }
        }

        // Slow path: the stream may have been created since the read lock
        // was released, so go through the entry API.
        let mut streams = self.streams.write().await;
        let entry_arc = streams
            .entry(stream_id.to_owned())
            .or_insert_with(|| {
                tracing::debug!(stream = stream_id, "Tracking viewers for new stream");
                Arc::new(RwLock::new(StreamPresence::new(now)))
            })
            .clone();
        let mut entry = entry_arc.write().await;
        entry.touch(session_id, now)
    }

    /// Number of sessions watching `stream_id`, 0 if untracked
    pub async fn current_viewer_count(&self, stream_id: &str) -> usize {
        let streams = self.streams.read().await;

        match streams.get(stream_id) {
            Some(entry_arc) => entry_arc.read().await.viewer_count(),
            None => 0,
        }
    }

    /// Number of sessions watching any stream
    ///
    /// Not atomic with respect to concurrent registrations.
    pub async fn total_viewer_count(&self) -> usize {
        let entries: Vec<_> = self.streams.read().await.values().cloned().collect();

        let mut total = 0;
        for entry_arc in entries {
            total += entry_arc.read().await.viewer_count();
        }
        total
    }

    /// Point-in-time copy of the tracked stream ids
    pub async fn snapshot_stream_ids(&self) -> Vec<String> {
        self.streams.read().await.keys().cloned().collect()
    }

    /// Remove sessions of `stream_id` not seen for longer than `timeout`
    ///
    /// Returns the number of sessions removed.
    pub async fn evict_stale_and_count(
        &self,
        stream_id: &str,
        now: Instant,
        timeout: Duration,
    ) -> usize {
        let entry_arc = match self.streams.read().await.get(stream_id) {
            Some(entry_arc) => Arc::clone(entry_arc),
            None => return 0,
        };

        let mut entry = entry_arc.write().await;
        let removed = entry.evict_stale(now, timeout);

        if removed > 0 {
            tracing::debug!(
                stream = stream_id,
                evicted = removed,
                remaining = entry.viewer_count(),
                "Evicted stale viewers"
            );
        }

        removed
    }

    /// Drop all presence state for `stream_id`
    ///
    /// Returns `false` if the stream was not tracked.
    pub async fn purge(&self, stream_id: &str) -> bool {
        let removed = self.streams.write().await.remove(stream_id);

        match removed {
            Some(entry_arc) => {
                let entry = entry_arc.read().await;
                tracing::debug!(
                    stream = stream_id,
                    viewers = entry.viewer_count(),
                    tracked_secs = entry.age(Instant::now()).as_secs(),
                    "Purged stream presence"
                );
                true
            }
            None => false,
        }
    }

    /// Number of tracked streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Whether `stream_id` is tracked
    pub async fn contains_stream(&self, stream_id: &str) -> bool {
        self.streams.read().await.contains_key(stream_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_counts_distinct_sessions() {
        let registry = PresenceRegistry::new();

        assert!(registry.register("s1", "a").await);
        assert!(registry.register("s1", "b").await);
        assert!(!registry.register("s1", "a").await);

        assert_eq!(registry.current_viewer_count("s1").await, 2);
        assert_eq!(registry.stream_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_ids() {
        let registry = PresenceRegistry::new();

        assert!(!registry.register("", "a").await);
        assert!(!registry.register("s1", "").await);

        assert_eq!(registry.stream_count().await, 0);
        assert!(!registry.contains_stream("s1").await);
    }

    #[tokio::test]
    async fn test_session_scoped_to_stream() {
        let registry = PresenceRegistry::new();

        assert!(registry.register("s1", "a").await);
        assert!(registry.register("s2", "a").await);

        assert_eq!(registry.current_viewer_count("s1").await, 1);
        assert_eq!(registry.current_viewer_count("s2").await, 1);
        assert_eq!(registry.total_viewer_count().await, 2);
    }

    #[tokio::test]
    async fn test_untracked_stream_counts_zero() {
        let registry = PresenceRegistry::new();
        assert_eq!(registry.current_viewer_count("nope").await, 0);
        assert_eq!(registry.total_viewer_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_stale_and_count() {
        let registry = PresenceRegistry::new();
        let timeout = Duration::from_secs(20);

        registry.register("s1", "a").await;
        tokio::time::advance(Duration::from_secs(15)).await;
        registry.register("s1", "b").await;
        tokio::time::advance(Duration::from_secs(10)).await;

        let removed = registry
            .evict_stale_and_count("s1", Instant::now(), timeout)
            .await;

        assert_eq!(removed, 1);
        assert_eq!(registry.current_viewer_count("s1").await, 1);
        // Emptied streams stay tracked until purged
        assert!(registry.contains_stream("s1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregistration_keeps_viewer_fresh() {
        let registry = PresenceRegistry::new();
        let timeout = Duration::from_secs(20);

        registry.register("s1", "a").await;
        tokio::time::advance(Duration::from_secs(15)).await;
        registry.register("s1", "a").await;
        tokio::time::advance(Duration::from_secs(15)).await;

        let removed = registry
            .evict_stale_and_count("s1", Instant::now(), timeout)
            .await;
        assert_eq!(removed, 0);
        assert_eq!(registry.current_viewer_count("s1").await, 1);
    }

    #[tokio::test]
    async fn test_evict_unknown_stream() {
        let registry = PresenceRegistry::new();
        let removed = registry
            .evict_stale_and_count("nope", Instant::now(), Duration::ZERO)
            .await;
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn test_purge_is_idempotent() {
        let registry = PresenceRegistry::new();
        registry.register("s1", "a").await;

        assert!(registry.purge("s1").await);
        assert!(!registry.purge("s1").await);
        assert_eq!(registry.current_viewer_count("s1").await, 0);
        assert!(registry.snapshot_stream_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_stream_ids() {
        let registry = PresenceRegistry::new();
        registry.register("s1", "a").await;
        registry.register("s2", "a").await;

        let mut ids = registry.snapshot_stream_ids().await;
        ids.sort();
        assert_eq!(ids, vec!["s1".to_string(), "s2".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration() {
        let registry = Arc::new(PresenceRegistry::new());
        let mut handles = Vec::new();

        for task in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let mut new_sessions = 0;
                for i in 0..100 {
                    let stream = format!("s{}", i % 4);
                    // Every session is registered by two tasks
                    let session = format!("v{}-{}", task / 2, i);
                    if registry.register(&stream, &session).await {
                        new_sessions += 1;
                    }
                }
                new_sessions
            }));
        }

        let mut new_total = 0;
        for handle in handles {
            new_total += handle.await.unwrap();
        }

        assert_eq!(new_total, 400);
        assert_eq!(registry.total_viewer_count().await, 400);
        assert_eq!(registry.stream_count().await, 4);
    }
}
