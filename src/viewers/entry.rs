//! Per-stream presence state
//!
//! This module defines the set of sessions watching a single stream.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Sessions currently watching one stream, keyed by session id
#[derive(Debug)]
pub struct StreamPresence {
    /// Session id to the last time a request from it was seen
    viewers: HashMap<String, Instant>,

    /// When the stream was first registered
    created_at: Instant,
}

impl StreamPresence {
    /// Create an empty presence set
    pub(super) fn new(now: Instant) -> Self {
        Self {
            viewers: HashMap::new(),
            created_at: now,
        }
    }

    /// Record a request from `session_id`
    ///
    /// Returns `true` if the session was not present before.
    pub(super) fn touch(&mut self, session_id: &str, now: Instant) -> bool {
        match self.viewers.get_mut(session_id) {
            Some(last_seen) => {
                *last_seen = now;
                false
            }
            None => {
                self.viewers.insert(session_id.to_owned(), now);
                true
            }
        }
    }

    /// Remove sessions not seen for longer than `timeout`
    ///
    /// Returns the number of sessions removed.
    pub(super) fn evict_stale(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.viewers.len();
        self.viewers
            .retain(|_, last_seen| now.saturating_duration_since(*last_seen) <= timeout);
        before - self.viewers.len()
    }

    /// Number of sessions currently watching
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Last time `session_id` was seen
    pub fn last_seen(&self, session_id: &str) -> Option<Instant> {
        self.viewers.get(session_id).copied()
    }

    /// How long the stream has been tracked
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_touch_reports_new_sessions_once() {
        let now = Instant::now();
        let mut presence = StreamPresence::new(now);

        assert!(presence.touch("a", now));
        assert!(!presence.touch("a", now));
        assert!(presence.touch("b", now));
        assert_eq!(presence.viewer_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_refreshes_last_seen() {
        let start = Instant::now();
        let mut presence = StreamPresence::new(start);
        presence.touch("a", start);

        let later = start + Duration::from_secs(5);
        presence.touch("a", later);

        assert_eq!(presence.last_seen("a"), Some(later));
        assert_eq!(presence.age(later), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_stale_uses_strict_timeout() {
        let start = Instant::now();
        let timeout = Duration::from_secs(20);
        let mut presence = StreamPresence::new(start);
        presence.touch("old", start);
        presence.touch("fresh", start + Duration::from_secs(15));

        // Exactly at the timeout the session still counts
        assert_eq!(presence.evict_stale(start + timeout, timeout), 0);

        let removed = presence.evict_stale(start + timeout + Duration::from_millis(1), timeout);
        assert_eq!(removed, 1);
        assert_eq!(presence.viewer_count(), 1);
        assert!(presence.last_seen("old").is_none());
    }
}
