//! HLS viewer statistics facade
//!
//! Entry point used by the HTTP layer: every qualifying segment or playlist
//! request calls [`HlsViewerStats::register_viewer`], and the server reads
//! counts back through the query methods.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::store::StoreGateway;

use super::config::ViewerStatsConfig;
use super::ledger::PendingDeltaLedger;
use super::presence::PresenceRegistry;

/// Viewer presence tracking and store reconciliation for HLS streams
pub struct HlsViewerStats {
    pub(super) presence: PresenceRegistry,
    pub(super) ledger: PendingDeltaLedger,
    pub(super) store: Arc<dyn StoreGateway>,
    pub(super) config: ViewerStatsConfig,

    /// Shared by registrations, exclusive for purges: a presence insert and
    /// its ledger increment are never split by a purge of the stream.
    pub(super) lifecycle: RwLock<()>,

    /// Held for the whole of a reconciliation tick
    pub(super) tick_lock: Mutex<()>,

    /// Cancels the running reconciliation task when a new one is spawned
    pub(super) task_token: std::sync::Mutex<Option<CancellationToken>>,
}

impl HlsViewerStats {
    /// Create the engine with a resolved store gateway and configuration
    pub fn new(store: Arc<dyn StoreGateway>, config: ViewerStatsConfig) -> Self {
        Self {
            presence: PresenceRegistry::new(),
            ledger: PendingDeltaLedger::new(),
            store,
            config,
            lifecycle: RwLock::new(()),
            tick_lock: Mutex::new(()),
            task_token: std::sync::Mutex::new(None),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ViewerStatsConfig {
        &self.config
    }

    /// Record that `session_id` requested content of `stream_id`
    ///
    /// Empty ids are ignored. Only the first request of a session counts
    /// towards the next store correction.
    pub async fn register_viewer(&self, stream_id: &str, session_id: &str) {
        let _lifecycle = self.lifecycle.read().await;

        if self.presence.register(stream_id, session_id).await {
            self.ledger.increment(stream_id).await;

            tracing::trace!(
                stream = stream_id,
                session = session_id,
                "New HLS viewer"
            );
        }
    }

    /// Number of sessions currently watching `stream_id`
    pub async fn current_viewer_count(&self, stream_id: &str) -> usize {
        self.presence.current_viewer_count(stream_id).await
    }

    /// Number of sessions currently watching any stream
    pub async fn total_viewer_count(&self) -> usize {
        self.presence.total_viewer_count().await
    }

    /// New sessions on `stream_id` not yet pushed to the store
    pub async fn pending_increments(&self, stream_id: &str) -> u64 {
        self.ledger.pending(stream_id).await
    }

    /// Immediately forget every viewer of `stream_id`
    ///
    /// Safe to call repeatedly and on untracked streams.
    pub async fn reset_presence(&self, stream_id: &str) {
        if self.purge_stream(stream_id).await {
            tracing::info!(stream = stream_id, "HLS viewers reset");
        } else {
            tracing::info!(stream = stream_id, "HLS viewer reset on untracked stream");
        }
    }

    /// Drop presence and pending increments of `stream_id` in one step
    ///
    /// Returns `false` if the stream was not tracked.
    pub(super) async fn purge_stream(&self, stream_id: &str) -> bool {
        let _lifecycle = self.lifecycle.write().await;

        let removed = self.presence.purge(stream_id).await;
        self.ledger.purge(stream_id).await;
        removed
    }
}
