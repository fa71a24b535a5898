//! Broadcast store gateway
//!
//! The viewer-stats engine never talks to a database directly. It reads
//! broadcast liveness and writes viewer-count corrections through the
//! [`StoreGateway`] trait, which the hosting server implements on top of its
//! persistent store. [`MemoryStore`] is an in-process implementation for
//! tests and single-node setups.

pub mod error;
pub mod memory;

use async_trait::async_trait;

pub use error::StoreError;
pub use memory::MemoryStore;

/// Lifecycle status of a broadcast as recorded in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BroadcastStatus {
    /// Broadcast exists but has not started publishing
    Created,
    /// Broadcast is live
    Broadcasting,
    /// Broadcast has stopped
    Finished,
}

impl BroadcastStatus {
    /// Store representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastStatus::Created => "created",
            BroadcastStatus::Broadcasting => "broadcasting",
            BroadcastStatus::Finished => "finished",
        }
    }

    /// Whether viewers of this broadcast should still be counted
    pub fn is_broadcasting(&self) -> bool {
        matches!(self, BroadcastStatus::Broadcasting)
    }
}

/// Store-side view of a broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastRecord {
    /// Stream identifier
    pub stream_id: String,
    /// Current broadcast status
    pub status: BroadcastStatus,
    /// Viewer count persisted for HLS playback
    pub hls_viewer_count: i64,
}

impl BroadcastRecord {
    /// Create a record with no HLS viewers
    pub fn new(stream_id: impl Into<String>, status: BroadcastStatus) -> Self {
        Self {
            stream_id: stream_id.into(),
            status,
            hls_viewer_count: 0,
        }
    }
}

/// Access to the persistent broadcast store
///
/// Implementations must be cheap to call concurrently. The reconciliation
/// sweep wraps every call in a timeout, so an implementation may block on
/// network I/O without stalling the sweep indefinitely.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Look up a broadcast by stream id
    ///
    /// `Ok(None)` means the record does not exist.
    async fn lookup_broadcast(&self, stream_id: &str)
        -> Result<Option<BroadcastRecord>, StoreError>;

    /// Add `delta` to the broadcast's persisted HLS viewer count
    async fn apply_viewer_count_delta(&self, stream_id: &str, delta: i64)
        -> Result<(), StoreError>;
}
