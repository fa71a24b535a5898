//! HLS viewer statistics for live media servers
//!
//! Tracks which sessions are watching each broadcast, exposes live viewer
//! counts, and periodically pushes viewer-count corrections to a persistent
//! store while cleaning up streams that ended.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hls_viewers::store::MemoryStore;
//! use hls_viewers::{HlsViewerStats, ViewerStatsConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let store = Arc::new(MemoryStore::new());
//! let config = ViewerStatsConfig::default().with_hls_segment_time(Some("2"));
//! let stats = Arc::new(HlsViewerStats::new(store, config));
//!
//! let shutdown = CancellationToken::new();
//! let task = stats.spawn_reconcile_task(shutdown.clone());
//!
//! stats.register_viewer("stream1", "session-a").await;
//! assert_eq!(stats.current_viewer_count("stream1").await, 1);
//!
//! shutdown.cancel();
//! let _ = task.await;
//! # }
//! ```

pub mod store;
pub mod viewers;

pub use store::{BroadcastRecord, BroadcastStatus, StoreError, StoreGateway};
pub use viewers::{HlsViewerStats, Liveness, ReconcileReport, ViewerStatsConfig};
