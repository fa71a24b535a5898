//! HLS viewer presence and reconciliation
//!
//! HLS players never hold a connection open, so a viewer is inferred from
//! repeated segment and playlist requests. The engine records the last
//! request time of every session per stream and periodically turns the
//! changes into viewer-count corrections for the broadcast store.
//!
//! # Architecture
//!
//! ```text
//!        request tasks                          Arc<HlsViewerStats>
//!   register_viewer(stream, session)   ┌────────────────────────────────┐
//!               │                      │ presence: PresenceRegistry     │
//!               ├─────────────────────►│   stream -> { session -> seen }│
//!               │  (new session only)  │ ledger: PendingDeltaLedger     │
//!               └─────────────────────►│   stream -> new sessions       │
//!                                      └───────────────┬────────────────┘
//!                                                      │ every interval
//!                                                      ▼
//!                                          reconcile(): per stream
//!                                          evict stale -> take pending
//!                                          -> lookup_broadcast()
//!                                    ┌─────────────────┴────────────────┐
//!                                    ▼                                  ▼
//!                             Active: apply delta            Ended / Zombie: purge
//! ```
//!
//! # Consistency
//!
//! Counts are best effort. A failed or timed-out store call drops that
//! tick's correction instead of retrying it, and all state is lost on
//! restart.

pub mod config;
pub mod entry;
pub mod ledger;
pub mod presence;
pub mod reconcile;
pub mod stats;

pub use config::ViewerStatsConfig;
pub use entry::StreamPresence;
pub use ledger::PendingDeltaLedger;
pub use presence::PresenceRegistry;
pub use reconcile::{Liveness, ReconcileReport};
pub use stats::HlsViewerStats;
