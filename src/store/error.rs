//! Store error types
//!
//! Errors surfaced by a [`StoreGateway`](super::StoreGateway). All of them are
//! treated as transient by the reconciliation sweep.

use std::time::Duration;

use thiserror::Error;

/// Error type for store gateway operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backing store is unreachable
    #[error("store not available: {0}")]
    NotAvailable(String),
    /// Store call did not complete within the configured timeout
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    /// Store rejected or failed the operation
    #[error("store backend error: {0}")]
    Backend(String),
}
