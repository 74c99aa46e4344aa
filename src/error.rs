//! Error types
//!
//! Untrusted byte input never produces an error: malformed sequences are
//! dropped and processing continues. This enum covers host-facing API
//! surfaces only (configuration, snapshot persistence).

use thiserror::Error;

/// Errors returned by host-facing operations
#[derive(Debug, Error)]
pub enum Error {
    /// Terminal dimensions outside the supported range
    #[error("invalid terminal size {cols}x{rows}")]
    InvalidSize { cols: usize, rows: usize },

    /// Snapshot (de)serialization failure
    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}
