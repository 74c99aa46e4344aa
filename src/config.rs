//! Terminal configuration
//!
//! Construction options are passed explicitly to [`Terminal::new`]; the crate
//! keeps no global state. Invalid options surface as [`Error`] rather than
//! panicking, since dimensions are host-facing input.

use crate::error::Error;

/// Construction options for a [`Terminal`](crate::Terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalOptions {
    /// Number of columns (cells per row).
    pub cols: usize,
    /// Number of rows on screen.
    pub rows: usize,
    /// Maximum scrollback lines retained by the normal buffer.
    pub scrollback: usize,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            scrollback: 1000,
        }
    }
}

impl TerminalOptions {
    /// Reject dimensions the buffer model cannot represent. Zero columns or
    /// rows are not a valid grid.
    pub fn validate(&self) -> Result<(), Error> {
        if self.cols == 0 || self.rows == 0 {
            return Err(Error::InvalidSize {
                cols: self.cols,
                rows: self.rows,
            });
        }
        Ok(())
    }
}
