//! Quill Terminal Core
//!
//! A VT/xterm-compatible terminal emulator core, built around two tightly
//! coupled subsystems:
//!
//! - `parser`: a table-driven escape sequence parser turning a raw byte
//!   stream into typed dispatches (print, execute, CSI/OSC/DCS/ESC)
//! - `core`: the packed cell buffer model (cells, lines, scrollback,
//!   normal/alternate buffers) and the services that mutate it
//!
//! [`Terminal`] glues them together: it registers the default VT handler
//! set and owns the write path. Rendering, PTY plumbing and clipboard/OS
//! integration are intentionally out of scope; collaborators consume the
//! buffer state and events this crate produces.
//!
//! ```
//! use quill_terminal::{Terminal, TerminalOptions};
//!
//! let mut term = Terminal::new(TerminalOptions::default()).unwrap();
//! term.write_str("\x1b[1;31mhello\x1b[0m world");
//! assert_eq!(term.row_text(0), "hello world");
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod parser;
pub mod terminal;

pub use config::TerminalOptions;
pub use error::Error;
pub use terminal::Terminal;
