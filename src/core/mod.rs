//! Terminal buffer model
//!
//! The packed cell grid and the services that mutate it: cell/attribute
//! codecs, lines, the circular scrollback store, the buffer pair and
//! state snapshots.

pub mod attrs;
pub mod buffer;
pub mod bufferset;
pub mod cell;
pub mod circular;
pub mod line;
pub mod modes;
pub mod snapshot;

pub use attrs::{AttributeData, Color, ExtendedAttrStore, ExtendedAttrs, UnderlineStyle};
pub use buffer::{Buffer, SavedCursor};
pub use bufferset::{ActiveBuffer, BufferSet};
pub use cell::Cell;
pub use circular::CircularBuffer;
pub use line::BufferLine;
pub use modes::Modes;
pub use snapshot::{CellSnapshot, LineSnapshot, Snapshot};
