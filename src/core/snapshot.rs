//! Terminal state snapshots
//!
//! Captures the active buffer (scrollback included) and cursor/mode state
//! in a serializable form. Cell words are stored verbatim, so a capture →
//! serialize → deserialize → restore round trip is bit-exact.

use serde::{Deserialize, Serialize};

use super::attrs::ExtendedAttrs;
use super::buffer::Buffer;
use super::cell::Cell;
use super::modes::Modes;

/// A complete snapshot of one buffer plus terminal-level state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cols: usize,
    pub rows: usize,
    /// Cursor column/row, viewport relative
    pub cursor: (usize, usize),
    /// Scroll region margins
    pub scroll_region: (usize, usize),
    /// Window title
    pub title: String,
    /// Whether the alternate buffer was active
    pub alternate: bool,
    pub modes: Modes,
    /// Index of the viewport top within `lines`
    pub ybase: usize,
    /// All retained lines, oldest first
    pub lines: Vec<LineSnapshot>,
}

/// One retained line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub wrapped: bool,
    pub cells: Vec<CellSnapshot>,
}

/// One cell, packed words carried verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub content: u32,
    pub fg: u32,
    pub bg: u32,
    /// Combined grapheme cluster, present iff the combined bit is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined: Option<String>,
    /// Resolved extended attributes, present iff the has-extended bit is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedAttrs>,
}

impl CellSnapshot {
    pub fn capture(cell: &Cell, extended: Option<ExtendedAttrs>) -> Self {
        Self {
            content: cell.content,
            fg: cell.fg,
            bg: cell.bg,
            combined: cell.combined_text().map(str::to_owned),
            extended,
        }
    }
}

impl Snapshot {
    /// Capture every retained line of `buffer`
    pub fn capture_lines(
        buffer: &Buffer,
        resolve_extended: impl Fn(u32) -> ExtendedAttrs,
    ) -> Vec<LineSnapshot> {
        (0..buffer.total_lines())
            .map(|i| {
                let line = buffer.line(i).expect("retained line");
                LineSnapshot {
                    wrapped: line.is_wrapped(),
                    cells: line
                        .cells()
                        .iter()
                        .map(|cell| {
                            let ext = cell.has_extended().then(|| resolve_extended(cell.ext));
                            CellSnapshot::capture(cell, ext)
                        })
                        .collect(),
                }
            })
            .collect()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, crate::error::Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, crate::error::Error> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attrs::{AttributeData, ExtendedAttrStore};

    #[test]
    fn test_capture_lines_carries_packed_words() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(4, 2, 0, true);
        let mut attr = AttributeData::default();
        attr.set_fg_color(crate::core::attrs::Color::Indexed(1));
        buf.write_cell(0, 0, Cell::from_char('A', 1, attr), &mut store);

        let lines = Snapshot::capture_lines(&buf, |_| ExtendedAttrs::default());
        assert_eq!(lines.len(), 2);
        let cell = &lines[0].cells[0];
        assert_eq!(cell.content, crate::core::cell::pack_content('A' as u32, 1));
        assert_eq!(cell.fg, attr.fg);
        assert!(cell.extended.is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let snap = Snapshot {
            cols: 2,
            rows: 1,
            cursor: (1, 0),
            scroll_region: (0, 0),
            title: "t".into(),
            alternate: false,
            modes: Modes::default(),
            ybase: 0,
            lines: vec![LineSnapshot {
                wrapped: true,
                cells: vec![CellSnapshot {
                    content: crate::core::cell::pack_content('中' as u32, 2),
                    fg: 0x0100_0003,
                    bg: 0,
                    combined: None,
                    extended: None,
                }],
            }],
        };
        let restored = Snapshot::from_json(&snap.to_json().unwrap()).unwrap();
        assert_eq!(restored, snap);
    }
}
