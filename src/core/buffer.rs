//! Terminal buffer
//!
//! One grid of a terminal (normal or alternate): the retained lines, the
//! cursor, the scroll region, tab stops and the saved-cursor slot. Lines
//! live in a circular buffer ordered oldest to newest; the viewport is the
//! last `rows` entries, everything before it is scrollback. `ybase` is the
//! absolute index of the viewport top and only grows; `ydisp` is the view
//! offset a renderer looks at and trails `ybase` while the user scrolls.

use serde::{Deserialize, Serialize};

use super::attrs::{AttributeData, ExtendedAttrStore, ExtendedAttrs};
use super::cell::Cell;
use super::circular::CircularBuffer;
use super::line::BufferLine;

/// Default interval between tab stops
const TAB_INTERVAL: usize = 8;

/// Cursor state preserved by DECSC / restored by DECRC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCursor {
    pub x: usize,
    pub y: usize,
    pub attr: AttributeData,
    pub extended: ExtendedAttrs,
    pub origin: bool,
    pub wraparound: bool,
}

impl Default for SavedCursor {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            attr: AttributeData::default(),
            extended: ExtendedAttrs::default(),
            origin: false,
            wraparound: true,
        }
    }
}

/// One terminal grid with its scrollback and cursor state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buffer {
    lines: CircularBuffer,
    /// Cursor column, `0 <= x < cols`
    pub x: usize,
    /// Cursor row relative to the viewport top, `0 <= y < rows`
    pub y: usize,
    /// Absolute index of the viewport top; monotonic
    pub ybase: usize,
    /// View offset for renderers, `ydisp <= ybase`
    pub ydisp: usize,
    /// Scroll region top margin (0-based, inclusive)
    pub scroll_top: usize,
    /// Scroll region bottom margin (0-based, inclusive)
    pub scroll_bottom: usize,
    /// Cursor is logically past the right margin; the next print wraps
    pub pending_wrap: bool,
    pub saved_cursor: SavedCursor,
    tabs: Vec<bool>,
    cols: usize,
    rows: usize,
    scrollback_limit: usize,
    has_scrollback: bool,
}

impl Buffer {
    /// Create a buffer with a blank viewport
    pub fn new(cols: usize, rows: usize, scrollback_limit: usize, has_scrollback: bool) -> Self {
        let capacity = Self::buffer_capacity(rows, scrollback_limit, has_scrollback);
        let mut lines = CircularBuffer::new(capacity);
        let blank = Cell::default();
        for _ in 0..rows {
            lines.push(BufferLine::new(cols, &blank));
        }
        Self {
            lines,
            x: 0,
            y: 0,
            ybase: 0,
            ydisp: 0,
            scroll_top: 0,
            scroll_bottom: rows.saturating_sub(1),
            pending_wrap: false,
            saved_cursor: SavedCursor::default(),
            tabs: Self::default_tabs(cols),
            cols,
            rows,
            scrollback_limit,
            has_scrollback,
        }
    }

    fn buffer_capacity(rows: usize, scrollback_limit: usize, has_scrollback: bool) -> usize {
        if has_scrollback {
            rows + scrollback_limit
        } else {
            rows
        }
    }

    fn default_tabs(cols: usize) -> Vec<bool> {
        let mut tabs = vec![false; cols];
        for i in (TAB_INTERVAL..cols).step_by(TAB_INTERVAL) {
            tabs[i] = true;
        }
        tabs
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn has_scrollback(&self) -> bool {
        self.has_scrollback && self.lines.capacity() > self.rows
    }

    /// Number of lines currently retained in scrollback
    pub fn scrollback_len(&self) -> usize {
        self.ybase
    }

    /// Total retained lines (scrollback + viewport)
    pub fn total_lines(&self) -> usize {
        self.lines.len()
    }

    /// Line by absolute index (0 = oldest retained)
    pub fn line(&self, index: usize) -> Option<&BufferLine> {
        self.lines.get(index)
    }

    pub fn line_mut(&mut self, index: usize) -> Option<&mut BufferLine> {
        self.lines.get_mut(index)
    }

    /// Line by viewport-relative row
    pub fn viewport_line(&self, y: usize) -> Option<&BufferLine> {
        self.lines.get(self.ybase + y)
    }

    pub fn viewport_line_mut(&mut self, y: usize) -> Option<&mut BufferLine> {
        self.lines.get_mut(self.ybase + y)
    }

    /// Line by display-relative row (what a renderer shows at `ydisp`)
    pub fn display_line(&self, y: usize) -> Option<&BufferLine> {
        self.lines.get(self.ydisp + y)
    }

    // --- cell mutation ------------------------------------------------

    /// Erase fill derived from an attribute set: keeps the background
    /// color, drops all flags and extended references
    pub fn erase_cell(attr: AttributeData) -> Cell {
        use super::attrs::{CM_MASK, RGB_MASK};
        Cell::null(AttributeData {
            fg: 0,
            bg: attr.bg & (CM_MASK | RGB_MASK),
        })
    }

    /// Overwrite the cell at viewport position, fixing up wide pairs the
    /// write would split. The cell's extended reference must already be
    /// counted by the caller.
    pub fn write_cell(&mut self, x: usize, y: usize, cell: Cell, store: &mut ExtendedAttrStore) {
        let abs = self.ybase + y;
        let fill = Self::erase_cell(cell.attr());
        let width = cell.width();
        let Some(line) = self.lines.get_mut(abs) else {
            return;
        };
        if x >= line.len() {
            return;
        }

        // overwriting the continuation half orphans the head
        if x > 0 && line.cell(x).map(|c| c.width()) == Some(0) {
            line.set_cell(x - 1, fill.clone(), store);
        }
        // overwriting a head orphans its continuation, unless we write a
        // new wide char over the same pair
        if width != 2
            && line.cell(x).map(|c| c.width()) == Some(2)
            && x + 1 < line.len()
            && line.cell(x + 1).map(|c| c.width()) == Some(0)
        {
            line.set_cell(x + 1, fill.clone(), store);
        }

        line.set_cell(x, cell, store);

        // wide char: claim the continuation cell
        if width == 2 && x + 1 < line.len() {
            let mut trailer = fill;
            trailer.content = super::cell::pack_content(0, 0);
            // the old occupant of the trailer slot may itself be a head
            if line.cell(x + 1).map(|c| c.width()) == Some(2)
                && x + 2 < line.len()
                && line.cell(x + 2).map(|c| c.width()) == Some(0)
            {
                let head_fill = Self::erase_cell(trailer.attr());
                line.set_cell(x + 2, head_fill, store);
            }
            line.set_cell(x + 1, trailer, store);
        }
    }

    /// Append a combining character to the cell at viewport position
    pub fn append_combining(&mut self, x: usize, y: usize, c: char) {
        let abs = self.ybase + y;
        if let Some(line) = self.lines.get_mut(abs) {
            if let Some(cell) = line.cell_mut(x) {
                cell.append_combining(c);
            }
        }
    }

    /// Replace cells `[start, end)` of a viewport row with the fill cell
    pub fn erase_in_row(
        &mut self,
        y: usize,
        start: usize,
        end: usize,
        fill: &Cell,
        store: &mut ExtendedAttrStore,
    ) {
        let abs = self.ybase + y;
        if let Some(line) = self.lines.get_mut(abs) {
            line.replace_cells(start, end, fill, store);
            if start == 0 && end >= line.len() {
                line.set_wrapped(false);
            }
        }
    }

    /// Replace whole viewport rows `[y0, y1)` with fill cells
    pub fn erase_rows(&mut self, y0: usize, y1: usize, fill: &Cell, store: &mut ExtendedAttrStore) {
        for y in y0..y1.min(self.rows) {
            let abs = self.ybase + y;
            if let Some(line) = self.lines.get_mut(abs) {
                line.replace_cells(0, usize::MAX, fill, store);
                line.set_wrapped(false);
            }
        }
    }

    /// ICH at a viewport position
    pub fn insert_cells(
        &mut self,
        y: usize,
        x: usize,
        n: usize,
        fill: &Cell,
        store: &mut ExtendedAttrStore,
    ) {
        let abs = self.ybase + y;
        if let Some(line) = self.lines.get_mut(abs) {
            line.insert_cells(x, n, fill, store);
        }
    }

    /// DCH at a viewport position
    pub fn delete_cells(
        &mut self,
        y: usize,
        x: usize,
        n: usize,
        fill: &Cell,
        store: &mut ExtendedAttrStore,
    ) {
        let abs = self.ybase + y;
        if let Some(line) = self.lines.get_mut(abs) {
            line.delete_cells(x, n, fill, store);
        }
    }

    // --- scrolling ----------------------------------------------------

    /// Scroll the content up by one line, called when a line feed runs off
    /// the bottom margin.
    ///
    /// Two genuinely different paths: with the region spanning the full
    /// viewport on a scrollback buffer, the top line moves into scrollback
    /// (`ybase` grows, evicting the oldest retained line at capacity).
    /// With a restricted region, lines rotate in place within the margins
    /// and scrollback is never touched.
    pub fn scroll(&mut self, fill: &Cell, is_wrapped: bool, store: &mut ExtendedAttrStore) {
        if self.scroll_top == 0 && self.scroll_bottom == self.rows.saturating_sub(1) {
            let user_scrolled = self.ydisp != self.ybase;
            match self.lines.evict_if_full() {
                Some(mut recycled) => {
                    // oldest scrollback line is gone; reuse its storage
                    recycled.reset(self.cols, fill, store);
                    recycled.set_wrapped(is_wrapped);
                    self.lines.push(recycled);
                }
                None => {
                    let mut line = BufferLine::new(self.cols, fill);
                    line.set_wrapped(is_wrapped);
                    self.lines.push(line);
                    self.ybase += 1;
                }
            }
            if !user_scrolled {
                self.ydisp = self.ybase;
            }
        } else {
            self.rotate_region_up(self.scroll_top, self.scroll_bottom, 1, fill, store);
        }
    }

    /// SU: shift the scroll region up by `n`, blanking the bottom
    pub fn scroll_up(&mut self, n: usize, fill: &Cell, store: &mut ExtendedAttrStore) {
        self.rotate_region_up(self.scroll_top, self.scroll_bottom, n, fill, store);
    }

    /// SD: shift the scroll region down by `n`, blanking the top
    pub fn scroll_down(&mut self, n: usize, fill: &Cell, store: &mut ExtendedAttrStore) {
        self.rotate_region_down(self.scroll_top, self.scroll_bottom, n, fill, store);
    }

    /// IL at viewport row `y` (no-op outside the scroll region)
    pub fn insert_lines(&mut self, y: usize, n: usize, fill: &Cell, store: &mut ExtendedAttrStore) {
        if y < self.scroll_top || y > self.scroll_bottom {
            return;
        }
        self.rotate_region_down(y, self.scroll_bottom, n, fill, store);
    }

    /// DL at viewport row `y` (no-op outside the scroll region)
    pub fn delete_lines(&mut self, y: usize, n: usize, fill: &Cell, store: &mut ExtendedAttrStore) {
        if y < self.scroll_top || y > self.scroll_bottom {
            return;
        }
        self.rotate_region_up(y, self.scroll_bottom, n, fill, store);
    }

    fn rotate_region_up(
        &mut self,
        top: usize,
        bottom: usize,
        n: usize,
        fill: &Cell,
        store: &mut ExtendedAttrStore,
    ) {
        let top_abs = self.ybase + top;
        let bottom_abs = self.ybase + bottom;
        if top_abs >= bottom_abs + 1 || bottom_abs >= self.lines.len() {
            return;
        }
        let span = bottom_abs - top_abs + 1;
        for _ in 0..n.min(span) {
            for i in top_abs..bottom_abs {
                self.lines.swap(i, i + 1);
            }
            if let Some(line) = self.lines.get_mut(bottom_abs) {
                line.reset(self.cols, fill, store);
            }
        }
    }

    fn rotate_region_down(
        &mut self,
        top: usize,
        bottom: usize,
        n: usize,
        fill: &Cell,
        store: &mut ExtendedAttrStore,
    ) {
        let top_abs = self.ybase + top;
        let bottom_abs = self.ybase + bottom;
        if top_abs >= bottom_abs + 1 || bottom_abs >= self.lines.len() {
            return;
        }
        let span = bottom_abs - top_abs + 1;
        for _ in 0..n.min(span) {
            for i in (top_abs..bottom_abs).rev() {
                self.lines.swap(i, i + 1);
            }
            if let Some(line) = self.lines.get_mut(top_abs) {
                line.reset(self.cols, fill, store);
            }
        }
    }

    /// DECSTBM. Margins are stored 0-based inclusive; invalid regions are
    /// ignored by the caller.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let bottom = bottom.min(self.rows.saturating_sub(1));
        if top < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        }
    }

    pub fn reset_scroll_region(&mut self) {
        self.scroll_top = 0;
        self.scroll_bottom = self.rows.saturating_sub(1);
    }

    // --- view offset ---------------------------------------------------

    /// Move the display offset by `delta` lines (negative = towards
    /// scrollback), clamped to the retained range
    pub fn scroll_display(&mut self, delta: isize) {
        let ydisp = self.ydisp as isize + delta;
        self.ydisp = ydisp.clamp(0, self.ybase as isize) as usize;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.ydisp = self.ybase;
    }

    // --- tab stops -----------------------------------------------------

    pub fn set_tab(&mut self, x: usize) {
        if x < self.tabs.len() {
            self.tabs[x] = true;
        }
    }

    pub fn clear_tab(&mut self, x: usize) {
        if x < self.tabs.len() {
            self.tabs[x] = false;
        }
    }

    pub fn clear_all_tabs(&mut self) {
        self.tabs.iter_mut().for_each(|t| *t = false);
    }

    /// Next tab stop strictly right of `x`, or the last column
    pub fn next_tab_stop(&self, x: usize) -> usize {
        for i in x + 1..self.cols {
            if self.tabs[i] {
                return i;
            }
        }
        self.cols.saturating_sub(1)
    }

    /// Previous tab stop strictly left of `x`, or column 0
    pub fn prev_tab_stop(&self, x: usize) -> usize {
        for i in (0..x.min(self.cols)).rev() {
            if self.tabs[i] {
                return i;
            }
        }
        0
    }

    // --- lifecycle -----------------------------------------------------

    /// Drop all retained scrollback, keeping the viewport (ED 3)
    pub fn clear_scrollback(&mut self, store: &mut ExtendedAttrStore) {
        for i in 0..self.ybase {
            if let Some(line) = self.lines.get_mut(i) {
                line.release_extended(store);
            }
        }
        self.lines.trim_start(self.ybase);
        self.ybase = 0;
        self.ydisp = 0;
    }

    /// Reset to a blank initial state (RIS)
    pub fn reset(&mut self, store: &mut ExtendedAttrStore) {
        for i in 0..self.lines.len() {
            if let Some(line) = self.lines.get_mut(i) {
                line.release_extended(store);
            }
        }
        self.lines.clear();
        let blank = Cell::default();
        for _ in 0..self.rows {
            self.lines.push(BufferLine::new(self.cols, &blank));
        }
        self.x = 0;
        self.y = 0;
        self.ybase = 0;
        self.ydisp = 0;
        self.pending_wrap = false;
        self.saved_cursor = SavedCursor::default();
        self.reset_scroll_region();
        self.tabs = Self::default_tabs(self.cols);
    }

    /// Resize the grid, padding or truncating every retained line and
    /// clamping cursor and margins into the new bounds
    pub fn resize(
        &mut self,
        new_cols: usize,
        new_rows: usize,
        fill: &Cell,
        store: &mut ExtendedAttrStore,
    ) {
        let new_capacity = Self::buffer_capacity(new_rows, self.scrollback_limit, self.has_scrollback);
        if new_capacity > self.lines.capacity() {
            self.lines.set_capacity(new_capacity);
        }

        if new_cols != self.cols {
            for i in 0..self.lines.len() {
                if let Some(line) = self.lines.get_mut(i) {
                    line.resize(new_cols, fill, store);
                }
            }
        }

        let mut add_to_y = 0;
        if self.rows < new_rows {
            for _ in self.rows..new_rows {
                if self.lines.len() < new_rows + self.ybase {
                    if self.ybase > 0 && self.lines.len() <= self.ybase + self.y + add_to_y + 1 {
                        // room above and nothing below the cursor: reveal a
                        // scrollback line instead of appending a blank one
                        self.ybase -= 1;
                        add_to_y += 1;
                        if self.ydisp > 0 {
                            self.ydisp -= 1;
                        }
                    } else {
                        self.lines.push(BufferLine::new(new_cols, fill));
                    }
                }
            }
        } else {
            for _ in new_rows..self.rows {
                if self.lines.len() > new_rows + self.ybase {
                    if self.lines.len() > self.ybase + self.y + 1 {
                        // blank line below the cursor
                        if let Some(mut line) = self.lines.pop() {
                            line.release_extended(store);
                        }
                    } else {
                        self.ybase += 1;
                        self.ydisp += 1;
                    }
                }
            }
        }

        if new_capacity < self.lines.capacity() {
            let to_trim = self.lines.len().saturating_sub(new_capacity);
            if to_trim > 0 {
                for i in 0..to_trim {
                    if let Some(line) = self.lines.get_mut(i) {
                        line.release_extended(store);
                    }
                }
                self.lines.trim_start(to_trim);
                self.ybase = self.ybase.saturating_sub(to_trim);
                self.ydisp = self.ydisp.saturating_sub(to_trim);
                self.saved_cursor.y = self.saved_cursor.y.saturating_sub(to_trim);
            }
            self.lines.set_capacity(new_capacity);
        }

        self.x = self.x.min(new_cols.saturating_sub(1));
        self.y = (self.y + add_to_y).min(new_rows.saturating_sub(1));
        self.saved_cursor.x = self.saved_cursor.x.min(new_cols.saturating_sub(1));
        self.saved_cursor.y = self.saved_cursor.y.min(new_rows.saturating_sub(1));
        self.pending_wrap = false;

        self.cols = new_cols;
        self.rows = new_rows;
        self.scroll_top = 0;
        self.scroll_bottom = new_rows.saturating_sub(1);
        self.tabs = Self::default_tabs(new_cols);
        self.ydisp = self.ydisp.min(self.ybase);
    }

    /// Viewport row as text (debug/test helper)
    pub fn row_text(&self, y: usize) -> String {
        self.viewport_line(y)
            .map(|l| l.translate_to_string(true, None, None))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_str(buf: &mut Buffer, y: usize, text: &str, store: &mut ExtendedAttrStore) {
        for (i, c) in text.chars().enumerate() {
            buf.write_cell(i, y, Cell::from_char(c, 1, AttributeData::default()), store);
        }
    }

    #[test]
    fn test_new_buffer_geometry() {
        let buf = Buffer::new(80, 24, 100, true);
        assert_eq!(buf.cols(), 80);
        assert_eq!(buf.rows(), 24);
        assert_eq!(buf.total_lines(), 24);
        assert_eq!(buf.scrollback_len(), 0);
        assert_eq!(buf.scroll_bottom, 23);
    }

    #[test]
    fn test_full_region_scroll_pushes_scrollback() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(10, 3, 10, true);
        write_str(&mut buf, 0, "top", &mut store);

        buf.scroll(&Cell::default(), false, &mut store);

        assert_eq!(buf.ybase, 1);
        assert_eq!(buf.ydisp, 1);
        assert_eq!(buf.scrollback_len(), 1);
        assert_eq!(buf.line(0).unwrap().translate_to_string(true, None, None), "top");
        assert_eq!(buf.row_text(2), "");
    }

    #[test]
    fn test_scroll_eviction_at_capacity() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(10, 2, 2, true);
        for i in 0..6 {
            write_str(&mut buf, 0, &format!("l{i}"), &mut store);
            buf.scroll(&Cell::default(), false, &mut store);
        }
        // capacity is rows + scrollback = 4; ybase capped there
        assert_eq!(buf.total_lines(), 4);
        assert_eq!(buf.ybase, 2);
        assert_eq!(buf.line(0).unwrap().translate_to_string(true, None, None), "l4");
    }

    #[test]
    fn test_restricted_region_scroll_keeps_scrollback() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(10, 5, 10, true);
        for y in 0..5 {
            write_str(&mut buf, y, &format!("row{y}"), &mut store);
        }
        buf.set_scroll_region(1, 3);

        buf.scroll(&Cell::default(), false, &mut store);

        // nothing entered scrollback, nothing outside [1,3] moved
        assert_eq!(buf.scrollback_len(), 0);
        assert_eq!(buf.ybase, 0);
        assert_eq!(buf.row_text(0), "row0");
        assert_eq!(buf.row_text(1), "row2");
        assert_eq!(buf.row_text(2), "row3");
        assert_eq!(buf.row_text(3), "");
        assert_eq!(buf.row_text(4), "row4");
    }

    #[test]
    fn test_no_scrollback_buffer_rotates() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(10, 3, 100, false);
        write_str(&mut buf, 0, "alpha", &mut store);
        buf.scroll(&Cell::default(), false, &mut store);
        assert_eq!(buf.ybase, 0);
        assert_eq!(buf.total_lines(), 3);
        assert_eq!(buf.row_text(2), "");
    }

    #[test]
    fn test_insert_delete_lines() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(10, 4, 10, true);
        for y in 0..4 {
            write_str(&mut buf, y, &format!("r{y}"), &mut store);
        }

        buf.insert_lines(1, 1, &Cell::default(), &mut store);
        assert_eq!(buf.row_text(0), "r0");
        assert_eq!(buf.row_text(1), "");
        assert_eq!(buf.row_text(2), "r1");
        assert_eq!(buf.row_text(3), "r2");

        buf.delete_lines(1, 1, &Cell::default(), &mut store);
        assert_eq!(buf.row_text(1), "r1");
        assert_eq!(buf.row_text(2), "r2");
        assert_eq!(buf.row_text(3), "");
    }

    #[test]
    fn test_scroll_display_clamps() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(10, 2, 10, true);
        for _ in 0..5 {
            buf.scroll(&Cell::default(), false, &mut store);
        }
        assert_eq!(buf.ybase, 5);
        buf.scroll_display(-3);
        assert_eq!(buf.ydisp, 2);
        buf.scroll_display(-100);
        assert_eq!(buf.ydisp, 0);
        buf.scroll_display(100);
        assert_eq!(buf.ydisp, 5);
    }

    #[test]
    fn test_user_scroll_position_survives_scroll() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(10, 2, 10, true);
        for _ in 0..3 {
            buf.scroll(&Cell::default(), false, &mut store);
        }
        buf.scroll_display(-2);
        let held = buf.ydisp;
        buf.scroll(&Cell::default(), false, &mut store);
        assert_eq!(buf.ydisp, held);
        buf.scroll_to_bottom();
        assert_eq!(buf.ydisp, buf.ybase);
    }

    #[test]
    fn test_tab_stops() {
        let buf = Buffer::new(20, 4, 0, true);
        assert_eq!(buf.next_tab_stop(0), 8);
        assert_eq!(buf.next_tab_stop(8), 16);
        assert_eq!(buf.next_tab_stop(16), 19);
        assert_eq!(buf.prev_tab_stop(9), 8);
        assert_eq!(buf.prev_tab_stop(8), 0);
    }

    #[test]
    fn test_custom_tab_stops() {
        let mut buf = Buffer::new(20, 4, 0, true);
        buf.set_tab(3);
        assert_eq!(buf.next_tab_stop(0), 3);
        buf.clear_tab(3);
        assert_eq!(buf.next_tab_stop(0), 8);
        buf.clear_all_tabs();
        assert_eq!(buf.next_tab_stop(0), 19);
    }

    #[test]
    fn test_resize_pads_and_truncates() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(10, 3, 10, true);
        write_str(&mut buf, 0, "0123456789", &mut store);

        buf.resize(5, 3, &Cell::default(), &mut store);
        assert_eq!(buf.cols(), 5);
        assert_eq!(buf.row_text(0), "01234");

        buf.resize(8, 3, &Cell::default(), &mut store);
        assert_eq!(buf.row_text(0), "01234");
        assert_eq!(buf.viewport_line(0).unwrap().len(), 8);
    }

    #[test]
    fn test_resize_rows_reveals_scrollback() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(10, 2, 10, true);
        write_str(&mut buf, 0, "old", &mut store);
        buf.scroll(&Cell::default(), false, &mut store);
        buf.y = 1;
        assert_eq!(buf.ybase, 1);

        buf.resize(10, 4, &Cell::default(), &mut store);
        // the scrollback line is pulled back into the taller viewport
        assert_eq!(buf.ybase, 0);
        assert_eq!(buf.rows(), 4);
        assert_eq!(buf.y, 2);
        assert_eq!(buf.row_text(0), "old");
    }

    #[test]
    fn test_resize_clamps_cursor_and_margins() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(20, 10, 0, true);
        buf.x = 19;
        buf.y = 9;
        buf.set_scroll_region(2, 8);

        buf.resize(10, 5, &Cell::default(), &mut store);
        assert!(buf.x < 10);
        assert!(buf.y < 5);
        assert_eq!(buf.scroll_top, 0);
        assert_eq!(buf.scroll_bottom, 4);
    }

    #[test]
    fn test_clear_scrollback_keeps_viewport() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(10, 2, 10, true);
        write_str(&mut buf, 0, "gone", &mut store);
        buf.scroll(&Cell::default(), false, &mut store);
        write_str(&mut buf, 0, "kept", &mut store);
        assert_eq!(buf.scrollback_len(), 1);

        buf.clear_scrollback(&mut store);
        assert_eq!(buf.scrollback_len(), 0);
        assert_eq!(buf.ybase, 0);
        assert_eq!(buf.row_text(0), "kept");
    }

    #[test]
    fn test_write_cell_wide_pair() {
        let mut store = ExtendedAttrStore::new();
        let mut buf = Buffer::new(10, 2, 0, true);
        buf.write_cell(0, 0, Cell::from_char('中', 2, AttributeData::default()), &mut store);
        assert_eq!(buf.viewport_line(0).unwrap().cell(0).unwrap().width(), 2);
        assert_eq!(buf.viewport_line(0).unwrap().cell(1).unwrap().width(), 0);

        // overwriting the continuation half clears the head
        buf.write_cell(1, 0, Cell::from_char('x', 1, AttributeData::default()), &mut store);
        assert_ne!(buf.viewport_line(0).unwrap().cell(0).unwrap().width(), 2);
        assert_eq!(buf.row_text(0), " x");
    }
}
