//! Terminal core
//!
//! Ties the escape sequence parser to the buffer model: registers the
//! default handler set (cursor movement, SGR, erase, scrolling, modes,
//! OSC/DCS commands) and owns the write path that feeds decoded input
//! through the parser. Each handler is a small mapping from parameters to
//! one buffer mutation; the heavy lifting lives in `core`.
//!
//! Everything runs on the caller's thread. A write is fully processed
//! before `write` returns; hosts that need to interleave rendering can
//! queue input and drain it in bounded slices via `process_pending`.

use tracing::debug;
use unicode_width::UnicodeWidthChar;

use crate::config::TerminalOptions;
use crate::core::attrs::{
    AttributeData, ExtendedAttrStore, ExtendedAttrs, UnderlineStyle, BG_DIM, BG_HAS_EXTENDED,
    BG_ITALIC, BG_OVERLINE, FG_BLINK, FG_BOLD, FG_INVERSE, FG_INVISIBLE, FG_STRIKETHROUGH,
    FG_UNDERLINE,
};
use crate::core::buffer::{Buffer, SavedCursor};
use crate::core::bufferset::{ActiveBuffer, BufferSet};
use crate::core::cell::Cell;
use crate::core::modes::Modes;
use crate::core::snapshot::Snapshot;
use crate::core::Color;
use crate::error::Error;
use crate::event::EventEmitter;
use crate::parser::machine::{ident, Parser};
use crate::parser::params::Params;
use crate::parser::utf8::Utf8Decoder;

/// Input processed per slice when draining the write queue
const WRITE_CHUNK: usize = 131_072;

/// Current pen: attributes applied to newly written cells
#[derive(Debug, Clone)]
struct Pen {
    attr: AttributeData,
    extended: ExtendedAttrs,
    /// Arena slot holding the pen's extended record; the pen keeps one
    /// reference, every written cell adds its own
    cached_ext: Option<u32>,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            attr: AttributeData::default(),
            extended: ExtendedAttrs::default(),
            cached_ext: None,
        }
    }
}

/// Events produced by the interpreter
#[derive(Debug, Default)]
pub struct Events {
    /// Window title changed (OSC 0/2)
    pub title: EventEmitter<String>,
    /// BEL received
    pub bell: EventEmitter<()>,
    /// Reply bytes for the host (DSR, DA, DECRQSS)
    pub data: EventEmitter<String>,
    /// OSC 52 clipboard payload ("selection;base64data")
    pub clipboard: EventEmitter<String>,
    /// Grid was resized to (cols, rows)
    pub resize: EventEmitter<(usize, usize)>,
    /// Cursor moved to (x, y) after a processed write
    pub cursor_move: EventEmitter<(usize, usize)>,
}

/// Handler context: the mutable terminal state every dispatch works on
pub(crate) struct Interp {
    bufs: BufferSet,
    ext: ExtendedAttrStore,
    pen: Pen,
    modes: Modes,
    title: String,
    events: Events,
    /// Last printed graphic character, for REP
    last_printed: Option<(char, u8)>,
    /// OSC 8 id/uri registry
    links: Vec<String>,
}

impl Interp {
    fn new(options: &TerminalOptions) -> Self {
        Self {
            bufs: BufferSet::new(options.cols, options.rows, options.scrollback),
            ext: ExtendedAttrStore::new(),
            pen: Pen::default(),
            modes: Modes::default(),
            title: String::new(),
            events: Events::default(),
            last_printed: None,
            links: Vec::new(),
        }
    }

    fn buf(&self) -> &Buffer {
        self.bufs.active()
    }

    /// Fill cell for erase operations: pen background color only
    fn erase_fill(&self) -> Cell {
        Buffer::erase_cell(self.pen.attr)
    }

    /// Drop the pen's cached extended record (pen state changed)
    fn invalidate_pen_ext(&mut self) {
        if let Some(idx) = self.pen.cached_ext.take() {
            self.ext.decref(idx);
        }
    }

    /// Build a cell from the pen, accounting an extended reference
    fn make_cell(&mut self, c: char, width: u8) -> Cell {
        let mut cell = Cell::from_char(c, width, self.pen.attr);
        if !self.pen.extended.is_default() {
            let idx = match self.pen.cached_ext {
                Some(idx) => idx,
                None => {
                    let idx = self.ext.alloc(self.pen.extended);
                    self.pen.cached_ext = Some(idx);
                    idx
                }
            };
            self.ext.incref(idx);
            cell.bg |= BG_HAS_EXTENDED;
            cell.ext = idx;
        }
        cell
    }

    // --- print path ----------------------------------------------------

    fn print(&mut self, data: &[u32]) {
        for &code in data {
            let Some(c) = char::from_u32(code) else {
                continue;
            };
            let width = UnicodeWidthChar::width(c).unwrap_or(1) as u8;
            if width == 0 {
                self.print_combining(c);
                continue;
            }
            self.print_char(c, width.min(2));
        }
    }

    /// Attach a zero-width codepoint to the preceding cell
    fn print_combining(&mut self, c: char) {
        let buf = self.bufs.active_mut();
        let x = buf.x;
        let y = buf.y;
        let mut target = if buf.pending_wrap {
            x
        } else if x > 0 {
            x - 1
        } else {
            return;
        };
        // land on the head of a wide pair, not the continuation
        if target > 0
            && buf
                .viewport_line(y)
                .and_then(|l| l.cell(target))
                .map(|cell| cell.width())
                == Some(0)
        {
            target -= 1;
        }
        buf.append_combining(target, y, c);
    }

    fn print_char(&mut self, c: char, width: u8) {
        if self.buf().pending_wrap {
            self.wrap_line();
        }

        // a wide char with only one column left wraps early (or is
        // dropped when wraparound is off)
        if width == 2 && self.buf().x == self.buf().cols().saturating_sub(1) {
            if !self.modes.wraparound {
                return;
            }
            let fill = self.erase_fill();
            let (x, y) = (self.buf().x, self.buf().y);
            let buf = self.bufs.active_mut();
            buf.erase_in_row(y, x, x + 1, &fill, &mut self.ext);
            self.wrap_line_forced();
        }

        if self.modes.insert {
            let fill = self.erase_fill();
            let (x, y) = (self.buf().x, self.buf().y);
            self.bufs
                .active_mut()
                .insert_cells(y, x, width as usize, &fill, &mut self.ext);
        }

        let cell = self.make_cell(c, width);
        let (x, y) = (self.buf().x, self.buf().y);
        self.bufs.active_mut().write_cell(x, y, cell, &mut self.ext);
        self.last_printed = Some((c, width));

        let cols = self.buf().cols();
        let buf = self.bufs.active_mut();
        let next = buf.x + width as usize;
        if next >= cols {
            buf.x = cols - 1;
            if self.modes.wraparound {
                buf.pending_wrap = true;
            }
        } else {
            buf.x = next;
        }
    }

    /// Resolve a pending wrap: cursor to column 0 of the next line
    fn wrap_line(&mut self) {
        self.bufs.active_mut().pending_wrap = false;
        self.wrap_line_forced();
    }

    fn wrap_line_forced(&mut self) {
        let fill = self.erase_fill();
        let buf = self.bufs.active_mut();
        buf.x = 0;
        if buf.y == buf.scroll_bottom {
            buf.scroll(&fill, true, &mut self.ext);
        } else if buf.y < buf.rows() - 1 {
            buf.y += 1;
            let y = buf.y;
            if let Some(line) = buf.viewport_line_mut(y) {
                line.set_wrapped(true);
            }
        }
    }

    // --- C0 controls ---------------------------------------------------

    fn bell(&mut self) {
        self.events.bell.emit(&());
    }

    fn backspace(&mut self) {
        self.last_printed = None;
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        if buf.x > 0 {
            buf.x -= 1;
        }
    }

    fn tab(&mut self) {
        self.last_printed = None;
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        buf.x = buf.next_tab_stop(buf.x);
    }

    fn line_feed(&mut self) {
        self.last_printed = None;
        let fill = self.erase_fill();
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        if buf.y == buf.scroll_bottom {
            buf.scroll(&fill, false, &mut self.ext);
        } else if buf.y < buf.rows() - 1 {
            buf.y += 1;
        }
        if self.modes.linefeed {
            self.bufs.active_mut().x = 0;
        }
    }

    fn carriage_return(&mut self) {
        self.last_printed = None;
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        buf.x = 0;
    }

    // --- cursor movement ----------------------------------------------

    fn cursor_up(&mut self, n: usize) {
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        let floor = if buf.y >= buf.scroll_top {
            buf.scroll_top
        } else {
            0
        };
        buf.y = buf.y.saturating_sub(n).max(floor);
    }

    fn cursor_down(&mut self, n: usize) {
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        let ceil = if buf.y <= buf.scroll_bottom {
            buf.scroll_bottom
        } else {
            buf.rows() - 1
        };
        buf.y = (buf.y + n).min(ceil);
    }

    fn cursor_forward(&mut self, n: usize) {
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        buf.x = (buf.x + n).min(buf.cols() - 1);
    }

    fn cursor_backward(&mut self, n: usize) {
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        buf.x = buf.x.saturating_sub(n);
    }

    fn cursor_col(&mut self, col: usize) {
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        buf.x = col.min(buf.cols() - 1);
    }

    fn cursor_row(&mut self, row: usize) {
        let origin = self.modes.origin;
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        buf.y = if origin {
            (buf.scroll_top + row).min(buf.scroll_bottom)
        } else {
            row.min(buf.rows() - 1)
        };
    }

    /// CUP/HVP with origin-mode addressing
    fn cursor_pos(&mut self, row: usize, col: usize) {
        self.cursor_row(row);
        self.cursor_col(col);
    }

    fn cursor_home(&mut self) {
        let origin = self.modes.origin;
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        buf.x = 0;
        buf.y = if origin { buf.scroll_top } else { 0 };
    }

    fn tab_forward(&mut self, n: usize) {
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        // more steps than columns cannot move further
        for _ in 0..n.min(buf.cols()) {
            buf.x = buf.next_tab_stop(buf.x);
        }
    }

    fn tab_backward(&mut self, n: usize) {
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        for _ in 0..n.min(buf.cols()) {
            buf.x = buf.prev_tab_stop(buf.x);
        }
    }

    // --- erase / edit --------------------------------------------------

    fn erase_in_display(&mut self, mode: i32) {
        let fill = self.erase_fill();
        let (x, y, rows, cols) = {
            let buf = self.buf();
            (buf.x, buf.y, buf.rows(), buf.cols())
        };
        self.bufs.active_mut().pending_wrap = false;
        match mode {
            0 => {
                self.bufs
                    .active_mut()
                    .erase_in_row(y, x, cols, &fill, &mut self.ext);
                self.bufs
                    .active_mut()
                    .erase_rows(y + 1, rows, &fill, &mut self.ext);
            }
            1 => {
                self.bufs.active_mut().erase_rows(0, y, &fill, &mut self.ext);
                self.bufs
                    .active_mut()
                    .erase_in_row(y, 0, x + 1, &fill, &mut self.ext);
            }
            2 => {
                // clears the grid only; retained scrollback stays
                self.bufs.active_mut().erase_rows(0, rows, &fill, &mut self.ext);
            }
            3 => {
                self.bufs.active_mut().clear_scrollback(&mut self.ext);
            }
            _ => debug!(mode, "unknown ED mode"),
        }
    }

    fn erase_in_line(&mut self, mode: i32) {
        let fill = self.erase_fill();
        let (x, y, cols) = {
            let buf = self.buf();
            (buf.x, buf.y, buf.cols())
        };
        self.bufs.active_mut().pending_wrap = false;
        match mode {
            0 => self
                .bufs
                .active_mut()
                .erase_in_row(y, x, cols, &fill, &mut self.ext),
            1 => self
                .bufs
                .active_mut()
                .erase_in_row(y, 0, x + 1, &fill, &mut self.ext),
            2 => self
                .bufs
                .active_mut()
                .erase_in_row(y, 0, cols, &fill, &mut self.ext),
            _ => debug!(mode, "unknown EL mode"),
        }
    }

    fn erase_chars(&mut self, n: usize) {
        let fill = self.erase_fill();
        let (x, y) = (self.buf().x, self.buf().y);
        self.bufs
            .active_mut()
            .erase_in_row(y, x, x + n, &fill, &mut self.ext);
    }

    fn insert_chars(&mut self, n: usize) {
        let fill = self.erase_fill();
        let (x, y) = (self.buf().x, self.buf().y);
        self.bufs.active_mut().pending_wrap = false;
        self.bufs
            .active_mut()
            .insert_cells(y, x, n, &fill, &mut self.ext);
    }

    fn delete_chars(&mut self, n: usize) {
        let fill = self.erase_fill();
        let (x, y) = (self.buf().x, self.buf().y);
        self.bufs.active_mut().pending_wrap = false;
        self.bufs
            .active_mut()
            .delete_cells(y, x, n, &fill, &mut self.ext);
    }

    fn insert_lines(&mut self, n: usize) {
        let fill = self.erase_fill();
        let y = self.buf().y;
        let buf = self.bufs.active_mut();
        buf.insert_lines(y, n, &fill, &mut self.ext);
        buf.x = 0;
        buf.pending_wrap = false;
    }

    fn delete_lines(&mut self, n: usize) {
        let fill = self.erase_fill();
        let y = self.buf().y;
        let buf = self.bufs.active_mut();
        buf.delete_lines(y, n, &fill, &mut self.ext);
        buf.x = 0;
        buf.pending_wrap = false;
    }

    fn scroll_up(&mut self, n: usize) {
        let fill = self.erase_fill();
        self.bufs.active_mut().scroll_up(n, &fill, &mut self.ext);
    }

    fn scroll_down(&mut self, n: usize) {
        let fill = self.erase_fill();
        self.bufs.active_mut().scroll_down(n, &fill, &mut self.ext);
    }

    /// REP: repeat the last printed graphic character
    fn repeat_preceding(&mut self, n: usize) {
        if let Some((c, width)) = self.last_printed {
            // bound the damage a hostile count can do to one viewport row
            let max = self.buf().cols();
            for _ in 0..n.min(max) {
                self.print_char(c, width);
            }
        }
    }

    // --- index / save-restore -------------------------------------------

    fn index(&mut self) {
        let fill = self.erase_fill();
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        if buf.y == buf.scroll_bottom {
            buf.scroll(&fill, false, &mut self.ext);
        } else if buf.y < buf.rows() - 1 {
            buf.y += 1;
        }
    }

    fn reverse_index(&mut self) {
        let fill = self.erase_fill();
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        if buf.y == buf.scroll_top {
            buf.scroll_down(1, &fill, &mut self.ext);
        } else if buf.y > 0 {
            buf.y -= 1;
        }
    }

    fn next_line(&mut self) {
        self.index();
        self.bufs.active_mut().x = 0;
    }

    fn save_cursor(&mut self) {
        let attr = self.pen.attr;
        let extended = self.pen.extended;
        let origin = self.modes.origin;
        let wraparound = self.modes.wraparound;
        let buf = self.bufs.active_mut();
        buf.saved_cursor = SavedCursor {
            x: buf.x,
            y: buf.y,
            attr,
            extended,
            origin,
            wraparound,
        };
    }

    fn restore_cursor(&mut self) {
        let saved = self.buf().saved_cursor;
        let buf = self.bufs.active_mut();
        buf.x = saved.x.min(buf.cols() - 1);
        buf.y = saved.y.min(buf.rows() - 1);
        buf.pending_wrap = false;
        self.modes.origin = saved.origin;
        self.modes.wraparound = saved.wraparound;
        self.pen.attr = saved.attr;
        self.set_pen_extended(saved.extended);
    }

    fn set_pen_extended(&mut self, extended: ExtendedAttrs) {
        if self.pen.extended != extended {
            self.pen.extended = extended;
            self.invalidate_pen_ext();
        }
    }

    // --- scroll region / tabs -------------------------------------------

    fn set_scroll_region(&mut self, top_1based: i32, bottom_1based: i32) {
        let rows = self.buf().rows() as i32;
        let bottom = if bottom_1based == 0 { rows } else { bottom_1based };
        if top_1based < bottom && bottom <= rows {
            let buf = self.bufs.active_mut();
            buf.set_scroll_region((top_1based - 1).max(0) as usize, (bottom - 1) as usize);
            self.cursor_home();
        }
    }

    fn set_tab_stop(&mut self) {
        let buf = self.bufs.active_mut();
        let x = buf.x;
        buf.set_tab(x);
    }

    fn clear_tab(&mut self, mode: i32) {
        let buf = self.bufs.active_mut();
        match mode {
            0 => {
                let x = buf.x;
                buf.clear_tab(x);
            }
            3 => buf.clear_all_tabs(),
            _ => {}
        }
    }

    // --- modes -----------------------------------------------------------

    fn set_mode(&mut self, param: i32, enable: bool) {
        match param {
            4 => self.modes.insert = enable,
            20 => self.modes.linefeed = enable,
            _ => debug!(param, enable, "unhandled ANSI mode"),
        }
    }

    fn set_dec_mode(&mut self, param: i32, enable: bool) {
        match param {
            1 => self.modes.application_cursor = enable,
            5 => self.modes.reverse_video = enable,
            6 => {
                self.modes.origin = enable;
                self.cursor_home();
            }
            7 => self.modes.wraparound = enable,
            25 => self.modes.cursor_visible = enable,
            47 | 1047 => {
                if enable {
                    self.enter_alt_buffer();
                } else {
                    self.leave_alt_buffer();
                }
            }
            1048 => {
                if enable {
                    self.save_cursor();
                } else {
                    self.restore_cursor();
                }
            }
            1049 => {
                if enable {
                    self.save_cursor();
                    self.enter_alt_buffer();
                } else {
                    self.leave_alt_buffer();
                    self.restore_cursor();
                }
            }
            2004 => self.modes.bracketed_paste = enable,
            _ => debug!(param, enable, "unhandled DEC private mode"),
        }
    }

    fn enter_alt_buffer(&mut self) {
        self.last_printed = None;
        let fill = self.erase_fill();
        self.bufs.activate_alt(&fill, &mut self.ext);
    }

    fn leave_alt_buffer(&mut self) {
        self.last_printed = None;
        self.bufs.activate_normal(&mut self.ext);
    }

    // --- SGR --------------------------------------------------------------

    fn sgr(&mut self, params: &Params) {
        let mut extended = self.pen.extended;
        let mut i = 0;
        while i < params.len() {
            let p = params.get(i);
            match p {
                0 => {
                    self.pen.attr = AttributeData::default();
                    // hyperlink state is controlled by OSC 8, not SGR
                    extended = ExtendedAttrs {
                        url_id: extended.url_id,
                        ..Default::default()
                    };
                }
                1 => self.pen.attr.fg |= FG_BOLD,
                2 => self.pen.attr.bg |= BG_DIM,
                3 => self.pen.attr.bg |= BG_ITALIC,
                4 => {
                    let style = params
                        .sub_params(i)
                        .first()
                        .and_then(|&v| UnderlineStyle::from_param(v.max(0)))
                        .unwrap_or(UnderlineStyle::Single);
                    extended.underline_style = style;
                    if style == UnderlineStyle::None {
                        self.pen.attr.fg &= !FG_UNDERLINE;
                    } else {
                        self.pen.attr.fg |= FG_UNDERLINE;
                    }
                }
                5 => self.pen.attr.fg |= FG_BLINK,
                7 => self.pen.attr.fg |= FG_INVERSE,
                8 => self.pen.attr.fg |= FG_INVISIBLE,
                9 => self.pen.attr.fg |= FG_STRIKETHROUGH,
                21 => {
                    extended.underline_style = UnderlineStyle::Double;
                    self.pen.attr.fg |= FG_UNDERLINE;
                }
                22 => {
                    self.pen.attr.fg &= !FG_BOLD;
                    self.pen.attr.bg &= !BG_DIM;
                }
                23 => self.pen.attr.bg &= !BG_ITALIC,
                24 => {
                    self.pen.attr.fg &= !FG_UNDERLINE;
                    extended.underline_style = UnderlineStyle::None;
                }
                25 => self.pen.attr.fg &= !FG_BLINK,
                27 => self.pen.attr.fg &= !FG_INVERSE,
                28 => self.pen.attr.fg &= !FG_INVISIBLE,
                29 => self.pen.attr.fg &= !FG_STRIKETHROUGH,
                30..=37 => self.pen.attr.set_fg_color(Color::Indexed((p - 30) as u8)),
                39 => self.pen.attr.set_fg_color(Color::Default),
                40..=47 => self.pen.attr.set_bg_color(Color::Indexed((p - 40) as u8)),
                49 => self.pen.attr.set_bg_color(Color::Default),
                53 => self.pen.attr.bg |= BG_OVERLINE,
                55 => self.pen.attr.bg &= !BG_OVERLINE,
                90..=97 => self.pen.attr.set_fg_color(Color::Indexed((p - 90 + 8) as u8)),
                100..=107 => self.pen.attr.set_bg_color(Color::Indexed((p - 100 + 8) as u8)),
                38 | 48 | 58 => {
                    let (color, consumed) = if params.has_sub_params(i) {
                        (Self::extract_color(params.sub_params(i)), 0)
                    } else {
                        let mut tail = Vec::new();
                        for j in i + 1..params.len() {
                            tail.push(params.get(j));
                        }
                        let color = Self::extract_color(&tail);
                        (color, Self::color_param_span(&tail))
                    };
                    if let Some(color) = color {
                        match p {
                            38 => self.pen.attr.set_fg_color(color),
                            48 => self.pen.attr.set_bg_color(color),
                            _ => extended.set_underline_color(color),
                        }
                    }
                    i += consumed;
                }
                59 => extended.underline_color = 0,
                _ => debug!(param = p, "unhandled SGR parameter"),
            }
            i += 1;
        }
        self.set_pen_extended(extended);
    }

    /// Parse a 38/48/58 color payload: `2;r;g;b` / `5;idx` (and the colon
    /// forms with an optional colorspace id). Missing components are 0.
    fn extract_color(values: &[i32]) -> Option<Color> {
        let norm = |v: Option<&i32>| -> u8 { (*v.unwrap_or(&0)).clamp(0, 255) as u8 };
        match values.first() {
            Some(2) => {
                // 2:cs:r:g:b has five entries, 2:r:g:b and 2;r;g;b four
                let rgb: Vec<i32> = values[1..].iter().map(|&v| v.max(0)).collect();
                let rgb = if rgb.len() >= 4 { &rgb[1..4] } else { &rgb[..] };
                Some(Color::Rgb(
                    norm(rgb.first()),
                    norm(rgb.get(1)),
                    norm(rgb.get(2)),
                ))
            }
            Some(5) => Some(Color::Indexed(norm(values.get(1)))),
            _ => None,
        }
    }

    /// Parameters consumed by the semicolon color form
    fn color_param_span(tail: &[i32]) -> usize {
        match tail.first() {
            Some(2) => 4.min(tail.len()),
            Some(5) => 2.min(tail.len()),
            _ => 0,
        }
    }

    // --- reports ----------------------------------------------------------

    fn reply(&mut self, data: String) {
        self.events.data.emit(&data);
    }

    fn device_status(&mut self, param: i32) {
        match param {
            5 => self.reply("\x1b[0n".to_string()),
            6 => {
                let buf = self.buf();
                let y = if self.modes.origin {
                    buf.y.saturating_sub(buf.scroll_top)
                } else {
                    buf.y
                };
                let report = format!("\x1b[{};{}R", y + 1, buf.x + 1);
                self.reply(report);
            }
            _ => debug!(param, "unhandled DSR"),
        }
    }

    fn device_attributes_primary(&mut self) {
        // VT100 with advanced video option
        self.reply("\x1b[?1;2c".to_string());
    }

    fn device_attributes_secondary(&mut self) {
        self.reply("\x1b[>0;276;0c".to_string());
    }

    /// DECRQSS: report a control function setting
    fn request_status_string(&mut self, payload: &str) {
        let reply = match payload {
            "m" => Some("0m".to_string()),
            "r" => {
                let buf = self.buf();
                Some(format!("{};{}r", buf.scroll_top + 1, buf.scroll_bottom + 1))
            }
            _ => None,
        };
        match reply {
            Some(setting) => self.reply(format!("\x1bP1$r{setting}\x1b\\")),
            None => self.reply("\x1bP0$r\x1b\\".to_string()),
        }
    }

    // --- OSC ---------------------------------------------------------------

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        let title = self.title.clone();
        self.events.title.emit(&title);
    }

    /// OSC 8: open or close a hyperlink range
    fn hyperlink(&mut self, payload: &str) {
        let mut extended = self.pen.extended;
        match payload.split_once(';') {
            Some((_, "")) | None => extended.url_id = 0,
            Some((_params, uri)) => {
                self.links.push(uri.to_string());
                extended.url_id = self.links.len() as u32;
            }
        }
        self.set_pen_extended(extended);
    }

    /// Resolve a hyperlink id from cell extended attributes
    fn link_uri(&self, url_id: u32) -> Option<&str> {
        (url_id > 0)
            .then(|| self.links.get(url_id as usize - 1))
            .flatten()
            .map(String::as_str)
    }

    // --- resets -------------------------------------------------------------

    /// DECALN: fill the screen with 'E' for alignment checks
    fn screen_alignment(&mut self) {
        let rows = self.buf().rows();
        let cols = self.buf().cols();
        let cell = Cell::from_char('E', 1, AttributeData::default());
        for y in 0..rows {
            for x in 0..cols {
                self.bufs
                    .active_mut()
                    .write_cell(x, y, cell.clone(), &mut self.ext);
            }
        }
        self.bufs.active_mut().reset_scroll_region();
        self.cursor_home();
    }

    /// DECSTR: soft reset
    fn soft_reset(&mut self) {
        let buf = self.bufs.active_mut();
        buf.pending_wrap = false;
        buf.reset_scroll_region();
        buf.saved_cursor = SavedCursor::default();
        self.modes.insert = false;
        self.modes.origin = false;
        self.modes.application_cursor = false;
        self.modes.cursor_visible = true;
        self.pen.attr = AttributeData::default();
        self.set_pen_extended(ExtendedAttrs::default());
    }

    /// RIS: clear everything that belongs to the interpreter
    fn full_reset(&mut self) {
        self.bufs.activate_normal(&mut self.ext);
        self.invalidate_pen_ext();
        self.bufs.normal_mut().reset(&mut self.ext);
        self.ext.clear();
        self.pen = Pen::default();
        self.modes.reset();
        self.title.clear();
        self.last_printed = None;
        self.links.clear();
    }
}

/// The terminal: parser, interpreter state and the write path
pub struct Terminal {
    parser: Parser<Interp>,
    interp: Interp,
    decoder: Utf8Decoder,
    codepoints: Vec<u32>,
    pending: Vec<u8>,
    options: TerminalOptions,
}

impl Terminal {
    pub fn new(options: TerminalOptions) -> Result<Self, Error> {
        options.validate()?;
        let mut parser = Parser::new();
        Self::register_handlers(&mut parser);
        Ok(Self {
            parser,
            interp: Interp::new(&options),
            decoder: Utf8Decoder::new(),
            codepoints: Vec::new(),
            pending: Vec::new(),
            options,
        })
    }

    /// Wire the default VT handler set into the dispatch registries
    fn register_handlers(parser: &mut Parser<Interp>) {
        parser.set_print_handler(|t, data| t.print(data));

        // C0
        parser.set_execute_handler(0x07, |t| t.bell());
        parser.set_execute_handler(0x08, |t| t.backspace());
        parser.set_execute_handler(0x09, |t| t.tab());
        parser.set_execute_handler(0x0A, |t| t.line_feed());
        parser.set_execute_handler(0x0B, |t| t.line_feed());
        parser.set_execute_handler(0x0C, |t| t.line_feed());
        parser.set_execute_handler(0x0D, |t| t.carriage_return());
        parser.set_execute_handler(0x0E, |_| debug!("shift-out ignored (charsets unsupported)"));
        parser.set_execute_handler(0x0F, |_| debug!("shift-in ignored (charsets unsupported)"));

        // CSI cursor movement
        parser.register_csi(ident(None, &[], b'@'), |t, p| {
            t.insert_chars(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'A'), |t, p| {
            t.cursor_up(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'B'), |t, p| {
            t.cursor_down(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'C'), |t, p| {
            t.cursor_forward(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'D'), |t, p| {
            t.cursor_backward(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'E'), |t, p| {
            t.cursor_down(p.get_or(0, 1) as usize);
            t.cursor_col(0);
            true
        });
        parser.register_csi(ident(None, &[], b'F'), |t, p| {
            t.cursor_up(p.get_or(0, 1) as usize);
            t.cursor_col(0);
            true
        });
        parser.register_csi(ident(None, &[], b'G'), |t, p| {
            t.cursor_col(p.get_or(0, 1) as usize - 1);
            true
        });
        parser.register_csi(ident(None, &[], b'H'), |t, p| {
            t.cursor_pos(p.get_or(0, 1) as usize - 1, p.get_or(1, 1) as usize - 1);
            true
        });
        parser.register_csi(ident(None, &[], b'f'), |t, p| {
            t.cursor_pos(p.get_or(0, 1) as usize - 1, p.get_or(1, 1) as usize - 1);
            true
        });
        parser.register_csi(ident(None, &[], b'I'), |t, p| {
            t.tab_forward(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'Z'), |t, p| {
            t.tab_backward(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'`'), |t, p| {
            t.cursor_col(p.get_or(0, 1) as usize - 1);
            true
        });
        parser.register_csi(ident(None, &[], b'a'), |t, p| {
            t.cursor_forward(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'd'), |t, p| {
            t.cursor_row(p.get_or(0, 1) as usize - 1);
            true
        });
        parser.register_csi(ident(None, &[], b'e'), |t, p| {
            t.cursor_down(p.get_or(0, 1) as usize);
            true
        });

        // CSI erase / edit
        parser.register_csi(ident(None, &[], b'J'), |t, p| {
            t.erase_in_display(p.get(0));
            true
        });
        parser.register_csi(ident(None, &[], b'K'), |t, p| {
            t.erase_in_line(p.get(0));
            true
        });
        parser.register_csi(ident(None, &[], b'L'), |t, p| {
            t.insert_lines(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'M'), |t, p| {
            t.delete_lines(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'P'), |t, p| {
            t.delete_chars(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'S'), |t, p| {
            t.scroll_up(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'T'), |t, p| {
            if p.len() <= 1 {
                t.scroll_down(p.get_or(0, 1) as usize);
            }
            true
        });
        parser.register_csi(ident(None, &[], b'X'), |t, p| {
            t.erase_chars(p.get_or(0, 1) as usize);
            true
        });
        parser.register_csi(ident(None, &[], b'b'), |t, p| {
            t.repeat_preceding(p.get_or(0, 1) as usize);
            true
        });

        // CSI attributes / modes / region
        parser.register_csi(ident(None, &[], b'm'), |t, p| {
            t.sgr(p);
            true
        });
        parser.register_csi(ident(None, &[], b'h'), |t, p| {
            for i in 0..p.len() {
                t.set_mode(p.get(i), true);
            }
            true
        });
        parser.register_csi(ident(None, &[], b'l'), |t, p| {
            for i in 0..p.len() {
                t.set_mode(p.get(i), false);
            }
            true
        });
        parser.register_csi(ident(Some(b'?'), &[], b'h'), |t, p| {
            for i in 0..p.len() {
                t.set_dec_mode(p.get(i), true);
            }
            true
        });
        parser.register_csi(ident(Some(b'?'), &[], b'l'), |t, p| {
            for i in 0..p.len() {
                t.set_dec_mode(p.get(i), false);
            }
            true
        });
        parser.register_csi(ident(None, &[], b'r'), |t, p| {
            t.set_scroll_region(p.get_or(0, 1), p.get(1));
            true
        });
        parser.register_csi(ident(None, &[], b'g'), |t, p| {
            t.clear_tab(p.get(0));
            true
        });
        parser.register_csi(ident(None, &[], b's'), |t, p| {
            if p.len() == 1 && !p.is_given(0) {
                t.save_cursor();
            }
            true
        });
        parser.register_csi(ident(None, &[], b'u'), |t, _| {
            t.restore_cursor();
            true
        });

        // CSI reports / resets
        parser.register_csi(ident(None, &[], b'n'), |t, p| {
            t.device_status(p.get(0));
            true
        });
        parser.register_csi(ident(None, &[], b'c'), |t, p| {
            if p.get(0) == 0 {
                t.device_attributes_primary();
            }
            true
        });
        parser.register_csi(ident(Some(b'>'), &[], b'c'), |t, p| {
            if p.get(0) == 0 {
                t.device_attributes_secondary();
            }
            true
        });
        parser.register_csi(ident(None, &[b'!'], b'p'), |t, _| {
            t.soft_reset();
            true
        });

        // ESC
        parser.register_esc(ident(None, &[], b'7'), |t| {
            t.save_cursor();
            true
        });
        parser.register_esc(ident(None, &[], b'8'), |t| {
            t.restore_cursor();
            true
        });
        parser.register_esc(ident(None, &[], b'D'), |t| {
            t.index();
            true
        });
        parser.register_esc(ident(None, &[], b'E'), |t| {
            t.next_line();
            true
        });
        parser.register_esc(ident(None, &[], b'H'), |t| {
            t.set_tab_stop();
            true
        });
        parser.register_esc(ident(None, &[], b'M'), |t| {
            t.reverse_index();
            true
        });
        parser.register_esc(ident(None, &[], b'c'), |t| {
            t.full_reset();
            true
        });
        parser.register_esc(ident(None, &[], b'='), |t| {
            t.modes.application_keypad = true;
            true
        });
        parser.register_esc(ident(None, &[], b'>'), |t| {
            t.modes.application_keypad = false;
            true
        });
        parser.register_esc(ident(None, &[b'#'], b'8'), |t| {
            t.screen_alignment();
            true
        });
        // charset designations parse but do nothing
        for inter in [b'(', b')', b'*', b'+'] {
            for fin in [b'A', b'B', b'0'] {
                parser.register_esc(ident(None, &[inter], fin), |_| true);
            }
        }

        // OSC
        parser.register_osc_str(0, |t, data| {
            t.set_title(data);
            true
        });
        parser.register_osc_str(1, |_t, _data| {
            debug!("icon name ignored");
            true
        });
        parser.register_osc_str(2, |t, data| {
            t.set_title(data);
            true
        });
        parser.register_osc_str(8, |t, data| {
            t.hyperlink(data);
            true
        });
        parser.register_osc_str(52, |t, data| {
            let payload = data.to_string();
            t.events.clipboard.emit(&payload);
            true
        });

        // DCS
        parser.register_dcs_str(ident(None, &[b'$'], b'q'), |t, data, _params| {
            t.request_status_string(data);
            true
        });
    }

    // --- write path ----------------------------------------------------

    /// Feed raw bytes (UTF-8) and process them fully
    pub fn write(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
        while self.process_pending(usize::MAX) {}
    }

    pub fn write_str(&mut self, data: &str) {
        self.write(data.as_bytes());
    }

    /// Queue input without processing; drain with `process_pending`
    pub fn queue(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Process up to `max_bytes` of queued input, returning whether more
    /// remains. Lets a host yield to its event loop between slices.
    pub fn process_pending(&mut self, max_bytes: usize) -> bool {
        let mut budget = max_bytes;
        while !self.pending.is_empty() && budget > 0 {
            let take = WRITE_CHUNK.min(budget).min(self.pending.len());
            let chunk: Vec<u8> = self.pending.drain(..take).collect();
            budget -= take;
            self.codepoints.clear();
            self.decoder.decode(&chunk, &mut self.codepoints);
            self.parser.parse(&mut self.interp, &self.codepoints);
        }
        let buf = self.interp.buf();
        let pos = (buf.x, buf.y);
        self.interp.events.cursor_move.emit(&pos);
        !self.pending.is_empty()
    }

    /// Full reset (user-invoked RIS): parser, decoder, buffers, modes
    pub fn reset(&mut self) {
        self.pending.clear();
        self.decoder.reset();
        self.parser.reset(&mut self.interp);
        self.interp.full_reset();
    }

    /// Resize the grid; retained lines are padded/truncated, cursor and
    /// margins clamp into the new bounds
    pub fn resize(&mut self, cols: usize, rows: usize) -> Result<(), Error> {
        let opts = TerminalOptions {
            cols,
            rows,
            scrollback: self.options.scrollback,
        };
        opts.validate()?;
        self.interp.bufs.resize(cols, rows, &mut self.interp.ext);
        self.options.cols = cols;
        self.options.rows = rows;
        self.interp.events.resize.emit(&(cols, rows));
        Ok(())
    }

    // --- accessors -----------------------------------------------------

    pub fn options(&self) -> &TerminalOptions {
        &self.options
    }

    pub fn buffers(&self) -> &BufferSet {
        &self.interp.bufs
    }

    pub fn active_buffer(&self) -> &Buffer {
        self.interp.bufs.active()
    }

    pub fn modes(&self) -> &Modes {
        &self.interp.modes
    }

    pub fn title(&self) -> &str {
        &self.interp.title
    }

    /// Resolve an OSC 8 link id from a cell to its URI
    pub fn link_uri(&self, url_id: u32) -> Option<&str> {
        self.interp.link_uri(url_id)
    }

    /// Extended attributes referenced by a cell
    pub fn extended_attrs(&self, idx: u32) -> ExtendedAttrs {
        self.interp.ext.get(idx)
    }

    /// Viewport row as trimmed text
    pub fn row_text(&self, y: usize) -> String {
        self.active_buffer().row_text(y)
    }

    /// Whole viewport as text, rows joined with newlines
    pub fn viewport_text(&self) -> String {
        (0..self.active_buffer().rows())
            .map(|y| self.row_text(y))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Scroll the display offset (user scrollback navigation)
    pub fn scroll_display(&mut self, delta: isize) {
        self.interp.bufs.active_mut().scroll_display(delta);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.interp.bufs.active_mut().scroll_to_bottom();
    }

    // --- events ---------------------------------------------------------

    pub fn on_title_change(&mut self, f: impl FnMut(&String) + 'static) {
        self.interp.events.title.subscribe(f);
    }

    pub fn on_bell(&mut self, f: impl FnMut(&()) + 'static) {
        self.interp.events.bell.subscribe(f);
    }

    pub fn on_data(&mut self, f: impl FnMut(&String) + 'static) {
        self.interp.events.data.subscribe(f);
    }

    pub fn on_clipboard(&mut self, f: impl FnMut(&String) + 'static) {
        self.interp.events.clipboard.subscribe(f);
    }

    pub fn on_resize(&mut self, f: impl FnMut(&(usize, usize)) + 'static) {
        self.interp.events.resize.subscribe(f);
    }

    pub fn on_cursor_move(&mut self, f: impl FnMut(&(usize, usize)) + 'static) {
        self.interp.events.cursor_move.subscribe(f);
    }

    pub fn on_buffer_activate(&mut self, f: impl FnMut(&ActiveBuffer) + 'static) {
        self.interp.bufs.on_buffer_activate.subscribe(f);
    }

    // --- snapshots -------------------------------------------------------

    /// Capture the active buffer and terminal-level state
    pub fn snapshot(&self) -> Snapshot {
        let buf = self.active_buffer();
        Snapshot {
            cols: buf.cols(),
            rows: buf.rows(),
            cursor: (buf.x, buf.y),
            scroll_region: (buf.scroll_top, buf.scroll_bottom),
            title: self.interp.title.clone(),
            alternate: self.interp.bufs.is_alt_active(),
            modes: self.interp.modes,
            ybase: buf.ybase,
            lines: Snapshot::capture_lines(buf, |idx| self.interp.ext.get(idx)),
        }
    }

    /// Restore a previously captured snapshot
    pub fn restore_snapshot(&mut self, snap: &Snapshot) -> Result<(), Error> {
        self.reset();
        self.resize(snap.cols, snap.rows)?;
        if snap.alternate {
            self.interp.enter_alt_buffer();
        }
        self.interp.modes = snap.modes;
        self.interp.title = snap.title.clone();

        let rows = snap.rows;
        {
            let interp = &mut self.interp;
            let buf = interp.bufs.active_mut();
            for _ in rows..snap.lines.len() {
                buf.scroll(&Cell::default(), false, &mut interp.ext);
            }
            for (i, line_snap) in snap.lines.iter().enumerate() {
                if interp.bufs.active().line(i).is_none() {
                    break;
                }
                for x in 0..line_snap.cells.len().min(snap.cols) {
                    let cs = &line_snap.cells[x];
                    let mut cell = Cell::default();
                    cell.content = cs.content;
                    cell.fg = cs.fg;
                    cell.bg = cs.bg & !BG_HAS_EXTENDED;
                    cell.set_combined_raw(cs.combined.clone());
                    if cs.bg & BG_HAS_EXTENDED != 0 {
                        if let Some(rec) = cs.extended {
                            cell.bg |= BG_HAS_EXTENDED;
                            cell.ext = interp.ext.alloc(rec);
                        }
                    }
                    if let Some(line) = interp.bufs.active_mut().line_mut(i) {
                        line.set_cell(x, cell, &mut interp.ext);
                    }
                }
                if let Some(line) = interp.bufs.active_mut().line_mut(i) {
                    line.set_wrapped(line_snap.wrapped);
                }
            }
            let buf = interp.bufs.active_mut();
            buf.x = snap.cursor.0.min(snap.cols.saturating_sub(1));
            buf.y = snap.cursor.1.min(snap.rows.saturating_sub(1));
            buf.set_scroll_region(snap.scroll_region.0, snap.scroll_region.1);
        }
        Ok(())
    }

    /// Convenience: capture to a JSON string
    pub fn snapshot_json(&self) -> Result<String, Error> {
        self.snapshot().to_json()
    }

    /// Convenience: restore from a JSON string
    pub fn restore_snapshot_json(&mut self, json: &str) -> Result<(), Error> {
        let snap = Snapshot::from_json(json)?;
        self.restore_snapshot(&snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attrs;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn term(cols: usize, rows: usize) -> Terminal {
        Terminal::new(TerminalOptions {
            cols,
            rows,
            scrollback: 100,
        })
        .unwrap()
    }

    #[test]
    fn test_plain_text() {
        let mut t = term(20, 4);
        t.write_str("Hello");
        assert_eq!(t.row_text(0), "Hello");
        assert_eq!(t.active_buffer().x, 5);
    }

    #[test]
    fn test_crlf_moves_cursor() {
        let mut t = term(20, 4);
        t.write_str("one\r\ntwo");
        assert_eq!(t.row_text(0), "one");
        assert_eq!(t.row_text(1), "two");
        assert_eq!(t.active_buffer().y, 1);
    }

    #[test]
    fn test_wrap_at_right_margin() {
        let mut t = term(5, 3);
        t.write_str("abcdefg");
        assert_eq!(t.row_text(0), "abcde");
        assert_eq!(t.row_text(1), "fg");
        assert!(t.active_buffer().viewport_line(1).unwrap().is_wrapped());
    }

    #[test]
    fn test_cursor_position_sequences() {
        let mut t = term(20, 10);
        t.write_str("\x1b[5;10H");
        assert_eq!(t.active_buffer().y, 4);
        assert_eq!(t.active_buffer().x, 9);
        t.write_str("\x1b[H");
        assert_eq!((t.active_buffer().x, t.active_buffer().y), (0, 0));
    }

    #[test]
    fn test_sgr_red_reset_scenario() {
        let mut t = term(20, 4);
        t.write_str("\x1b[31;41mA\x1b[0mB");
        let line = t.active_buffer().viewport_line(0).unwrap();
        let a = line.cell(0).unwrap();
        assert_eq!(a.attr().fg_color(), Color::Indexed(1));
        assert_eq!(a.attr().bg_color(), Color::Indexed(1));
        let b = line.cell(1).unwrap();
        assert_eq!(b.attr().fg_color(), Color::Default);
        assert_eq!(b.attr().bg_color(), Color::Default);
    }

    #[test]
    fn test_sgr_truecolor_forms() {
        let mut t = term(20, 4);
        t.write_str("\x1b[38;2;255;128;0mA");
        t.write_str("\x1b[38:2:1:2:3mB");
        t.write_str("\x1b[48;5;196mC");
        let line = t.active_buffer().viewport_line(0).unwrap();
        assert_eq!(
            line.cell(0).unwrap().attr().fg_color(),
            Color::Rgb(255, 128, 0)
        );
        assert_eq!(line.cell(1).unwrap().attr().fg_color(), Color::Rgb(1, 2, 3));
        assert_eq!(
            line.cell(2).unwrap().attr().bg_color(),
            Color::Indexed(196)
        );
    }

    #[test]
    fn test_sgr_bold_and_reset_flags() {
        let mut t = term(20, 4);
        t.write_str("\x1b[1;4mA\x1b[22;24mB");
        let line = t.active_buffer().viewport_line(0).unwrap();
        assert!(line.cell(0).unwrap().attr().is_bold());
        assert!(line.cell(0).unwrap().attr().is_underline());
        assert!(!line.cell(1).unwrap().attr().is_bold());
        assert!(!line.cell(1).unwrap().attr().is_underline());
    }

    #[test]
    fn test_curly_underline_extended_attrs() {
        let mut t = term(20, 4);
        t.write_str("\x1b[4:3mA");
        let line = t.active_buffer().viewport_line(0).unwrap();
        let cell = line.cell(0).unwrap();
        assert!(cell.has_extended());
        assert_eq!(
            t.extended_attrs(cell.ext).underline_style,
            UnderlineStyle::Curly
        );
    }

    #[test]
    fn test_extended_attrs_shared_and_cow() {
        let mut t = term(20, 4);
        // two cells share one record, then the style changes for the third
        t.write_str("\x1b[4:3mAB\x1b[4:2mC");
        let line = t.active_buffer().viewport_line(0).unwrap();
        let a = line.cell(0).unwrap();
        let b = line.cell(1).unwrap();
        let c = line.cell(2).unwrap();
        assert_eq!(a.ext, b.ext);
        assert_ne!(a.ext, c.ext);
        assert_eq!(t.extended_attrs(a.ext).underline_style, UnderlineStyle::Curly);
        assert_eq!(t.extended_attrs(c.ext).underline_style, UnderlineStyle::Double);
    }

    #[test]
    fn test_erase_display_keeps_scrollback() {
        let mut t = term(10, 3);
        for i in 0..6 {
            t.write_str(&format!("line{i}\r\n"));
        }
        let kept = t.active_buffer().scrollback_len();
        assert!(kept > 0);
        t.write_str("\x1b[2J");
        assert_eq!(t.active_buffer().scrollback_len(), kept);
        assert_eq!(t.viewport_text(), "\n\n");

        t.write_str("\x1b[3J");
        assert_eq!(t.active_buffer().scrollback_len(), 0);
    }

    #[test]
    fn test_erase_line_modes() {
        let mut t = term(10, 2);
        t.write_str("abcdefghij\x1b[5G");
        t.write_str("\x1b[1K");
        assert_eq!(t.row_text(0), "     fghij");
        t.write_str("\x1b[0K");
        assert_eq!(t.row_text(0), "");
    }

    #[test]
    fn test_scroll_region_full_screen_apps() {
        let mut t = term(10, 5);
        for y in 0..5 {
            t.write_str(&format!("\x1b[{};1Hr{y}", y + 1));
        }
        // restrict to rows 2-4, cursor to region bottom, LF scrolls region
        t.write_str("\x1b[2;4r\x1b[4;1H\n");
        assert_eq!(t.row_text(0), "r0");
        assert_eq!(t.row_text(1), "r2");
        assert_eq!(t.row_text(2), "r3");
        assert_eq!(t.row_text(3), "");
        assert_eq!(t.row_text(4), "r4");
        assert_eq!(t.active_buffer().scrollback_len(), 0);
    }

    #[test]
    fn test_alt_buffer_switch() {
        let mut t = term(10, 3);
        t.write_str("normal");
        t.write_str("\x1b[?1049h");
        assert!(t.buffers().is_alt_active());
        t.write_str("\x1b[Halt");
        assert_eq!(t.row_text(0), "alt");
        t.write_str("\x1b[?1049l");
        assert!(!t.buffers().is_alt_active());
        assert_eq!(t.row_text(0), "normal");
    }

    #[test]
    fn test_title_event() {
        let mut t = term(10, 3);
        let titles = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&titles);
        t.on_title_change(move |title| sink.borrow_mut().push(title.clone()));

        t.write_str("\x1b]0;My Title\x07");
        assert_eq!(&*titles.borrow(), &["My Title".to_string()]);
        assert_eq!(t.title(), "My Title");
    }

    #[test]
    fn test_bell_event() {
        let mut t = term(10, 3);
        let rings = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&rings);
        t.on_bell(move |_| *sink.borrow_mut() += 1);
        t.write_str("a\x07b\x07");
        assert_eq!(*rings.borrow(), 2);
    }

    #[test]
    fn test_cursor_report() {
        let mut t = term(20, 10);
        let replies = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&replies);
        t.on_data(move |d| sink.borrow_mut().push(d.clone()));
        t.write_str("\x1b[3;7H\x1b[6n");
        assert_eq!(&*replies.borrow(), &["\x1b[3;7R".to_string()]);
    }

    #[test]
    fn test_decrqss_reports() {
        let mut t = term(20, 10);
        let replies = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&replies);
        t.on_data(move |d| sink.borrow_mut().push(d.clone()));
        t.write_str("\x1b[3;8r");
        t.write_str("\x1bP$qr\x1b\\");
        t.write_str("\x1bP$qz\x1b\\");
        assert_eq!(
            &*replies.borrow(),
            &["\x1bP1$r3;8r\x1b\\".to_string(), "\x1bP0$r\x1b\\".to_string()]
        );
    }

    #[test]
    fn test_hyperlink_cells() {
        let mut t = term(30, 3);
        t.write_str("\x1b]8;;https://example.com\x07link\x1b]8;;\x07plain");
        let line = t.active_buffer().viewport_line(0).unwrap();
        let linked = line.cell(0).unwrap();
        assert!(linked.has_extended());
        let url_id = t.extended_attrs(linked.ext).url_id;
        assert_eq!(t.link_uri(url_id), Some("https://example.com"));
        let plain = line.cell(4).unwrap();
        assert!(!plain.has_extended());
    }

    #[test]
    fn test_wide_char_and_combining() {
        let mut t = term(10, 3);
        t.write_str("中e\u{301}");
        let line = t.active_buffer().viewport_line(0).unwrap();
        assert_eq!(line.cell(0).unwrap().width(), 2);
        assert_eq!(line.cell(1).unwrap().width(), 0);
        assert!(line.cell(2).unwrap().is_combined());
        assert_eq!(t.row_text(0), "中e\u{301}");
    }

    #[test]
    fn test_wide_char_at_right_edge_wraps() {
        let mut t = term(5, 3);
        t.write_str("abcd中");
        assert_eq!(t.row_text(0), "abcd");
        assert_eq!(t.row_text(1), "中");
        // no orphan continuation cell anywhere
        for y in 0..2 {
            let line = t.active_buffer().viewport_line(y).unwrap();
            for x in 0..line.len() {
                if line.cell(x).unwrap().width() == 0 {
                    assert_eq!(line.cell(x - 1).unwrap().width(), 2);
                }
            }
        }
    }

    #[test]
    fn test_insert_mode() {
        let mut t = term(10, 2);
        t.write_str("abc\x1b[1;1H\x1b[4hX\x1b[4l");
        assert_eq!(t.row_text(0), "Xabc");
    }

    #[test]
    fn test_rep_repeats_last_char() {
        let mut t = term(10, 2);
        t.write_str("x\x1b[3b");
        assert_eq!(t.row_text(0), "xxxx");
    }

    #[test]
    fn test_decaln_fills_screen() {
        let mut t = term(4, 2);
        t.write_str("\x1b#8");
        assert_eq!(t.viewport_text(), "EEEE\nEEEE");
    }

    #[test]
    fn test_full_reset() {
        let mut t = term(10, 3);
        t.write_str("\x1b[31mstuff\x1b]0;title\x07");
        t.write_str("\x1bc");
        assert_eq!(t.viewport_text(), "\n\n");
        assert_eq!(t.title(), "");
        assert_eq!((t.active_buffer().x, t.active_buffer().y), (0, 0));
        t.write_str("z");
        let cell_attr = t
            .active_buffer()
            .viewport_line(0)
            .unwrap()
            .cell(0)
            .unwrap()
            .attr();
        assert_eq!(cell_attr.fg_color(), Color::Default);
    }

    #[test]
    fn test_soft_reset_keeps_content() {
        let mut t = term(10, 3);
        t.write_str("keep\x1b[2;3r\x1b[4h");
        t.write_str("\x1b[!p");
        assert_eq!(t.row_text(0), "keep");
        assert!(!t.modes().insert);
        assert_eq!(t.active_buffer().scroll_top, 0);
        assert_eq!(t.active_buffer().scroll_bottom, 2);
    }

    #[test]
    fn test_resize_emits_event_and_clamps() {
        let mut t = term(10, 3);
        let sizes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&sizes);
        t.on_resize(move |s| sink.borrow_mut().push(*s));
        t.write_str("0123456789");
        t.resize(5, 2).unwrap();
        assert_eq!(&*sizes.borrow(), &[(5, 2)]);
        assert!(t.active_buffer().x < 5);
        assert!(t.resize(0, 2).is_err());
    }

    #[test]
    fn test_queue_and_process_pending() {
        let mut t = term(10, 2);
        t.queue(b"hel");
        t.queue(b"lo");
        assert_eq!(t.row_text(0), "");
        while t.process_pending(2) {}
        assert_eq!(t.row_text(0), "hello");
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut t = term(10, 3);
        t.write_str("\x1b[31m中\x1b[0m ok\r\nsecond\x1b]0;snap\x07");
        let json = t.snapshot_json().unwrap();

        let mut restored = term(10, 3);
        restored.restore_snapshot_json(&json).unwrap();
        assert_eq!(restored.viewport_text(), t.viewport_text());
        assert_eq!(restored.title(), "snap");
        let orig_cell = t.active_buffer().viewport_line(0).unwrap().cell(0).unwrap();
        let rest_cell = restored
            .active_buffer()
            .viewport_line(0)
            .unwrap()
            .cell(0)
            .unwrap();
        assert_eq!(orig_cell.content, rest_cell.content);
        assert_eq!(orig_cell.fg, rest_cell.fg);
        assert_eq!(orig_cell.bg & !attrs::BG_HAS_EXTENDED, rest_cell.bg & !attrs::BG_HAS_EXTENDED);
    }

    #[test]
    fn test_example_scenario_from_docs() {
        let mut t = term(80, 24);
        t.write_str("\x1b[31mHello\x1b[0m World\r\n");
        assert_eq!(t.row_text(0), "Hello World");
        let line = t.active_buffer().viewport_line(0).unwrap();
        for x in 0..5 {
            assert_eq!(line.cell(x).unwrap().attr().fg_color(), Color::Indexed(1));
        }
        for x in 5..11 {
            assert_eq!(line.cell(x).unwrap().attr().fg_color(), Color::Default);
        }
        assert_eq!((t.active_buffer().x, t.active_buffer().y), (0, 1));
    }
}
