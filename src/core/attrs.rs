//! Cell attributes
//!
//! SGR state is packed into two `u32` words per cell. Rarely used
//! properties (underline style/color, hyperlink id) live out of line in an
//! arena of extended records referenced by index, so the common case stays
//! at three words per cell.
//!
//! Foreground word:
//! - bits 0..=23   color payload (RGB, or palette index in the low byte)
//! - bits 24..=25  color mode: default / palette-16 / palette-256 / RGB
//! - bit 26 inverse, 27 bold, 28 underline, 29 blink, 30 invisible,
//!   31 strikethrough
//!
//! Background word: same color layout;
//! - bit 26 italic, 27 dim, 28 has-extended, 29 protected, 30 overline

use serde::{Deserialize, Serialize};

/// RGB payload mask of an attribute word
pub const RGB_MASK: u32 = 0xFF_FFFF;
/// Palette index mask (low byte)
pub const PCOLOR_MASK: u32 = 0xFF;

/// Color mode mask (bits 24..=25)
pub const CM_MASK: u32 = 0x300_0000;
pub const CM_DEFAULT: u32 = 0;
pub const CM_P16: u32 = 0x100_0000;
pub const CM_P256: u32 = 0x200_0000;
pub const CM_RGB: u32 = 0x300_0000;

/// Foreground flag bits
pub const FG_INVERSE: u32 = 1 << 26;
pub const FG_BOLD: u32 = 1 << 27;
pub const FG_UNDERLINE: u32 = 1 << 28;
pub const FG_BLINK: u32 = 1 << 29;
pub const FG_INVISIBLE: u32 = 1 << 30;
pub const FG_STRIKETHROUGH: u32 = 1 << 31;

/// Background flag bits
pub const BG_ITALIC: u32 = 1 << 26;
pub const BG_DIM: u32 = 1 << 27;
pub const BG_HAS_EXTENDED: u32 = 1 << 28;
pub const BG_PROTECTED: u32 = 1 << 29;
pub const BG_OVERLINE: u32 = 1 << 30;

/// Color of a cell or the pen, unpacked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Color {
    /// Default terminal foreground or background
    #[default]
    Default,
    /// Palette color (0-15 standard, 16-255 extended)
    Indexed(u8),
    /// 24-bit RGB color
    Rgb(u8, u8, u8),
}

/// Underline rendering style carried in extended attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum UnderlineStyle {
    #[default]
    None = 0,
    Single = 1,
    Double = 2,
    Curly = 3,
    Dotted = 4,
    Dashed = 5,
}

impl UnderlineStyle {
    /// Map an SGR 4:x sub-parameter to a style, `None` for unknown values
    pub fn from_param(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            3 => Some(Self::Curly),
            4 => Some(Self::Dotted),
            5 => Some(Self::Dashed),
            _ => None,
        }
    }
}

/// The two packed attribute words of a cell or the current pen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeData {
    pub fg: u32,
    pub bg: u32,
}

impl AttributeData {
    pub fn is_bold(&self) -> bool {
        self.fg & FG_BOLD != 0
    }
    pub fn is_dim(&self) -> bool {
        self.bg & BG_DIM != 0
    }
    pub fn is_italic(&self) -> bool {
        self.bg & BG_ITALIC != 0
    }
    pub fn is_underline(&self) -> bool {
        self.fg & FG_UNDERLINE != 0
    }
    pub fn is_blink(&self) -> bool {
        self.fg & FG_BLINK != 0
    }
    pub fn is_inverse(&self) -> bool {
        self.fg & FG_INVERSE != 0
    }
    pub fn is_invisible(&self) -> bool {
        self.fg & FG_INVISIBLE != 0
    }
    pub fn is_strikethrough(&self) -> bool {
        self.fg & FG_STRIKETHROUGH != 0
    }
    pub fn is_overline(&self) -> bool {
        self.bg & BG_OVERLINE != 0
    }
    pub fn is_protected(&self) -> bool {
        self.bg & BG_PROTECTED != 0
    }
    pub fn has_extended(&self) -> bool {
        self.bg & BG_HAS_EXTENDED != 0
    }

    pub fn fg_color(&self) -> Color {
        Self::unpack_color(self.fg)
    }

    pub fn bg_color(&self) -> Color {
        Self::unpack_color(self.bg)
    }

    pub fn set_fg_color(&mut self, color: Color) {
        self.fg = Self::pack_color(self.fg, color);
    }

    pub fn set_bg_color(&mut self, color: Color) {
        self.bg = Self::pack_color(self.bg, color);
    }

    fn unpack_color(word: u32) -> Color {
        match word & CM_MASK {
            CM_P16 | CM_P256 => Color::Indexed((word & PCOLOR_MASK) as u8),
            CM_RGB => Color::Rgb(
                ((word >> 16) & 0xFF) as u8,
                ((word >> 8) & 0xFF) as u8,
                (word & 0xFF) as u8,
            ),
            _ => Color::Default,
        }
    }

    fn pack_color(word: u32, color: Color) -> u32 {
        let flags = word & !(CM_MASK | RGB_MASK);
        match color {
            Color::Default => flags,
            Color::Indexed(i) if i < 16 => flags | CM_P16 | i as u32,
            Color::Indexed(i) => flags | CM_P256 | i as u32,
            Color::Rgb(r, g, b) => {
                flags | CM_RGB | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
            }
        }
    }
}

/// Out-of-line attributes referenced from a cell's background word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtendedAttrs {
    /// Underline rendering style
    pub underline_style: UnderlineStyle,
    /// Underline color, packed like a foreground word's color bits
    /// (0 = follow the cell's foreground)
    pub underline_color: u32,
    /// Hyperlink id from OSC 8 (0 = no link)
    pub url_id: u32,
}

impl ExtendedAttrs {
    /// Whether all properties are at their defaults (no arena slot needed)
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn underline_color(&self) -> Color {
        AttributeData::unpack_color(self.underline_color)
    }

    pub fn set_underline_color(&mut self, color: Color) {
        self.underline_color = AttributeData::pack_color(0, color);
    }
}

/// Arena of extended-attribute records with explicit reference counts.
///
/// Cells referencing a record share one slot; the slot is reclaimed onto a
/// free list when the last referencing cell is overwritten or cleared.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ExtendedAttrStore {
    records: Vec<ExtendedAttrs>,
    refcounts: Vec<u32>,
    free: Vec<u32>,
}

impl ExtendedAttrStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record with an initial reference count of one
    pub fn alloc(&mut self, record: ExtendedAttrs) -> u32 {
        if let Some(idx) = self.free.pop() {
            self.records[idx as usize] = record;
            self.refcounts[idx as usize] = 1;
            idx
        } else {
            self.records.push(record);
            self.refcounts.push(1);
            (self.records.len() - 1) as u32
        }
    }

    pub fn get(&self, idx: u32) -> ExtendedAttrs {
        self.records[idx as usize]
    }

    pub fn incref(&mut self, idx: u32) {
        debug_assert!(self.refcounts[idx as usize] > 0, "incref on freed slot");
        self.refcounts[idx as usize] += 1;
    }

    pub fn decref(&mut self, idx: u32) {
        let count = &mut self.refcounts[idx as usize];
        debug_assert!(*count > 0, "decref on freed slot");
        *count -= 1;
        if *count == 0 {
            self.free.push(idx);
        }
    }

    /// Update the record a cell references, copy-on-write.
    ///
    /// Returns the index the caller must store back: unchanged when the
    /// record was exclusively owned, a fresh slot when it was shared.
    pub fn update(&mut self, idx: u32, record: ExtendedAttrs) -> u32 {
        if self.refcounts[idx as usize] == 1 {
            self.records[idx as usize] = record;
            idx
        } else {
            self.refcounts[idx as usize] -= 1;
            self.alloc(record)
        }
    }

    /// Number of live (referenced) records
    pub fn live(&self) -> usize {
        self.refcounts.iter().filter(|&&c| c > 0).count()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.refcounts.clear();
        self.free.clear();
    }
}
