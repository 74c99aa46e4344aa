//! Escape sequence parsing
//!
//! A table-driven state machine after the VT500 parser model
//! (<https://vt100.net/emu/dec_ansi_parser>), split the way the grammar
//! splits: the machine itself, parameter storage, and the OSC/DCS string
//! sub-parsers with their handler registries.

pub mod dcs;
pub mod machine;
pub mod osc;
pub mod params;
pub mod table;
pub mod utf8;

pub use dcs::{DcsHandler, DcsParser, DcsStringHandler};
pub use machine::{ident, ident_to_string, Parser};
pub use osc::{OscHandler, OscParser, OscStringHandler};
pub use params::Params;
pub use table::{ParserAction, ParserState};
pub use utf8::Utf8Decoder;

/// Maximum accepted OSC/DCS payload size in bytes; larger payloads abort
/// the single affected command and the stream continues undisturbed
pub const PAYLOAD_LIMIT: usize = 10_000_000;

/// Append UTF-32 codepoints to a string, replacing invalid scalars
pub fn utf32_to_string(data: &[u32], out: &mut String) {
    for &code in data {
        out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
    }
}
