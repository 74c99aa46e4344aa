//! VT500 transition table
//!
//! Table-driven core of the parser: 16 states x 256 input classes, each
//! entry packing an action (high nibble) and the next state (low nibble).
//! The layout follows the DEC ANSI-compatible parser described at
//! <https://vt100.net/emu/dec_ansi_parser>, with the common xterm
//! extensions (BEL-terminated OSC, colon sub-parameters).
//!
//! Codepoints above 0x9F never take part in sequence grammar; they are
//! collapsed onto a single pseudo input class before lookup.

/// Pseudo input class for all codepoints above 0x9F
pub const NON_ASCII_PRINTABLE: u32 = 0xA0;

/// Parser states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParserState {
    Ground = 0,
    Escape = 1,
    EscapeIntermediate = 2,
    CsiEntry = 3,
    CsiParam = 4,
    CsiIntermediate = 5,
    CsiIgnore = 6,
    SosPmApcString = 7,
    OscString = 8,
    DcsEntry = 9,
    DcsParam = 10,
    DcsIntermediate = 11,
    DcsIgnore = 12,
    DcsPassthrough = 13,
}

impl ParserState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Ground,
            1 => Self::Escape,
            2 => Self::EscapeIntermediate,
            3 => Self::CsiEntry,
            4 => Self::CsiParam,
            5 => Self::CsiIntermediate,
            6 => Self::CsiIgnore,
            7 => Self::SosPmApcString,
            8 => Self::OscString,
            9 => Self::DcsEntry,
            10 => Self::DcsParam,
            11 => Self::DcsIntermediate,
            12 => Self::DcsIgnore,
            _ => Self::DcsPassthrough,
        }
    }
}

/// Actions attached to transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParserAction {
    Ignore = 0,
    Error = 1,
    Print = 2,
    Execute = 3,
    OscStart = 4,
    OscPut = 5,
    OscEnd = 6,
    CsiDispatch = 7,
    Param = 8,
    Collect = 9,
    EscDispatch = 10,
    Clear = 11,
    DcsHook = 12,
    DcsPut = 13,
    DcsUnhook = 14,
}

impl ParserAction {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Ignore,
            1 => Self::Error,
            2 => Self::Print,
            3 => Self::Execute,
            4 => Self::OscStart,
            5 => Self::OscPut,
            6 => Self::OscEnd,
            7 => Self::CsiDispatch,
            8 => Self::Param,
            9 => Self::Collect,
            10 => Self::EscDispatch,
            11 => Self::Clear,
            12 => Self::DcsHook,
            13 => Self::DcsPut,
            _ => Self::DcsUnhook,
        }
    }
}

const STATE_COUNT: usize = 16;
const TABLE_SIZE: usize = STATE_COUNT * 256;

/// Packed action/next-state table
pub struct TransitionTable {
    table: [u8; TABLE_SIZE],
}

impl TransitionTable {
    fn entry(action: ParserAction, next: ParserState) -> u8 {
        (action as u8) << 4 | next as u8
    }

    fn set_default(&mut self, action: ParserAction, next: ParserState) {
        self.table.fill(Self::entry(action, next));
    }

    fn add(&mut self, code: u32, state: ParserState, action: ParserAction, next: ParserState) {
        self.table[(state as usize) << 8 | code as usize] = Self::entry(action, next);
    }

    fn add_range(
        &mut self,
        codes: std::ops::Range<u32>,
        state: ParserState,
        action: ParserAction,
        next: ParserState,
    ) {
        for code in codes {
            self.add(code, state, action, next);
        }
    }

    fn add_many(
        &mut self,
        codes: &[u32],
        state: ParserState,
        action: ParserAction,
        next: ParserState,
    ) {
        for &code in codes {
            self.add(code, state, action, next);
        }
    }

    /// Look up the transition for `code` in `state`; codepoints above the
    /// table range collapse onto the non-ASCII-printable class
    #[inline]
    pub fn transition(&self, state: ParserState, code: u32) -> (ParserAction, ParserState) {
        let class = if code < NON_ASCII_PRINTABLE {
            code
        } else {
            NON_ASCII_PRINTABLE
        };
        let entry = self.table[(state as usize) << 8 | class as usize];
        (ParserAction::from_u8(entry >> 4), ParserState::from_u8(entry & 0x0F))
    }
}

/// Build the VT500-compatible table
pub fn vt500_table() -> TransitionTable {
    use ParserAction as A;
    use ParserState as S;

    let mut t = TransitionTable {
        table: [0; TABLE_SIZE],
    };

    const ALL_STATES: [S; 14] = [
        S::Ground,
        S::Escape,
        S::EscapeIntermediate,
        S::CsiEntry,
        S::CsiParam,
        S::CsiIntermediate,
        S::CsiIgnore,
        S::SosPmApcString,
        S::OscString,
        S::DcsEntry,
        S::DcsParam,
        S::DcsIntermediate,
        S::DcsIgnore,
        S::DcsPassthrough,
    ];

    // C0 codes executed in-place (ESC, CAN and SUB excluded)
    let executables: Vec<u32> = (0x00..0x18).chain([0x19]).chain(0x1C..0x20).collect();

    // invalid transitions fail soft back to ground
    t.set_default(A::Error, S::Ground);

    t.add_range(0x20..0x7F, S::Ground, A::Print, S::Ground);

    // anywhere rules
    for state in ALL_STATES {
        t.add_many(&[0x18, 0x1A, 0x99, 0x9A], state, A::Execute, S::Ground);
        t.add_range(0x80..0x90, state, A::Execute, S::Ground);
        t.add_range(0x90..0x98, state, A::Execute, S::Ground);
        t.add(0x9C, state, A::Ignore, S::Ground); // ST
        t.add(0x1B, state, A::Clear, S::Escape); // ESC
        t.add(0x9D, state, A::OscStart, S::OscString); // OSC
        t.add_many(&[0x98, 0x9E, 0x9F], state, A::Ignore, S::SosPmApcString);
        t.add(0x9B, state, A::Clear, S::CsiEntry); // CSI
        t.add(0x90, state, A::Clear, S::DcsEntry); // DCS
    }

    // executables and DEL per state
    t.add_many(&executables, S::Ground, A::Execute, S::Ground);
    t.add_many(&executables, S::Escape, A::Execute, S::Escape);
    t.add(0x7F, S::Escape, A::Ignore, S::Escape);
    t.add_many(&executables, S::OscString, A::Ignore, S::OscString);
    t.add_many(&executables, S::CsiEntry, A::Execute, S::CsiEntry);
    t.add(0x7F, S::CsiEntry, A::Ignore, S::CsiEntry);
    t.add_many(&executables, S::CsiParam, A::Execute, S::CsiParam);
    t.add(0x7F, S::CsiParam, A::Ignore, S::CsiParam);
    t.add_many(&executables, S::CsiIgnore, A::Execute, S::CsiIgnore);
    t.add_many(&executables, S::CsiIntermediate, A::Execute, S::CsiIntermediate);
    t.add(0x7F, S::CsiIntermediate, A::Ignore, S::CsiIntermediate);
    t.add_many(&executables, S::EscapeIntermediate, A::Execute, S::EscapeIntermediate);
    t.add(0x7F, S::EscapeIntermediate, A::Ignore, S::EscapeIntermediate);

    // OSC
    t.add(0x5D, S::Escape, A::OscStart, S::OscString);
    t.add_range(0x20..0x7F, S::OscString, A::OscPut, S::OscString);
    t.add(0x7F, S::OscString, A::OscPut, S::OscString);
    t.add_many(&[0x9C, 0x1B, 0x18, 0x1A, 0x07], S::OscString, A::OscEnd, S::Ground);
    t.add_range(0x1C..0x20, S::OscString, A::Ignore, S::OscString);

    // SOS/PM/APC swallow everything up to ST
    t.add_many(&[0x58, 0x5E, 0x5F], S::Escape, A::Ignore, S::SosPmApcString);
    t.add_range(0x20..0x7F, S::SosPmApcString, A::Ignore, S::SosPmApcString);
    t.add_many(&executables, S::SosPmApcString, A::Ignore, S::SosPmApcString);
    t.add(0x9C, S::SosPmApcString, A::Ignore, S::Ground);
    t.add(0x7F, S::SosPmApcString, A::Ignore, S::SosPmApcString);

    // CSI
    t.add(0x5B, S::Escape, A::Clear, S::CsiEntry);
    t.add_range(0x40..0x7F, S::CsiEntry, A::CsiDispatch, S::Ground);
    t.add_range(0x30..0x3C, S::CsiEntry, A::Param, S::CsiParam);
    t.add_many(&[0x3C, 0x3D, 0x3E, 0x3F], S::CsiEntry, A::Collect, S::CsiParam);
    t.add_range(0x30..0x3C, S::CsiParam, A::Param, S::CsiParam);
    t.add_range(0x40..0x7F, S::CsiParam, A::CsiDispatch, S::Ground);
    t.add_many(&[0x3C, 0x3D, 0x3E, 0x3F], S::CsiParam, A::Ignore, S::CsiIgnore);
    t.add_range(0x20..0x40, S::CsiIgnore, A::Ignore, S::CsiIgnore);
    t.add(0x7F, S::CsiIgnore, A::Ignore, S::CsiIgnore);
    t.add_range(0x40..0x7F, S::CsiIgnore, A::Ignore, S::Ground);
    t.add_range(0x20..0x30, S::CsiEntry, A::Collect, S::CsiIntermediate);
    t.add_range(0x20..0x30, S::CsiIntermediate, A::Collect, S::CsiIntermediate);
    t.add_range(0x30..0x40, S::CsiIntermediate, A::Ignore, S::CsiIgnore);
    t.add_range(0x40..0x7F, S::CsiIntermediate, A::CsiDispatch, S::Ground);
    t.add_range(0x20..0x30, S::CsiParam, A::Collect, S::CsiIntermediate);

    // ESC intermediates and dispatches
    t.add_range(0x20..0x30, S::Escape, A::Collect, S::EscapeIntermediate);
    t.add_range(0x20..0x30, S::EscapeIntermediate, A::Collect, S::EscapeIntermediate);
    t.add_range(0x30..0x7F, S::EscapeIntermediate, A::EscDispatch, S::Ground);
    t.add_range(0x30..0x50, S::Escape, A::EscDispatch, S::Ground);
    t.add_range(0x51..0x58, S::Escape, A::EscDispatch, S::Ground);
    t.add_many(&[0x59, 0x5A, 0x5C], S::Escape, A::EscDispatch, S::Ground);
    t.add_range(0x60..0x7F, S::Escape, A::EscDispatch, S::Ground);

    // DCS
    t.add(0x50, S::Escape, A::Clear, S::DcsEntry);
    t.add_many(&executables, S::DcsEntry, A::Ignore, S::DcsEntry);
    t.add(0x7F, S::DcsEntry, A::Ignore, S::DcsEntry);
    t.add_range(0x1C..0x20, S::DcsEntry, A::Ignore, S::DcsEntry);
    t.add_range(0x20..0x30, S::DcsEntry, A::Collect, S::DcsIntermediate);
    t.add_range(0x30..0x3C, S::DcsEntry, A::Param, S::DcsParam);
    t.add_many(&[0x3C, 0x3D, 0x3E, 0x3F], S::DcsEntry, A::Collect, S::DcsParam);
    t.add_many(&executables, S::DcsIgnore, A::Ignore, S::DcsIgnore);
    t.add_range(0x20..0x80, S::DcsIgnore, A::Ignore, S::DcsIgnore);
    t.add_range(0x1C..0x20, S::DcsIgnore, A::Ignore, S::DcsIgnore);
    t.add_many(&executables, S::DcsParam, A::Ignore, S::DcsParam);
    t.add(0x7F, S::DcsParam, A::Ignore, S::DcsParam);
    t.add_range(0x1C..0x20, S::DcsParam, A::Ignore, S::DcsParam);
    t.add_range(0x30..0x3C, S::DcsParam, A::Param, S::DcsParam);
    t.add_many(&[0x3C, 0x3D, 0x3E, 0x3F], S::DcsParam, A::Ignore, S::DcsIgnore);
    t.add_range(0x20..0x30, S::DcsParam, A::Collect, S::DcsIntermediate);
    t.add_many(&executables, S::DcsIntermediate, A::Ignore, S::DcsIntermediate);
    t.add(0x7F, S::DcsIntermediate, A::Ignore, S::DcsIntermediate);
    t.add_range(0x1C..0x20, S::DcsIntermediate, A::Ignore, S::DcsIntermediate);
    t.add_range(0x20..0x30, S::DcsIntermediate, A::Collect, S::DcsIntermediate);
    t.add_range(0x30..0x40, S::DcsIntermediate, A::Ignore, S::DcsIgnore);
    t.add_range(0x40..0x7F, S::DcsIntermediate, A::DcsHook, S::DcsPassthrough);
    t.add_range(0x40..0x7F, S::DcsParam, A::DcsHook, S::DcsPassthrough);
    t.add_range(0x40..0x7F, S::DcsEntry, A::DcsHook, S::DcsPassthrough);
    t.add_many(&executables, S::DcsPassthrough, A::DcsPut, S::DcsPassthrough);
    t.add_range(0x20..0x7F, S::DcsPassthrough, A::DcsPut, S::DcsPassthrough);
    t.add(0x7F, S::DcsPassthrough, A::Ignore, S::DcsPassthrough);
    t.add_many(&[0x1B, 0x9C, 0x18, 0x1A], S::DcsPassthrough, A::DcsUnhook, S::Ground);

    // unicode handling per state
    t.add(NON_ASCII_PRINTABLE, S::Ground, A::Print, S::Ground);
    t.add(NON_ASCII_PRINTABLE, S::OscString, A::OscPut, S::OscString);
    t.add(NON_ASCII_PRINTABLE, S::CsiIgnore, A::Ignore, S::CsiIgnore);
    t.add(NON_ASCII_PRINTABLE, S::DcsIgnore, A::Ignore, S::DcsIgnore);
    t.add(NON_ASCII_PRINTABLE, S::DcsPassthrough, A::DcsPut, S::DcsPassthrough);

    t
}
