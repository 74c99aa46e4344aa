//! Terminal mode flags
//!
//! Set/reset via SM/RM (CSI h / CSI l) and their DEC private variants.

use serde::{Deserialize, Serialize};

/// Terminal mode flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modes {
    /// Insert mode (IRM, mode 4): printed characters shift existing cells
    pub insert: bool,
    /// Line feed/new line mode (LNM, mode 20): LF implies CR
    pub linefeed: bool,
    /// Application cursor keys (DECCKM, ?1)
    pub application_cursor: bool,
    /// Origin mode (DECOM, ?6): cursor addressing relative to scroll region
    pub origin: bool,
    /// Autowrap (DECAWM, ?7)
    pub wraparound: bool,
    /// Cursor visible (DECTCEM, ?25)
    pub cursor_visible: bool,
    /// Bracketed paste (?2004)
    pub bracketed_paste: bool,
    /// Application keypad (DECKPAM / DECKPNM)
    pub application_keypad: bool,
    /// Reverse video (DECSCNM, ?5)
    pub reverse_video: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            insert: false,
            linefeed: false,
            application_cursor: false,
            origin: false,
            wraparound: true,
            cursor_visible: true,
            bracketed_paste: false,
            application_keypad: false,
            reverse_video: false,
        }
    }
}

impl Modes {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
