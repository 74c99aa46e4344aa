//! Escape sequence parser
//!
//! Table-driven state machine over UTF-32 codepoints, after the DEC
//! ANSI-compatible parser model. The machine owns no terminal semantics:
//! it classifies input and dispatches to registered handlers, keyed by the
//! sequence identifier (prefix/intermediates/final byte packed into a
//! `u32`). Multiple handlers may share an identifier; dispatch tries the
//! most recently registered first and stops at the first returning true.
//! Unhandled sequences hit a debug log, never an error: the byte stream is
//! untrusted and must not be able to stop processing.
//!
//! Parser state persists across `parse` calls, so sequences may span
//! arbitrary chunk boundaries transparently.

use std::collections::HashMap;

use tracing::debug;

use super::dcs::{DcsHandler, DcsParser, DcsStringHandler};
use super::osc::{OscHandler, OscParser, OscStringHandler};
use super::params::Params;
use super::table::{vt500_table, ParserAction, ParserState, TransitionTable, NON_ASCII_PRINTABLE};

pub type PrintHandler<C> = Box<dyn FnMut(&mut C, &[u32])>;
pub type ExecuteHandler<C> = Box<dyn FnMut(&mut C)>;
pub type CsiHandler<C> = Box<dyn FnMut(&mut C, &Params) -> bool>;
pub type EscHandler<C> = Box<dyn FnMut(&mut C) -> bool>;

/// Pack a sequence identifier from its prefix byte (`?`, `>`, `<`, `=`),
/// intermediate bytes and final byte.
///
/// Panics on identifiers outside the grammar; registering an invalid
/// identifier is a programmer error, not stream input.
pub fn ident(prefix: Option<u8>, intermediates: &[u8], final_byte: u8) -> u32 {
    let mut res: u32 = 0;
    if let Some(p) = prefix {
        assert!((0x3C..=0x3F).contains(&p), "prefix out of range: {p:#x}");
        res = p as u32;
    }
    assert!(intermediates.len() <= 2, "at most two intermediates");
    for &i in intermediates {
        assert!((0x20..=0x2F).contains(&i), "intermediate out of range: {i:#x}");
        res = res << 8 | i as u32;
    }
    assert!((0x30..=0x7E).contains(&final_byte), "final byte out of range");
    res << 8 | final_byte as u32
}

/// Render an identifier for log output ("?25h", "$q", "m")
pub fn ident_to_string(mut id: u32) -> String {
    let mut bytes = Vec::new();
    while id > 0 {
        bytes.push((id & 0xFF) as u8);
        id >>= 8;
    }
    bytes.reverse();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// The escape sequence parser, generic over the handler context `C`
/// (the terminal interpreter in production, test probes elsewhere)
pub struct Parser<C> {
    table: TransitionTable,
    state: ParserState,
    params: Params,
    collect: u32,
    print_handler: Option<PrintHandler<C>>,
    execute_handlers: HashMap<u8, ExecuteHandler<C>>,
    csi_handlers: HashMap<u32, Vec<CsiHandler<C>>>,
    esc_handlers: HashMap<u32, Vec<EscHandler<C>>>,
    osc: OscParser<C>,
    dcs: DcsParser<C>,
}

impl<C: 'static> Parser<C> {
    pub fn new() -> Self {
        let mut parser = Self {
            table: vt500_table(),
            state: ParserState::Ground,
            params: Params::new(),
            collect: 0,
            print_handler: None,
            execute_handlers: HashMap::new(),
            csi_handlers: HashMap::new(),
            esc_handlers: HashMap::new(),
            osc: OscParser::new(),
            dcs: DcsParser::new(),
        };
        parser.params.add_param(0);
        // swallow 7-bit ST (ESC \) so string terminators stay silent
        parser.register_esc(ident(None, &[], b'\\'), |_| true);
        parser
    }

    pub fn state_is_ground(&self) -> bool {
        self.state == ParserState::Ground
    }

    // --- handler registration ------------------------------------------

    pub fn set_print_handler(&mut self, handler: impl FnMut(&mut C, &[u32]) + 'static) {
        self.print_handler = Some(Box::new(handler));
    }

    pub fn set_execute_handler(&mut self, code: u8, handler: impl FnMut(&mut C) + 'static) {
        self.execute_handlers.insert(code, Box::new(handler));
    }

    /// Register a CSI handler; later registrations for the same identifier
    /// take precedence
    pub fn register_csi(
        &mut self,
        ident: u32,
        handler: impl FnMut(&mut C, &Params) -> bool + 'static,
    ) {
        self.csi_handlers
            .entry(ident)
            .or_default()
            .push(Box::new(handler));
    }

    pub fn register_esc(&mut self, ident: u32, handler: impl FnMut(&mut C) -> bool + 'static) {
        self.esc_handlers
            .entry(ident)
            .or_default()
            .push(Box::new(handler));
    }

    pub fn register_osc(&mut self, id: i32, handler: Box<dyn OscHandler<C>>) {
        self.osc.register(id, handler);
    }

    /// Register a buffering string handler for an OSC number
    pub fn register_osc_str(
        &mut self,
        id: i32,
        handler: impl FnMut(&mut C, &str) -> bool + 'static,
    ) {
        self.osc.register(id, Box::new(OscStringHandler::new(handler)));
    }

    pub fn register_dcs(&mut self, ident: u32, handler: Box<dyn DcsHandler<C>>) {
        self.dcs.register(ident, handler);
    }

    /// Register a buffering string handler for a DCS identifier
    pub fn register_dcs_str(
        &mut self,
        ident: u32,
        handler: impl FnMut(&mut C, &str, &Params) -> bool + 'static,
    ) {
        self.dcs.register(ident, Box::new(DcsStringHandler::new(handler)));
    }

    // --- lifecycle -----------------------------------------------------

    /// Back to ground, aborting any partially collected sequence
    pub fn reset(&mut self, ctx: &mut C) {
        self.state = ParserState::Ground;
        self.osc.reset(ctx);
        self.dcs.reset(ctx);
        self.clear_sequence();
    }

    fn clear_sequence(&mut self) {
        self.params.reset();
        self.params.add_param(0);
        self.collect = 0;
    }

    // --- main loop -----------------------------------------------------

    /// Process a chunk of UTF-32 codepoints
    pub fn parse(&mut self, ctx: &mut C, data: &[u32]) {
        let len = data.len();
        let mut i = 0;
        while i < len {
            let mut code = data[i];
            let (action, next) = self.table.transition(self.state, code);
            let mut next_state = next;

            match action {
                ParserAction::Print => {
                    // batch the whole printable run into one handler call
                    let mut j = i + 1;
                    while j < len {
                        code = data[j];
                        if code < 0x20 || (code > 0x7E && code < NON_ASCII_PRINTABLE) {
                            break;
                        }
                        j += 1;
                    }
                    if let Some(handler) = self.print_handler.as_mut() {
                        handler(ctx, &data[i..j]);
                    }
                    i = j - 1;
                }
                ParserAction::Execute => {
                    match self.execute_handlers.get_mut(&(code as u8)) {
                        Some(handler) => handler(ctx),
                        None => debug!(code, "unhandled control code"),
                    }
                }
                ParserAction::Ignore => {}
                ParserAction::Error => {
                    // invalid transition: fail soft, the table already
                    // routed us back to ground
                    debug!(code, state = ?self.state, "parser error transition");
                }
                ParserAction::CsiDispatch => {
                    let id = self.collect << 8 | code;
                    match self.csi_handlers.get_mut(&id) {
                        Some(handlers) => {
                            let handled = handlers
                                .iter_mut()
                                .rev()
                                .any(|handler| handler(ctx, &self.params));
                            if !handled {
                                debug!(ident = %ident_to_string(id), "CSI not handled");
                            }
                        }
                        None => debug!(ident = %ident_to_string(id), "unknown CSI"),
                    }
                }
                ParserAction::Param => {
                    // inner loop: digits, ';' and ':'
                    loop {
                        match code {
                            0x3B => self.params.add_param(0),
                            0x3A => self.params.add_sub_param(-1),
                            _ => self.params.add_digit((code - 0x30) as u8),
                        }
                        i += 1;
                        if i >= len {
                            break;
                        }
                        code = data[i];
                        if !(0x30..0x3C).contains(&code) {
                            break;
                        }
                    }
                    i -= 1;
                }
                ParserAction::Collect => {
                    self.collect = self.collect << 8 | code;
                }
                ParserAction::EscDispatch => {
                    let id = self.collect << 8 | code;
                    match self.esc_handlers.get_mut(&id) {
                        Some(handlers) => {
                            let handled = handlers.iter_mut().rev().any(|handler| handler(ctx));
                            if !handled {
                                debug!(ident = %ident_to_string(id), "ESC not handled");
                            }
                        }
                        None => debug!(ident = %ident_to_string(id), "unknown ESC"),
                    }
                }
                ParserAction::Clear => self.clear_sequence(),
                ParserAction::DcsHook => {
                    let id = self.collect << 8 | code;
                    self.dcs.hook(ctx, id, &self.params);
                }
                ParserAction::DcsPut => {
                    let mut j = i + 1;
                    while j < len {
                        code = data[j];
                        if code == 0x18
                            || code == 0x1A
                            || code == 0x1B
                            || code == 0x7F
                            || (code > 0x7F && code < NON_ASCII_PRINTABLE)
                        {
                            break;
                        }
                        j += 1;
                    }
                    self.dcs.put(&data[i..j]);
                    i = j - 1;
                }
                ParserAction::DcsUnhook => {
                    self.dcs.unhook(ctx, code != 0x18 && code != 0x1A);
                    if code == 0x1B {
                        // ESC both terminates the string and opens a new
                        // escape sequence
                        next_state = ParserState::Escape;
                    }
                    self.clear_sequence();
                }
                ParserAction::OscStart => self.osc.start(ctx),
                ParserAction::OscPut => {
                    let mut j = i + 1;
                    while j < len {
                        code = data[j];
                        if code < 0x20 || (code > 0x7F && code < NON_ASCII_PRINTABLE) {
                            break;
                        }
                        j += 1;
                    }
                    self.osc.put(&data[i..j]);
                    i = j - 1;
                }
                ParserAction::OscEnd => {
                    self.osc.end(ctx, code != 0x18 && code != 0x1A);
                    if code == 0x1B {
                        next_state = ParserState::Escape;
                    }
                    self.clear_sequence();
                }
            }

            self.state = next_state;
            i += 1;
        }
    }
}

impl<C: 'static> Default for Parser<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Recorded dispatches for assertions
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Ev {
        Print(String),
        Exec(u8),
        Csi(String, Vec<i32>),
        Esc(String),
        Osc(i32, String),
        Dcs(String, Vec<i32>),
    }

    #[derive(Default)]
    struct Probe {
        events: Vec<Ev>,
    }

    fn probe_parser() -> Parser<Probe> {
        let mut parser: Parser<Probe> = Parser::new();
        parser.set_print_handler(|ctx, data| {
            let text: String = data
                .iter()
                .map(|&c| char::from_u32(c).unwrap_or('\u{FFFD}'))
                .collect();
            ctx.events.push(Ev::Print(text));
        });
        for code in [0x07u8, 0x08, 0x09, 0x0A, 0x0D] {
            parser.set_execute_handler(code, move |ctx| ctx.events.push(Ev::Exec(code)));
        }
        for (id, name) in [
            (ident(None, &[], b'H'), "H"),
            (ident(None, &[], b'm'), "m"),
            (ident(None, &[], b'A'), "A"),
            (ident(Some(b'?'), &[], b'h'), "?h"),
            (ident(None, &[b'$'], b'p'), "$p"),
        ] {
            parser.register_csi(id, move |ctx, params| {
                ctx.events
                    .push(Ev::Csi(name.to_string(), params.as_slice().to_vec()));
                true
            });
        }
        for (id, name) in [
            (ident(None, &[], b'7'), "7"),
            (ident(None, &[], b'c'), "c"),
            (ident(None, &[b'('], b'B'), "(B"),
        ] {
            parser.register_esc(id, move |ctx| {
                ctx.events.push(Ev::Esc(name.to_string()));
                true
            });
        }
        for id in [0, 2, 8] {
            parser.register_osc_str(id, move |ctx, data| {
                ctx.events.push(Ev::Osc(id, data.to_string()));
                true
            });
        }
        parser.register_dcs_str(ident(None, &[b'$'], b'q'), |ctx, data, params| {
            ctx.events
                .push(Ev::Dcs(data.to_string(), params.as_slice().to_vec()));
            true
        });
        parser
    }

    fn feed(parser: &mut Parser<Probe>, input: &str) -> Vec<Ev> {
        let mut probe = Probe::default();
        let codes: Vec<u32> = input.chars().map(|c| c as u32).collect();
        parser.parse(&mut probe, &codes);
        probe.events
    }

    #[test]
    fn test_print_batching() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "Hello World");
        assert_eq!(events, vec![Ev::Print("Hello World".into())]);
    }

    #[test]
    fn test_execute_interrupts_print() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "ab\ncd");
        assert_eq!(
            events,
            vec![
                Ev::Print("ab".into()),
                Ev::Exec(0x0A),
                Ev::Print("cd".into())
            ]
        );
    }

    #[test]
    fn test_csi_with_params() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "\x1b[10;20H");
        assert_eq!(events, vec![Ev::Csi("H".into(), vec![10, 20])]);
    }

    #[test]
    fn test_csi_default_param() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "\x1b[H");
        assert_eq!(events, vec![Ev::Csi("H".into(), vec![0])]);
    }

    #[test]
    fn test_csi_private_prefix() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "\x1b[?25h");
        assert_eq!(events, vec![Ev::Csi("?h".into(), vec![25])]);
    }

    #[test]
    fn test_csi_intermediate() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "\x1b[2$p");
        assert_eq!(events, vec![Ev::Csi("$p".into(), vec![2])]);
    }

    #[test]
    fn test_esc_dispatch() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "\x1b7\x1bc\x1b(B");
        assert_eq!(
            events,
            vec![Ev::Esc("7".into()), Ev::Esc("c".into()), Ev::Esc("(B".into())]
        );
    }

    #[test]
    fn test_osc_bel_and_st() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "\x1b]0;My Title\x07");
        assert_eq!(events, vec![Ev::Osc(0, "My Title".into())]);

        let events = feed(&mut parser, "\x1b]2;other\x1b\\");
        assert_eq!(events, vec![Ev::Osc(2, "other".into())]);
    }

    #[test]
    fn test_osc_esc_terminator_reenters_escape() {
        let mut parser = probe_parser();
        // ESC terminating the OSC immediately opens the next sequence
        let events = feed(&mut parser, "\x1b]0;t\x1b[5A");
        assert_eq!(
            events,
            vec![Ev::Osc(0, "t".into()), Ev::Csi("A".into(), vec![5])]
        );
    }

    #[test]
    fn test_dcs_roundtrip() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "\x1bP1;2$qpayload\x1b\\");
        assert_eq!(events, vec![Ev::Dcs("payload".into(), vec![1, 2])]);
    }

    #[test]
    fn test_can_aborts_csi() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "\x1b[5\x18A");
        // CAN kills the sequence; 'A' prints as text
        assert_eq!(events, vec![Ev::Print("A".into())]);
    }

    #[test]
    fn test_sub_aborts_dcs() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "\x1bP$qdata\x1aX");
        assert_eq!(events, vec![Ev::Print("X".into())]);
    }

    #[test]
    fn test_chunk_transparency_manual_split() {
        let mut one = probe_parser();
        let whole = feed(&mut one, "\x1b[31mAB\x1b]0;t\x07C");

        let mut split = probe_parser();
        let mut probe = Probe::default();
        for chunk in ["\x1b[3", "1m", "AB\x1b]0", ";t", "\x07C"] {
            let codes: Vec<u32> = chunk.chars().map(|c| c as u32).collect();
            split.parse(&mut probe, &codes);
        }
        assert_eq!(whole, probe.events);
    }

    #[test]
    fn test_most_recent_csi_handler_wins() {
        let mut parser: Parser<Probe> = Parser::new();
        let id = ident(None, &[], b'J');
        parser.register_csi(id, |ctx, _| {
            ctx.events.push(Ev::Csi("old".into(), vec![]));
            true
        });
        parser.register_csi(id, |ctx, _| {
            ctx.events.push(Ev::Csi("new".into(), vec![]));
            true
        });
        let events = feed(&mut parser, "\x1b[J");
        assert_eq!(events, vec![Ev::Csi("new".into(), vec![])]);
    }

    #[test]
    fn test_handler_chain_falls_through() {
        let mut parser: Parser<Probe> = Parser::new();
        let id = ident(None, &[], b'J');
        parser.register_csi(id, |ctx, _| {
            ctx.events.push(Ev::Csi("old".into(), vec![]));
            true
        });
        parser.register_csi(id, |ctx, _| {
            ctx.events.push(Ev::Csi("new-pass".into(), vec![]));
            false
        });
        let events = feed(&mut parser, "\x1b[J");
        assert_eq!(
            events,
            vec![
                Ev::Csi("new-pass".into(), vec![]),
                Ev::Csi("old".into(), vec![])
            ]
        );
    }

    #[test]
    fn test_unknown_sequence_is_silent() {
        let mut parser = probe_parser();
        // unknown final byte: logged, stream continues
        let events = feed(&mut parser, "\x1b[9999~after");
        assert_eq!(events, vec![Ev::Print("after".into())]);
    }

    #[test]
    fn test_sub_params_reach_handler() {
        let captured = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&captured);
        let mut parser: Parser<Probe> = Parser::new();
        parser.register_csi(ident(None, &[], b'm'), move |_ctx, params| {
            sink.borrow_mut().push(params.to_pairs());
            true
        });
        feed(&mut parser, "\x1b[38:2:1:2:3;1m");
        assert_eq!(
            &*captured.borrow(),
            &[vec![(38, vec![2, 1, 2, 3]), (1, vec![])]]
        );
    }

    #[test]
    fn test_sos_pm_apc_swallowed() {
        let mut parser = probe_parser();
        let events = feed(&mut parser, "\x1bXsecret\x1b\\after");
        assert_eq!(events, vec![Ev::Print("after".into())]);
    }

    #[test]
    fn test_reset_mid_sequence() {
        let mut parser = probe_parser();
        let mut probe = Probe::default();
        let codes: Vec<u32> = "\x1b[12;".chars().map(|c| c as u32).collect();
        parser.parse(&mut probe, &codes);
        parser.reset(&mut probe);
        let events = feed(&mut parser, "ok");
        assert_eq!(events, vec![Ev::Print("ok".into())]);
    }
}
