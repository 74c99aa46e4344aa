//! OSC sub-parser
//!
//! Handles `OSC id ; payload ST/BEL` strings: parses the numeric identifier
//! from the leading digits, then streams payload chunks to every handler
//! registered for that identifier. Handlers buffer independently; on the
//! terminator they run most-recently-registered first until one reports
//! the command handled. A malformed identifier aborts collection for this
//! one command only.

use std::collections::HashMap;

use tracing::debug;

use super::utf32_to_string;
use super::PAYLOAD_LIMIT;

/// Streaming handler for one OSC identifier
pub trait OscHandler<C> {
    /// Identifier complete, payload follows
    fn start(&mut self);
    /// Payload chunk (UTF-32)
    fn put(&mut self, data: &[u32]);
    /// Terminator seen; `success` is false on abort (CAN/SUB/overflow).
    /// Return true to stop the handler chain.
    fn end(&mut self, ctx: &mut C, success: bool) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OscState {
    Start,
    Id,
    Payload,
    Abort,
}

/// Identifier-keyed OSC dispatch
pub struct OscParser<C> {
    state: OscState,
    id: i32,
    handlers: HashMap<i32, Vec<Box<dyn OscHandler<C>>>>,
}

impl<C> OscParser<C> {
    pub fn new() -> Self {
        Self {
            state: OscState::Start,
            id: -1,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `ident`; later registrations take precedence
    pub fn register(&mut self, ident: i32, handler: Box<dyn OscHandler<C>>) {
        self.handlers.entry(ident).or_default().push(handler);
    }

    pub fn reset(&mut self, ctx: &mut C) {
        if self.state == OscState::Payload {
            self.end(ctx, false);
        }
        self.id = -1;
        self.state = OscState::Start;
    }

    pub fn start(&mut self, ctx: &mut C) {
        // leftover handlers from an unterminated command get aborted
        self.reset(ctx);
        self.id = -1;
        self.state = OscState::Id;
    }

    /// Feed payload data; the identifier is carved off the first chunks
    pub fn put(&mut self, data: &[u32]) {
        if self.state == OscState::Abort {
            return;
        }
        let mut start = 0;
        if self.state == OscState::Id {
            while start < data.len() {
                let code = data[start];
                start += 1;
                if code == 0x3B {
                    self.state = OscState::Payload;
                    self.dispatch_start();
                    break;
                }
                if !(0x30..=0x39).contains(&code) {
                    self.state = OscState::Abort;
                    return;
                }
                if self.id == -1 {
                    self.id = 0;
                }
                self.id = self.id.saturating_mul(10).saturating_add((code - 0x30) as i32);
            }
        }
        if self.state == OscState::Payload && start < data.len() {
            if let Some(handlers) = self.handlers.get_mut(&self.id) {
                for handler in handlers.iter_mut().rev() {
                    handler.put(&data[start..]);
                }
            }
        }
    }

    fn dispatch_start(&mut self) {
        if let Some(handlers) = self.handlers.get_mut(&self.id) {
            for handler in handlers.iter_mut().rev() {
                handler.start();
            }
        }
    }

    /// Terminator or abort; dispatches most-recently-registered first
    pub fn end(&mut self, ctx: &mut C, success: bool) {
        if self.state == OscState::Start {
            return;
        }
        if self.state != OscState::Abort {
            // a command without `;` still announces start/end ("OSC 123 ST")
            if self.state == OscState::Id {
                self.dispatch_start();
            }
            match self.handlers.get_mut(&self.id) {
                Some(handlers) => {
                    let mut handled_at = None;
                    for (i, handler) in handlers.iter_mut().enumerate().rev() {
                        if handler.end(ctx, success) {
                            handled_at = Some(i);
                            break;
                        }
                    }
                    // handlers below the winner still need their cleanup
                    if let Some(stop) = handled_at {
                        for handler in handlers[..stop].iter_mut().rev() {
                            handler.end(ctx, false);
                        }
                    }
                }
                None => debug!(id = self.id, success, "unhandled OSC command"),
            }
        }
        self.id = -1;
        self.state = OscState::Start;
    }
}

/// Adapter turning a string callback into a buffering [`OscHandler`].
///
/// Payload is capped at [`PAYLOAD_LIMIT`]; overflow drops this command
/// without disturbing the rest of the stream.
pub struct OscStringHandler<C> {
    data: String,
    hit_limit: bool,
    callback: Box<dyn FnMut(&mut C, &str) -> bool>,
}

impl<C> OscStringHandler<C> {
    pub fn new(callback: impl FnMut(&mut C, &str) -> bool + 'static) -> Self {
        Self {
            data: String::new(),
            hit_limit: false,
            callback: Box::new(callback),
        }
    }
}

impl<C> OscHandler<C> for OscStringHandler<C> {
    fn start(&mut self) {
        self.data.clear();
        self.hit_limit = false;
    }

    fn put(&mut self, data: &[u32]) {
        if self.hit_limit {
            return;
        }
        utf32_to_string(data, &mut self.data);
        if self.data.len() > PAYLOAD_LIMIT {
            self.data.clear();
            self.hit_limit = true;
        }
    }

    fn end(&mut self, ctx: &mut C, success: bool) -> bool {
        let mut handled = false;
        if !self.hit_limit && success {
            handled = (self.callback)(ctx, &self.data);
        }
        self.data.clear();
        self.hit_limit = false;
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(s: &str) -> Vec<u32> {
        s.chars().map(|c| c as u32).collect()
    }

    fn string_handler(
        log: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
        handled: bool,
    ) -> Box<dyn OscHandler<()>> {
        Box::new(OscStringHandler::new(move |_ctx, data: &str| {
            log.borrow_mut().push(data.to_string());
            handled
        }))
    }

    #[test]
    fn test_id_and_payload_dispatch() {
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut parser = OscParser::new();
        parser.register(0, string_handler(log.clone(), true));

        let mut ctx = ();
        parser.start(&mut ctx);
        parser.put(&codes("0;My Title"));
        parser.end(&mut ctx, true);

        assert_eq!(&*log.borrow(), &["My Title".to_string()]);
    }

    #[test]
    fn test_payload_split_across_puts() {
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut parser = OscParser::new();
        parser.register(2, string_handler(log.clone(), true));

        let mut ctx = ();
        parser.start(&mut ctx);
        parser.put(&codes("2"));
        parser.put(&codes(";he"));
        parser.put(&codes("llo"));
        parser.end(&mut ctx, true);

        assert_eq!(&*log.borrow(), &["hello".to_string()]);
    }

    #[test]
    fn test_most_recent_handler_wins() {
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let first = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut parser = OscParser::new();
        parser.register(0, string_handler(first.clone(), true));
        parser.register(0, string_handler(log.clone(), true));

        let mut ctx = ();
        parser.start(&mut ctx);
        parser.put(&codes("0;x"));
        parser.end(&mut ctx, true);

        // the newer handler consumed the command; the older one saw nothing
        assert_eq!(&*log.borrow(), &["x".to_string()]);
        assert!(first.borrow().is_empty());
    }

    #[test]
    fn test_falls_through_when_not_handled() {
        let older = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let newer = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut parser = OscParser::new();
        parser.register(0, string_handler(older.clone(), true));
        parser.register(0, string_handler(newer.clone(), false));

        let mut ctx = ();
        parser.start(&mut ctx);
        parser.put(&codes("0;y"));
        parser.end(&mut ctx, true);

        assert_eq!(&*newer.borrow(), &["y".to_string()]);
        assert_eq!(&*older.borrow(), &["y".to_string()]);
    }

    #[test]
    fn test_invalid_id_aborts_single_command() {
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut parser = OscParser::new();
        parser.register(0, string_handler(log.clone(), true));

        let mut ctx = ();
        parser.start(&mut ctx);
        parser.put(&codes("1x;oops"));
        parser.end(&mut ctx, true);
        assert!(log.borrow().is_empty());

        // next command parses cleanly
        parser.start(&mut ctx);
        parser.put(&codes("0;fine"));
        parser.end(&mut ctx, true);
        assert_eq!(&*log.borrow(), &["fine".to_string()]);
    }

    #[test]
    fn test_abort_does_not_invoke_callback() {
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut parser = OscParser::new();
        parser.register(0, string_handler(log.clone(), true));

        let mut ctx = ();
        parser.start(&mut ctx);
        parser.put(&codes("0;partial"));
        parser.end(&mut ctx, false);
        assert!(log.borrow().is_empty());
    }
}
