//! DCS sub-parser
//!
//! Device control strings carry a CSI-like prefix (params, intermediates,
//! final byte) followed by an arbitrary payload terminated by ST. The
//! final byte selects the handler set at hook time; payload chunks stream
//! to every hooked handler so large payloads need no central buffering.
//! On unhook the handlers run most-recently-registered first until one
//! reports the sequence handled.

use std::collections::HashMap;

use tracing::debug;

use super::params::Params;
use super::utf32_to_string;
use super::PAYLOAD_LIMIT;

/// Streaming handler for one DCS identifier
pub trait DcsHandler<C> {
    /// Sequence selected; params are only valid during this call
    fn hook(&mut self, params: &Params);
    /// Payload chunk (UTF-32)
    fn put(&mut self, data: &[u32]);
    /// Terminator seen; `success` is false on abort (CAN/SUB).
    /// Return true to stop the handler chain.
    fn unhook(&mut self, ctx: &mut C, success: bool) -> bool;
}

/// Identifier-keyed DCS dispatch
pub struct DcsParser<C> {
    handlers: HashMap<u32, Vec<Box<dyn DcsHandler<C>>>>,
    active: Option<u32>,
}

impl<C> DcsParser<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            active: None,
        }
    }

    /// Register a handler for `ident` (see [`super::machine::ident`]);
    /// later registrations take precedence
    pub fn register(&mut self, ident: u32, handler: Box<dyn DcsHandler<C>>) {
        self.handlers.entry(ident).or_default().push(handler);
    }

    pub fn reset(&mut self, ctx: &mut C) {
        if self.active.is_some() {
            self.unhook(ctx, false);
        }
        self.active = None;
    }

    pub fn hook(&mut self, ctx: &mut C, ident: u32, params: &Params) {
        // leftover handlers from an unterminated sequence get aborted
        self.reset(ctx);
        self.active = Some(ident);
        match self.handlers.get_mut(&ident) {
            Some(handlers) => {
                for handler in handlers.iter_mut().rev() {
                    handler.hook(params);
                }
            }
            None => debug!(ident, "unhandled DCS hook"),
        }
    }

    pub fn put(&mut self, data: &[u32]) {
        let Some(ident) = self.active else {
            return;
        };
        if let Some(handlers) = self.handlers.get_mut(&ident) {
            for handler in handlers.iter_mut().rev() {
                handler.put(data);
            }
        }
    }

    pub fn unhook(&mut self, ctx: &mut C, success: bool) {
        let Some(ident) = self.active.take() else {
            return;
        };
        match self.handlers.get_mut(&ident) {
            Some(handlers) => {
                let mut handled_at = None;
                for (i, handler) in handlers.iter_mut().enumerate().rev() {
                    if handler.unhook(ctx, success) {
                        handled_at = Some(i);
                        break;
                    }
                }
                if let Some(stop) = handled_at {
                    for handler in handlers[..stop].iter_mut().rev() {
                        handler.unhook(ctx, false);
                    }
                }
            }
            None => debug!(ident, success, "unhandled DCS unhook"),
        }
    }
}

/// Adapter turning a string callback into a buffering [`DcsHandler`].
///
/// Payload is capped at [`PAYLOAD_LIMIT`]; overflow drops this sequence
/// without disturbing the rest of the stream.
pub struct DcsStringHandler<C> {
    data: String,
    params: Params,
    hit_limit: bool,
    callback: Box<dyn FnMut(&mut C, &str, &Params) -> bool>,
}

impl<C> DcsStringHandler<C> {
    pub fn new(callback: impl FnMut(&mut C, &str, &Params) -> bool + 'static) -> Self {
        Self {
            data: String::new(),
            params: Params::new(),
            hit_limit: false,
            callback: Box::new(callback),
        }
    }
}

impl<C> DcsHandler<C> for DcsStringHandler<C> {
    fn hook(&mut self, params: &Params) {
        // params are borrowed from the parser and reused; keep a copy for
        // the unhook callback
        self.params = params.clone();
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

    fn unhook(&mut self, ctx: &mut C, success: bool) -> bool {
        let mut handled = false;
        if !self.hit_limit && success {
            handled = (self.callback)(ctx, &self.data, &self.params);
        }
        self.data.clear();
        self.hit_limit = false;
        handled
    }
}
