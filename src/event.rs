//! Synchronous event emitter
//!
//! An ordered list of observers per event, invoked synchronously on the
//! caller's thread in subscription order. This matches the single-threaded
//! model of the crate: emitting an event runs every registered callback to
//! completion before `emit` returns.

/// A list of callbacks invoked with a shared reference to the event payload.
///
/// Observers are stored in subscription order and called in that order on
/// every [`emit`](EventEmitter::emit).
pub struct EventEmitter<T> {
    listeners: Vec<Box<dyn FnMut(&T)>>,
}

impl<T> EventEmitter<T> {
    /// Create an emitter with no observers.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Register an observer, appended after any existing observers.
    pub fn subscribe(&mut self, f: impl FnMut(&T) + 'static) {
        self.listeners.push(Box::new(f));
    }

    /// Invoke every observer in subscription order with `value`.
    pub fn emit(&mut self, value: &T) {
        for listener in &mut self.listeners {
            listener(value);
        }
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
