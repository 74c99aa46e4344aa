//! Normal/alternate buffer pair
//!
//! Full-screen applications switch to the alternate buffer, which has no
//! scrollback, and back. Switching is atomic for consumers: one swap of the
//! active reference, one activation event.

use serde::{Deserialize, Serialize};

use super::attrs::ExtendedAttrStore;
use super::buffer::Buffer;
use super::cell::Cell;
use crate::event::EventEmitter;

/// Which buffer of the pair is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveBuffer {
    Normal,
    Alt,
}

/// Owns the normal and alternate buffers and the active selection
#[derive(Debug)]
pub struct BufferSet {
    normal: Buffer,
    alt: Buffer,
    active: ActiveBuffer,
    /// Fired once per actual switch with the newly active buffer kind
    pub on_buffer_activate: EventEmitter<ActiveBuffer>,
}

impl BufferSet {
    pub fn new(cols: usize, rows: usize, scrollback: usize) -> Self {
        Self {
            normal: Buffer::new(cols, rows, scrollback, true),
            // alternate buffer has no scrollback by VT convention
            alt: Buffer::new(cols, rows, 0, false),
            active: ActiveBuffer::Normal,
            on_buffer_activate: EventEmitter::new(),
        }
    }

    pub fn active_kind(&self) -> ActiveBuffer {
        self.active
    }

    pub fn is_alt_active(&self) -> bool {
        self.active == ActiveBuffer::Alt
    }

    pub fn active(&self) -> &Buffer {
        match self.active {
            ActiveBuffer::Normal => &self.normal,
            ActiveBuffer::Alt => &self.alt,
        }
    }

    pub fn active_mut(&mut self) -> &mut Buffer {
        match self.active {
            ActiveBuffer::Normal => &mut self.normal,
            ActiveBuffer::Alt => &mut self.alt,
        }
    }

    pub fn normal(&self) -> &Buffer {
        &self.normal
    }

    pub fn normal_mut(&mut self) -> &mut Buffer {
        &mut self.normal
    }

    pub fn alt(&self) -> &Buffer {
        &self.alt
    }

    /// Switch to the alternate buffer, clearing it with the given fill.
    /// No-op when already active.
    pub fn activate_alt(&mut self, fill: &Cell, store: &mut ExtendedAttrStore) {
        if self.active == ActiveBuffer::Alt {
            return;
        }
        self.alt.reset(store);
        if fill != &Cell::default() {
            let rows = self.alt.rows();
            self.alt.erase_rows(0, rows, fill, store);
        }
        // start the alternate cursor where the normal one was
        self.alt.x = self.normal.x;
        self.alt.y = self.normal.y;
        self.active = ActiveBuffer::Alt;
        self.on_buffer_activate.emit(&ActiveBuffer::Alt);
    }

    /// Switch back to the normal buffer. No-op when already active.
    pub fn activate_normal(&mut self, store: &mut ExtendedAttrStore) {
        if self.active == ActiveBuffer::Normal {
            return;
        }
        // drop alternate contents so stale extended refs do not linger
        self.alt.reset(store);
        self.active = ActiveBuffer::Normal;
        self.on_buffer_activate.emit(&ActiveBuffer::Normal);
    }

    /// Resize both buffers
    pub fn resize(&mut self, cols: usize, rows: usize, store: &mut ExtendedAttrStore) {
        let fill = Cell::default();
        self.normal.resize(cols, rows, &fill, store);
        self.alt.resize(cols, rows, &fill, store);
    }
}
