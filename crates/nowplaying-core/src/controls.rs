//! Transport and seek actions of a card.
//!
//! Widgets forward clicks and scrubber input here. While the pointer is held
//! on the scrubber the dragged value is only remembered, and a single seek is
//! sent on release; position updates should not move the scrubber until the
//! seek has settled.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::source::MediaSource;

/// Holds the source weakly, so a card's widgets never keep a player alive.
pub struct CardControls {
    source: Weak<dyn MediaSource>,
    pressed: Cell<bool>,
    pending_seek: Cell<Option<i64>>,
    seeking: Cell<bool>,
}

impl CardControls {
    pub fn new(source: &Rc<dyn MediaSource>) -> Self {
        Self {
            source: Rc::downgrade(source),
            pressed: Cell::new(false),
            pending_seek: Cell::new(None),
            seeking: Cell::new(false),
        }
    }

    fn with_source(&self, f: impl FnOnce(&dyn MediaSource)) {
        if let Some(source) = self.source.upgrade() {
            f(source.as_ref());
        }
    }

    pub fn play_pause(&self) {
        self.with_source(|s| s.play_pause());
    }

    pub fn previous(&self) {
        self.with_source(|s| s.previous());
    }

    pub fn next(&self) {
        self.with_source(|s| s.next());
    }

    /// Pointer went down on the scrubber.
    pub fn press(&self) {
        self.pressed.set(true);
    }

    /// The scrubber value changed to `seconds` by user input.
    ///
    /// Seeks at once unless the pointer is held, in which case the value is
    /// kept for [`CardControls::release`].
    pub fn change_value(&self, seconds: f64) {
        let seconds = seconds.max(0.0) as i64;
        if self.pressed.get() {
            self.seeking.set(true);
            self.pending_seek.set(Some(seconds));
        } else {
            self.with_source(|s| s.set_position(seconds));
        }
    }

    /// Pointer released. Sends the pending seek, if any, and returns whether
    /// one was sent; the caller ends the seek with [`CardControls::settle`].
    pub fn release(&self) -> bool {
        self.pressed.set(false);
        match self.pending_seek.take() {
            Some(seconds) => {
                self.with_source(|s| s.set_position(seconds));
                true
            }
            None => {
                self.seeking.set(false);
                false
            }
        }
    }

    /// Let position updates reach the scrubber again.
    pub fn settle(&self) {
        if !self.pressed.get() {
            self.seeking.set(false);
        }
    }

    /// True while a drag or an unsettled seek owns the scrubber.
    pub fn is_seeking(&self) -> bool {
        self.seeking.get()
    }

    pub fn pending_seek(&self) -> Option<i64> {
        self.pending_seek.get()
    }
}
