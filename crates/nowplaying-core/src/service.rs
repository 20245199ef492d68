//! The media-control service seam.

use std::rc::Rc;

use crate::callbacks::CallbackId;
use crate::source::MediaSource;

/// Enumerates players and announces new ones.
///
/// Implementations deliver one "player appeared" notification per player.
/// Removal is signalled on the source itself via `SourceEvent::Closed`.
pub trait MediaControlService {
    fn connect_player_added(&self, callback: Box<dyn Fn(&Rc<dyn MediaSource>)>) -> CallbackId;

    fn disconnect(&self, id: CallbackId) -> bool;
}
