//! The media source abstraction.
//!
//! A `MediaSource` is one player as reported by the media-control service.
//! The service mutates it; cards only read `state()` and react to the
//! events delivered through `connect`.

use std::rc::Rc;

use crate::callbacks::CallbackId;

/// Position value reported when the player cannot tell where it is.
pub const POSITION_UNKNOWN: i64 = -1;

/// Playback status of a media source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl std::str::FromStr for PlaybackStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Playing" => Self::Playing,
            "Paused" => Self::Paused,
            _ => Self::Stopped,
        })
    }
}

/// Snapshot of everything a card reads from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceState {
    /// Desktop entry id (e.g. "spotify", "firefox").
    pub desktop_entry: String,
    /// Track identifier as reported by the player.
    pub track_id: String,
    pub title: String,
    pub artist: String,
    /// Album art location, either a URI or a plain path.
    pub art_url: Option<String>,
    pub playback_status: PlaybackStatus,
    /// Position in whole seconds, or [`POSITION_UNKNOWN`].
    pub position: i64,
    /// Track length in whole seconds (0 when unknown).
    pub length: i64,
    pub can_play: bool,
    pub can_go_previous: bool,
    pub can_go_next: bool,
}

impl Default for SourceState {
    fn default() -> Self {
        Self {
            desktop_entry: String::new(),
            track_id: String::new(),
            title: String::new(),
            artist: String::new(),
            art_url: None,
            playback_status: PlaybackStatus::Stopped,
            position: POSITION_UNKNOWN,
            length: 0,
            can_play: false,
            can_go_previous: false,
            can_go_next: false,
        }
    }
}

impl SourceState {
    /// List the properties whose values differ between `self` and `other`.
    pub fn changed_properties(&self, other: &SourceState) -> Vec<SourceProperty> {
        let mut changed = Vec::new();
        if self.track_id != other.track_id {
            changed.push(SourceProperty::TrackId);
        }
        if self.title != other.title {
            changed.push(SourceProperty::Title);
        }
        if self.artist != other.artist {
            changed.push(SourceProperty::Artist);
        }
        if self.art_url != other.art_url {
            changed.push(SourceProperty::ArtUrl);
        }
        if self.playback_status != other.playback_status {
            changed.push(SourceProperty::PlaybackStatus);
        }
        if self.position != other.position {
            changed.push(SourceProperty::Position);
        }
        if self.length != other.length {
            changed.push(SourceProperty::Length);
        }
        if self.can_play != other.can_play {
            changed.push(SourceProperty::CanPlay);
        }
        if self.can_go_previous != other.can_go_previous {
            changed.push(SourceProperty::CanGoPrevious);
        }
        if self.can_go_next != other.can_go_next {
            changed.push(SourceProperty::CanGoNext);
        }
        changed
    }
}

/// Observable properties of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceProperty {
    TrackId,
    Title,
    Artist,
    ArtUrl,
    PlaybackStatus,
    Position,
    Length,
    CanPlay,
    CanGoPrevious,
    CanGoNext,
}

/// Notification delivered to source subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    Changed(SourceProperty),
    /// The player went away. No further events follow.
    Closed,
}

/// One media player, owned by the media-control service.
pub trait MediaSource {
    /// Current property values.
    fn state(&self) -> SourceState;

    /// Subscribe to change and close notifications.
    fn connect(&self, callback: Box<dyn Fn(&SourceEvent)>) -> CallbackId;

    /// Drop a subscription made with `connect`.
    fn disconnect(&self, id: CallbackId) -> bool;

    fn play_pause(&self);

    fn previous(&self);

    fn next(&self);

    /// Seek to an absolute position in seconds.
    fn set_position(&self, seconds: i64);
}

/// Subscribe to changes of a single property.
pub fn connect_property<F>(
    source: &Rc<dyn MediaSource>,
    property: SourceProperty,
    callback: F,
) -> CallbackId
where
    F: Fn() + 'static,
{
    source.connect(Box::new(move |event| {
        if *event == SourceEvent::Changed(property) {
            callback();
        }
    }))
}

/// Subscribe to the close notification.
pub fn connect_closed<F>(source: &Rc<dyn MediaSource>, callback: F) -> CallbackId
where
    F: Fn() + 'static,
{
    source.connect(Box::new(move |event| {
        if *event == SourceEvent::Closed {
            callback();
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_status_from_str() {
        assert_eq!("Playing".parse(), Ok(PlaybackStatus::Playing));
        assert_eq!("Paused".parse(), Ok(PlaybackStatus::Paused));
        assert_eq!("Stopped".parse(), Ok(PlaybackStatus::Stopped));
        assert_eq!("Buffering".parse(), Ok(PlaybackStatus::Stopped));
    }

    #[test]
    fn test_default_state_has_unknown_position() {
        let state = SourceState::default();
        assert_eq!(state.position, POSITION_UNKNOWN);
        assert!(state.art_url.is_none());
    }

    #[test]
    fn test_changed_properties() {
        let old = SourceState::default();
        let new = SourceState {
            title: "Song".into(),
            position: 42,
            length: 180,
            ..SourceState::default()
        };

        assert_eq!(
            old.changed_properties(&new),
            vec![
                SourceProperty::Title,
                SourceProperty::Position,
                SourceProperty::Length
            ]
        );
        assert!(new.changed_properties(&new).is_empty());
    }
}
