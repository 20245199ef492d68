//! The player card: one per active media source.
//!
//! A card themes itself from the source's album art, mirrors the source's
//! state into a [`CardView`], and tears itself down after the source closes.
//! Teardown is two-phase: the view is hidden at once and unparented only
//! after the reveal transition has had time to play out.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, error};

use crate::callbacks::{CallbackId, Callbacks};
use crate::error::Result;
use crate::source::{
    MediaSource, POSITION_UNKNOWN, PlaybackStatus, SourceEvent, SourceProperty, SourceState,
    connect_closed, connect_property,
};
use crate::theming::{ThemeRefresher, ThemingContext};

pub const FIREFOX_GLYPH: &str = "\u{f0239}";
pub const SPOTIFY_GLYPH: &str = "\u{f04c7}";
pub const CHROME_GLYPH: &str = "\u{f268}";
pub const EMPTY_GLYPH: &str = "";

pub const ICON_PLAY: &str = "media-playback-start-symbolic";
pub const ICON_PAUSE: &str = "media-playback-pause-symbolic";

/// Glyph shown next to the title for a player.
pub fn player_glyph(desktop_entry: &str, track_id: &str) -> &'static str {
    match desktop_entry {
        "firefox" => FIREFOX_GLYPH,
        "spotify" => SPOTIFY_GLYPH,
        _ if track_id.contains("chromium") || track_id.contains("chrome") => CHROME_GLYPH,
        _ => EMPTY_GLYPH,
    }
}

/// The scrubber is hidden while the position is unknown.
pub fn scrubber_visible(position: i64) -> bool {
    position != POSITION_UNKNOWN
}

/// Everything a view needs to draw a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardViewState {
    pub desktop_entry: String,
    pub title: String,
    pub artist: String,
    pub glyph: &'static str,
    pub play_pause_icon: &'static str,
    pub status_class: &'static str,
    pub show_play_pause: bool,
    pub show_previous: bool,
    pub show_next: bool,
    pub scrubber_visible: bool,
    pub scrubber_value: i64,
    pub scrubber_max: i64,
}

impl CardViewState {
    pub fn from_state(state: &SourceState, glyph: &'static str) -> Self {
        let (play_pause_icon, status_class) = match state.playback_status {
            PlaybackStatus::Playing => (ICON_PAUSE, "media-playing"),
            PlaybackStatus::Paused => (ICON_PLAY, "media-paused"),
            PlaybackStatus::Stopped => (ICON_PLAY, "media-stopped"),
        };
        let visible = scrubber_visible(state.position);
        Self {
            desktop_entry: state.desktop_entry.clone(),
            title: state.title.clone(),
            artist: state.artist.clone(),
            glyph,
            play_pause_icon,
            status_class,
            show_play_pause: state.can_play,
            show_previous: state.can_go_previous,
            show_next: state.can_go_next,
            scrubber_visible: visible,
            scrubber_value: if visible { state.position.max(0) } else { 0 },
            scrubber_max: state.length.max(0),
        }
    }
}

/// The rendering side of a card.
pub trait CardView {
    fn update(&self, state: &CardViewState);

    /// Start the reveal (true) or conceal (false) transition.
    fn set_revealed(&self, revealed: bool);

    /// Detach from the parent layout.
    fn unparent(&self);
}

/// Builds card views and places them in the container's layout.
///
/// New views are appended last and start concealed.
pub trait CardLayout {
    fn create_card_view(&self, source: &Rc<dyn MediaSource>, state: &CardViewState)
    -> Rc<dyn CardView>;
}

/// One-shot deferred callbacks on the main loop.
pub trait Timer {
    fn schedule_once(&self, delay: Duration, callback: Box<dyn FnOnce()>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPhase {
    Visible,
    Closing,
    Removed,
}

pub struct PlayerCard {
    source: Rc<dyn MediaSource>,
    view: Rc<dyn CardView>,
    theme: Rc<ThemeRefresher>,
    timer: Rc<dyn Timer>,
    transition: Duration,
    glyph: &'static str,
    phase: Cell<CardPhase>,
    handlers: RefCell<Vec<CallbackId>>,
    removed: Callbacks<()>,
    self_ref: Weak<PlayerCard>,
}

impl PlayerCard {
    /// Theme, build and subscribe a card for `source`.
    ///
    /// The view is created concealed; call [`PlayerCard::reveal`] once it
    /// is in place.
    pub fn new(
        source: Rc<dyn MediaSource>,
        layout: &dyn CardLayout,
        theming: Rc<ThemingContext>,
        timer: Rc<dyn Timer>,
        transition: Duration,
    ) -> Rc<Self> {
        let state = source.state();
        let theme = ThemeRefresher::new(theming, &state.desktop_entry);
        if let Err(e) = theme.refresh(state.art_url.as_deref()) {
            error!("Failed to theme card for {}: {}", state.desktop_entry, e);
        }

        let glyph = player_glyph(&state.desktop_entry, &state.track_id);
        let view = layout.create_card_view(&source, &CardViewState::from_state(&state, glyph));

        let card = Rc::new_cyclic(|self_ref| Self {
            source,
            view,
            theme,
            timer,
            transition,
            glyph,
            phase: Cell::new(CardPhase::Visible),
            handlers: RefCell::new(Vec::new()),
            removed: Callbacks::new(),
            self_ref: self_ref.clone(),
        });

        // Art first, so a view update after an art change sees the new theme.
        let weak = card.self_ref.clone();
        let art = connect_property(&card.source, SourceProperty::ArtUrl, move || {
            if let Some(card) = weak.upgrade() {
                card.art_changed();
            }
        });
        let weak = card.self_ref.clone();
        let changes = card.source.connect(Box::new(move |event| {
            if let (Some(card), SourceEvent::Changed(_)) = (weak.upgrade(), event) {
                card.update_view();
            }
        }));
        let weak = card.self_ref.clone();
        let closed = connect_closed(&card.source, move || {
            if let Some(card) = weak.upgrade() {
                card.close();
            }
        });
        card.handlers.replace(vec![art, changes, closed]);

        debug!("Created card for {}", state.desktop_entry);
        card
    }

    pub fn source(&self) -> &Rc<dyn MediaSource> {
        &self.source
    }

    pub fn phase(&self) -> CardPhase {
        self.phase.get()
    }

    pub fn stylesheet_path(&self) -> &std::path::Path {
        self.theme.output_path()
    }

    pub fn view_state(&self) -> CardViewState {
        CardViewState::from_state(&self.source.state(), self.glyph)
    }

    pub fn reveal(&self) {
        if self.phase.get() == CardPhase::Visible {
            self.view.set_revealed(true);
        }
    }

    /// Regenerate and re-apply this card's stylesheet from the current art.
    pub fn refresh_theme(&self) -> Result<()> {
        self.theme.refresh(self.source.state().art_url.as_deref())
    }

    /// Called once the card has been unparented.
    pub fn connect_removed<F>(&self, callback: F) -> CallbackId
    where
        F: Fn() + 'static,
    {
        self.removed.register(move |_| callback())
    }

    fn art_changed(&self) {
        if self.phase.get() == CardPhase::Removed {
            return;
        }
        if let Err(e) = self.refresh_theme() {
            error!("Failed to refresh theme for {}: {}", self.desktop_entry(), e);
        }
    }

    fn update_view(&self) {
        if self.phase.get() != CardPhase::Removed {
            self.view.update(&self.view_state());
        }
    }

    /// Conceal now, unparent after one transition.
    pub fn close(&self) {
        if self.phase.get() != CardPhase::Visible {
            return;
        }
        self.phase.set(CardPhase::Closing);
        self.view.set_revealed(false);
        debug!("Closing card for {}", self.desktop_entry());

        let weak = self.self_ref.clone();
        self.timer.schedule_once(
            self.transition,
            Box::new(move || {
                if let Some(card) = weak.upgrade() {
                    card.finish_removal();
                }
            }),
        );
    }

    fn finish_removal(&self) {
        if self.phase.get() != CardPhase::Closing {
            return;
        }
        self.view.unparent();
        self.phase.set(CardPhase::Removed);
        for id in self.handlers.take() {
            self.source.disconnect(id);
        }
        debug!("Removed card for {}", self.desktop_entry());
        self.removed.notify(&());
    }

    fn desktop_entry(&self) -> String {
        self.source.state().desktop_entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_glyph_table() {
        assert_eq!(player_glyph("spotify", "/org/mpris/chrome/1"), SPOTIFY_GLYPH);
        assert_eq!(player_glyph("firefox", ""), FIREFOX_GLYPH);
        assert_eq!(player_glyph("brave", "/org/chromium/MediaPlayer2/Track/3"), CHROME_GLYPH);
        assert_eq!(player_glyph("", "chrome-42"), CHROME_GLYPH);
        assert_eq!(player_glyph("mpv", "/org/mpris/track/1"), EMPTY_GLYPH);
        assert_eq!(player_glyph("Spotify", ""), EMPTY_GLYPH);
    }

    #[test]
    fn test_scrubber_visible() {
        assert!(!scrubber_visible(-1));
        assert!(scrubber_visible(0));
        assert!(scrubber_visible(42));
    }

    #[test]
    fn test_view_state_playing() {
        let state = SourceState {
            desktop_entry: "spotify".into(),
            title: "Song".into(),
            artist: "Band".into(),
            playback_status: PlaybackStatus::Playing,
            position: 42,
            length: 180,
            can_play: true,
            can_go_next: true,
            ..Default::default()
        };
        let view = CardViewState::from_state(&state, SPOTIFY_GLYPH);

        assert_eq!(view.play_pause_icon, ICON_PAUSE);
        assert_eq!(view.status_class, "media-playing");
        assert!(view.show_play_pause);
        assert!(!view.show_previous);
        assert!(view.show_next);
        assert!(view.scrubber_visible);
        assert_eq!((view.scrubber_value, view.scrubber_max), (42, 180));
    }

    #[test]
    fn test_view_state_unknown_position() {
        let state = SourceState {
            playback_status: PlaybackStatus::Paused,
            ..Default::default()
        };
        let view = CardViewState::from_state(&state, EMPTY_GLYPH);

        assert_eq!(view.play_pause_icon, ICON_PLAY);
        assert_eq!(view.status_class, "media-paused");
        assert!(!view.scrubber_visible);
        assert_eq!(view.scrubber_value, 0);
    }
}
