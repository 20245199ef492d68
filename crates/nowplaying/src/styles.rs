//! Shared CSS class constants for nowplaying.
//!
//! Generated per-card stylesheets target these names, so renaming one here
//! means updating the card template too.

/// Window and container classes.
pub mod class {
    /// Host window (`.nowplaying-window`).
    pub const WINDOW: &str = "nowplaying-window";

    /// Vertical card list (`.media-container`).
    pub const CONTAINER: &str = "media-container";
}

/// Card classes.
pub mod media {
    /// Card root inside the revealer (`.media-card`).
    pub const CARD: &str = "media-card";

    /// Blurred art backdrop behind the card content (`.media-card-backdrop`).
    pub const BACKDROP: &str = "media-card-backdrop";

    /// Album art square (`.media-card-art`).
    pub const ART: &str = "media-card-art";

    /// Track title label (`.media-card-title`).
    pub const TITLE: &str = "media-card-title";

    /// Artist label (`.media-card-artist`).
    pub const ARTIST: &str = "media-card-artist";

    /// Player glyph label (`.media-player-glyph`).
    pub const PLAYER_GLYPH: &str = "media-player-glyph";

    /// Controls row (`.media-controls`).
    pub const CONTROLS: &str = "media-controls";

    /// Control button (`.media-control-btn`).
    pub const CONTROL_BTN: &str = "media-control-btn";

    /// Primary control button (play/pause) (`.media-control-btn-primary`).
    pub const CONTROL_BTN_PRIMARY: &str = "media-control-btn-primary";

    /// Position scrubber (`.media-card-scrubber`).
    pub const SCRUBBER: &str = "media-card-scrubber";

    /// Position and length labels (`.media-card-time`).
    pub const TIME: &str = "media-card-time";

    /// Playback state classes, one of which is on the play/pause button.
    pub const PLAYING: &str = "media-playing";
    pub const PAUSED: &str = "media-paused";
    pub const STOPPED: &str = "media-stopped";

    pub const STATUS_CLASSES: &[&str] = &[PLAYING, PAUSED, STOPPED];
}
