//! Core library for nowplaying.
//!
//! Everything in here is independent of GTK and D-Bus: the reactive source
//! model, palette extraction, stylesheet templating, the theming refresh
//! flow, the player card lifecycle and the media container. The binary crate
//! plugs toolkit implementations into the traits defined here.

pub mod art;
pub mod callbacks;
pub mod card;
pub mod config;
pub mod container;
pub mod controls;
pub mod error;
pub mod logging;
pub mod palette;
pub mod service;
pub mod source;
pub mod stylesheet;
pub mod template;
pub mod theming;

pub use callbacks::{CallbackId, Callbacks};
pub use card::{CardLayout, CardPhase, CardView, CardViewState, PlayerCard, Timer};
pub use config::{Config, ConfigLoadResult};
pub use container::MediaContainer;
pub use controls::CardControls;
pub use error::{Error, Result};
pub use palette::{Palette, PaletteExtractor, Variant};
pub use service::MediaControlService;
pub use source::{MediaSource, PlaybackStatus, SourceEvent, SourceProperty, SourceState};
pub use stylesheet::StylesheetRegistry;
pub use theming::{ThemeRefresher, ThemingContext};
