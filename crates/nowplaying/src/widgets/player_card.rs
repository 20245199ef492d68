//! GTK rendering of a player card.
//!
//! The card sits in a `Revealer` so it can slide in and out. Buttons and the
//! scrubber forward to `CardControls`; everything shown comes in through
//! `CardView::update`.

use std::rc::Rc;
use std::time::Duration;

use gtk4::glib;
use gtk4::prelude::*;
use gtk4::{
    Align, Box as GtkBox, Button, EventControllerLegacy, Label, Orientation, Revealer,
    RevealerTransitionType, Scale,
};

use nowplaying_core::stylesheet::card_class;
use nowplaying_core::{CardControls, CardView, CardViewState, MediaSource};

use crate::styles::media;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3600;

/// How long a finished drag keeps position updates away from the scrubber.
const SEEK_SETTLE_MS: u64 = 150;

/// Format seconds as `m:ss` or `h:mm:ss`.
pub fn format_duration(seconds: i64) -> String {
    let total = seconds.max(0);
    let hours = total / SECONDS_PER_HOUR;
    let minutes = (total % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let secs = total % SECONDS_PER_MINUTE;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Widgets of one card.
pub struct GtkCardView {
    parent: GtkBox,
    revealer: Revealer,
    glyph_label: Label,
    title_label: Label,
    artist_label: Label,
    prev_btn: Button,
    play_pause_btn: Button,
    next_btn: Button,
    seek_box: GtkBox,
    scale: Scale,
    position_label: Label,
    length_label: Label,
    controls: Rc<CardControls>,
}

impl GtkCardView {
    /// Build the card and append it, concealed, to `parent`.
    pub fn new(
        parent: &GtkBox,
        source: &Rc<dyn MediaSource>,
        state: &CardViewState,
        art_size: u32,
        transition_ms: u32,
    ) -> Rc<Self> {
        let revealer = Revealer::new();
        revealer.set_transition_type(RevealerTransitionType::SlideDown);
        revealer.set_transition_duration(transition_ms);
        revealer.set_reveal_child(false);

        let card = GtkBox::new(Orientation::Vertical, 6);
        card.add_css_class(media::CARD);
        card.add_css_class(media::BACKDROP);
        card.add_css_class(&card_class(&state.desktop_entry));

        // Art + text row
        let top_row = GtkBox::new(Orientation::Horizontal, 12);

        let art = GtkBox::new(Orientation::Vertical, 0);
        art.add_css_class(media::ART);
        let art_px = i32::try_from(art_size).unwrap_or(i32::MAX);
        art.set_size_request(art_px, art_px);
        art.set_valign(Align::Center);
        top_row.append(&art);

        let info = GtkBox::new(Orientation::Vertical, 2);
        info.set_valign(Align::Center);
        info.set_hexpand(true);

        let header = GtkBox::new(Orientation::Horizontal, 6);
        let glyph_label = Label::new(None);
        glyph_label.add_css_class(media::PLAYER_GLYPH);
        header.append(&glyph_label);

        let title_label = Label::new(None);
        title_label.add_css_class(media::TITLE);
        title_label.set_halign(Align::Start);
        title_label.set_ellipsize(gtk4::pango::EllipsizeMode::End);
        title_label.set_hexpand(true);
        title_label.set_xalign(0.0);
        header.append(&title_label);
        info.append(&header);

        let artist_label = Label::new(None);
        artist_label.add_css_class(media::ARTIST);
        artist_label.set_halign(Align::Start);
        artist_label.set_ellipsize(gtk4::pango::EllipsizeMode::End);
        artist_label.set_xalign(0.0);
        info.append(&artist_label);

        // Transport controls
        let transport = GtkBox::new(Orientation::Horizontal, 8);
        transport.add_css_class(media::CONTROLS);
        transport.set_halign(Align::Start);

        let controls = Rc::new(CardControls::new(source));
        let prev_btn = control_button("media-skip-backward-symbolic", "Previous", &[], {
            let controls = controls.clone();
            move || controls.previous()
        });
        let play_pause_btn = control_button(
            state.play_pause_icon,
            "Play/Pause",
            &[media::CONTROL_BTN_PRIMARY],
            {
                let controls = controls.clone();
                move || controls.play_pause()
            },
        );
        let next_btn = control_button("media-skip-forward-symbolic", "Next", &[], {
            let controls = controls.clone();
            move || controls.next()
        });
        transport.append(&prev_btn);
        transport.append(&play_pause_btn);
        transport.append(&next_btn);
        info.append(&transport);

        top_row.append(&info);
        card.append(&top_row);

        // Scrubber
        let (seek_box, scale, position_label, length_label) = build_scrubber(&controls);
        card.append(&seek_box);

        revealer.set_child(Some(&card));
        parent.append(&revealer);

        let view = Rc::new(Self {
            parent: parent.clone(),
            revealer,
            glyph_label,
            title_label,
            artist_label,
            prev_btn,
            play_pause_btn,
            next_btn,
            seek_box,
            scale,
            position_label,
            length_label,
            controls,
        });
        view.update(state);
        view
    }
}

impl CardView for GtkCardView {
    fn update(&self, state: &CardViewState) {
        self.glyph_label.set_label(state.glyph);
        self.glyph_label.set_visible(!state.glyph.is_empty());
        self.title_label.set_label(&state.title);
        self.title_label.set_tooltip_text(Some(&state.title));
        self.artist_label.set_label(&state.artist);
        self.artist_label.set_visible(!state.artist.is_empty());

        self.play_pause_btn.set_icon_name(state.play_pause_icon);
        for class in media::STATUS_CLASSES {
            self.play_pause_btn.remove_css_class(class);
        }
        self.play_pause_btn.add_css_class(state.status_class);

        self.play_pause_btn.set_visible(state.show_play_pause);
        self.prev_btn.set_visible(state.show_previous);
        self.next_btn.set_visible(state.show_next);

        self.seek_box.set_visible(state.scrubber_visible);
        if state.scrubber_visible && !self.controls.is_seeking() {
            let max = state.scrubber_max.max(state.scrubber_value).max(1) as f64;
            self.scale.set_range(0.0, max);
            self.scale.set_value(state.scrubber_value as f64);
            self.position_label
                .set_label(&format_duration(state.scrubber_value));
            self.length_label.set_label(&format_duration(state.scrubber_max));
        }
    }

    fn set_revealed(&self, revealed: bool) {
        self.revealer.set_reveal_child(revealed);
    }

    fn unparent(&self) {
        if self.revealer.parent().is_some() {
            self.parent.remove(&self.revealer);
        }
    }
}

fn control_button<F>(icon_name: &str, tooltip: &str, classes: &[&str], on_click: F) -> Button
where
    F: Fn() + 'static,
{
    let btn = Button::from_icon_name(icon_name);
    btn.set_has_frame(false);
    btn.set_valign(Align::Center);
    btn.add_css_class(media::CONTROL_BTN);
    for class in classes {
        btn.add_css_class(class);
    }
    btn.set_tooltip_text(Some(tooltip));
    btn.connect_clicked(move |_| on_click());
    btn
}

/// Build the scrubber with time labels.
///
/// Press and release come from a legacy controller, value changes from the
/// scale; both go to `controls`, which decides when to seek.
fn build_scrubber(controls: &Rc<CardControls>) -> (GtkBox, Scale, Label, Label) {
    let container = GtkBox::new(Orientation::Vertical, 0);

    let scale = Scale::with_range(Orientation::Horizontal, 0.0, 1.0, 1.0);
    scale.add_css_class(media::SCRUBBER);
    scale.set_draw_value(false);
    scale.set_hexpand(true);

    let time_row = GtkBox::new(Orientation::Horizontal, 0);
    time_row.add_css_class(media::TIME);

    let position_label = Label::new(Some("0:00"));
    position_label.set_halign(Align::Start);
    position_label.set_hexpand(true);
    time_row.append(&position_label);

    let length_label = Label::new(Some("0:00"));
    length_label.set_halign(Align::End);
    time_row.append(&length_label);

    let legacy_controller = EventControllerLegacy::new();
    {
        let controls = controls.clone();
        legacy_controller.connect_event(move |_, event| {
            use gtk4::gdk::EventType;
            match event.event_type() {
                EventType::ButtonPress => controls.press(),
                EventType::ButtonRelease => {
                    if controls.release() {
                        let controls = controls.clone();
                        glib::timeout_add_local_once(
                            Duration::from_millis(SEEK_SETTLE_MS),
                            move || controls.settle(),
                        );
                    }
                }
                _ => {}
            }
            glib::Propagation::Proceed
        });
    }
    scale.add_controller(legacy_controller);

    {
        let controls = controls.clone();
        let position_label = position_label.clone();
        scale.connect_change_value(move |_, _, value| {
            controls.change_value(value);
            if controls.is_seeking() {
                position_label.set_label(&format_duration(value.max(0.0) as i64));
            }
            glib::Propagation::Proceed
        });
    }

    container.append(&scale);
    container.append(&time_row);

    (container, scale, position_label, length_label)
}
