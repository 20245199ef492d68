//! Base CSS for the window and cards.
//!
//! Colors live in the generated per-card stylesheets. This only sets layout
//! and neutral fallbacks so a card is readable before its theme lands.

use gtk4::CssProvider;
use gtk4::gdk::Display;
use tracing::debug;

/// Return the base stylesheet for a given art size.
pub fn base_css(art_size: u32) -> String {
    format!(
        r#"
/* ===== NOWPLAYING BASE CSS ===== */

window.nowplaying-window {{
    background: transparent;
}}

.media-container {{
    padding: 4px;
}}

.media-card {{
    border-radius: 16px;
    padding: 12px;
    margin-bottom: 8px;
    background-color: alpha(@window_bg_color, 0.95);
    color: @window_fg_color;
}}

.media-card-art {{
    min-width: {art_size}px;
    min-height: {art_size}px;
    border-radius: 12px;
    background-color: alpha(currentColor, 0.08);
}}

.media-card-title {{
    font-weight: bold;
    font-size: 1.05em;
}}

.media-card-artist {{
    opacity: 0.8;
}}

.media-player-glyph {{
    font-size: 1.2em;
    min-width: 1.2em;
}}

.media-controls {{
    margin-top: 6px;
}}

.media-control-btn {{
    background: transparent;
    border: none;
    box-shadow: none;
    border-radius: 50%;
    min-width: 32px;
    min-height: 32px;
    padding: 4px;
}}

.media-control-btn-primary {{
    min-width: 40px;
    min-height: 40px;
}}

.media-card-scrubber {{
    margin-top: 4px;
}}

.media-card-time {{
    font-size: 0.85em;
    opacity: 0.7;
}}
"#
    )
}

/// Load the base stylesheet at application priority, below card stylesheets.
pub fn load_base_css(display: &Display, art_size: u32) -> CssProvider {
    let provider = CssProvider::new();
    provider.load_from_string(&base_css(art_size));
    gtk4::style_context_add_provider_for_display(
        display,
        &provider,
        gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
    );
    debug!("Base CSS loaded (art_size={}px)", art_size);
    provider
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_css_uses_art_size() {
        let css = base_css(72);
        assert!(css.contains("min-width: 72px;"));
        assert!(css.contains("min-height: 72px;"));
    }

    #[test]
    fn test_base_css_braces_balance() {
        let css = base_css(96);
        assert_eq!(css.matches('{').count(), css.matches('}').count());
    }
}
