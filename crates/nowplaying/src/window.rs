//! Card window, optionally placed with layer-shell.

use gtk4::prelude::*;
use gtk4::{Application, ApplicationWindow, Box as GtkBox};
use gtk4_layer_shell::{Edge, KeyboardMode, Layer, LayerShell};
use tracing::debug;

use nowplaying_core::config::WindowConfig;

use crate::styles::class;

/// Edges a `window.anchor` value pins the window to.
pub fn anchor_edges(anchor: &str) -> Vec<Edge> {
    match anchor {
        "top-left" => vec![Edge::Top, Edge::Left],
        "top" => vec![Edge::Top],
        "bottom-left" => vec![Edge::Bottom, Edge::Left],
        "bottom" => vec![Edge::Bottom],
        "bottom-right" => vec![Edge::Bottom, Edge::Right],
        _ => vec![Edge::Top, Edge::Right],
    }
}

/// Create the window holding the card container.
pub fn create_window(app: &Application, config: &WindowConfig, content: &GtkBox) -> ApplicationWindow {
    let width = i32::try_from(config.width).unwrap_or(i32::MAX);

    let window = ApplicationWindow::builder()
        .application(app)
        .title("nowplaying")
        .decorated(false)
        .resizable(false)
        .default_width(width)
        .build();

    window.add_css_class(class::WINDOW);

    if config.layer_shell {
        window.init_layer_shell();
        window.set_layer(Layer::Overlay);
        window.set_keyboard_mode(KeyboardMode::None);

        let margin = i32::try_from(config.margin).unwrap_or(i32::MAX);
        let edges = anchor_edges(&config.anchor);
        for edge in [Edge::Top, Edge::Bottom, Edge::Left, Edge::Right] {
            let pinned = edges.contains(&edge);
            window.set_anchor(edge, pinned);
            window.set_margin(edge, if pinned { margin } else { 0 });
        }
        debug!("Layer-shell window anchored {}", config.anchor);
    }

    window.set_child(Some(content));
    window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_edges() {
        assert_eq!(anchor_edges("top-left"), vec![Edge::Top, Edge::Left]);
        assert_eq!(anchor_edges("bottom"), vec![Edge::Bottom]);
        assert_eq!(anchor_edges("top-right"), vec![Edge::Top, Edge::Right]);
    }

    #[test]
    fn test_unknown_anchor_uses_top_right() {
        assert_eq!(anchor_edges("middle"), anchor_edges("top-right"));
    }
}
