//! The vertical box that holds the cards.

use std::rc::Rc;

use gtk4::prelude::*;
use gtk4::{Box as GtkBox, Orientation};

use nowplaying_core::{CardLayout, CardView, CardViewState, MediaSource};

use crate::styles::class;
use crate::widgets::player_card::GtkCardView;

/// GTK side of `MediaContainer`: builds card views and stacks them.
pub struct GtkCardLayout {
    root: GtkBox,
    art_size: u32,
    transition_ms: u32,
}

impl GtkCardLayout {
    pub fn new(art_size: u32, transition_ms: u32) -> Self {
        let root = GtkBox::new(Orientation::Vertical, 0);
        root.add_css_class(class::CONTAINER);
        Self {
            root,
            art_size,
            transition_ms,
        }
    }

    pub fn widget(&self) -> &GtkBox {
        &self.root
    }
}

impl CardLayout for GtkCardLayout {
    fn create_card_view(
        &self,
        source: &Rc<dyn MediaSource>,
        state: &CardViewState,
    ) -> Rc<dyn CardView> {
        GtkCardView::new(
            &self.root,
            source,
            state,
            self.art_size,
            self.transition_ms,
        )
    }
}
