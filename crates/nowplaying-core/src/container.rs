//! The media container: one card per player that appears.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error};

use crate::callbacks::CallbackId;
use crate::card::{CardLayout, PlayerCard, Timer};
use crate::service::MediaControlService;
use crate::source::MediaSource;
use crate::theming::ThemingContext;

pub struct MediaContainer {
    service: Rc<dyn MediaControlService>,
    layout: Rc<dyn CardLayout>,
    theming: Rc<ThemingContext>,
    timer: Rc<dyn Timer>,
    transition: Duration,
    cards: RefCell<Vec<Rc<PlayerCard>>>,
    subscription: Cell<Option<CallbackId>>,
}

impl MediaContainer {
    /// Create the container and subscribe to "player appeared".
    pub fn new(
        service: Rc<dyn MediaControlService>,
        layout: Rc<dyn CardLayout>,
        theming: Rc<ThemingContext>,
        timer: Rc<dyn Timer>,
        transition: Duration,
    ) -> Rc<Self> {
        let container = Rc::new(Self {
            service,
            layout,
            theming,
            timer,
            transition,
            cards: RefCell::new(Vec::new()),
            subscription: Cell::new(None),
        });

        let weak = Rc::downgrade(&container);
        let id = container.service.connect_player_added(Box::new(move |source| {
            if let Some(container) = weak.upgrade() {
                container.add_player(source.clone());
            }
        }));
        container.subscription.set(Some(id));

        container
    }

    fn add_player(self: &Rc<Self>, source: Rc<dyn MediaSource>) {
        debug!("Player appeared: {}", source.state().desktop_entry);
        let card = PlayerCard::new(
            source,
            self.layout.as_ref(),
            self.theming.clone(),
            self.timer.clone(),
            self.transition,
        );

        let weak_container = Rc::downgrade(self);
        let weak_card = Rc::downgrade(&card);
        card.connect_removed(move || {
            if let (Some(container), Some(card)) = (weak_container.upgrade(), weak_card.upgrade()) {
                container.cards.borrow_mut().retain(|c| !Rc::ptr_eq(c, &card));
            }
        });

        self.cards.borrow_mut().push(card.clone());
        card.reveal();
    }

    /// Live cards in append order.
    pub fn cards(&self) -> Vec<Rc<PlayerCard>> {
        self.cards.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.cards.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.borrow().is_empty()
    }

    /// Re-run the theming refresh for every live card.
    pub fn refresh_themes(&self) {
        for card in self.cards() {
            if let Err(e) = card.refresh_theme() {
                error!(
                    "Failed to refresh theme for {}: {}",
                    card.source().state().desktop_entry,
                    e
                );
            }
        }
    }
}

impl Drop for MediaContainer {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.service.disconnect(id);
        }
    }
}
