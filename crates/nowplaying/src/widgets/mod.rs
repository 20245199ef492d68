//! GTK widgets for the card list.
//!
//! The core crate decides what a card shows and when it comes and goes;
//! these types only turn that into widgets.

pub mod css;
pub mod media_container;
pub mod player_card;
