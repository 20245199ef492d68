//! Container dispatch and pruning.

mod common;

use std::fs;
use std::rc::Rc;

use common::{FakeService, FakeSource, Harness, TRANSITION, ViewOp, spotify_state};
use nowplaying_core::{MediaContainer, MediaSource, SourceState};

fn container(h: &Harness, service: &Rc<FakeService>) -> Rc<MediaContainer> {
    MediaContainer::new(
        service.clone(),
        h.layout.clone(),
        h.theming.clone(),
        h.timer.clone(),
        TRANSITION,
    )
}

#[test]
fn test_subscribes_once() {
    let h = Harness::new();
    let service = Rc::new(FakeService::default());
    let container = container(&h, &service);

    assert_eq!(service.subscriber_count(), 1);
    assert!(container.is_empty());

    drop(container);
    assert_eq!(service.subscriber_count(), 0);
}

#[test]
fn test_each_player_gets_a_revealed_card() {
    let h = Harness::new();
    let service = Rc::new(FakeService::default());
    let container = container(&h, &service);

    let spotify: Rc<dyn MediaSource> = FakeSource::new(spotify_state());
    let mpv: Rc<dyn MediaSource> = FakeSource::new(SourceState {
        desktop_entry: "mpv".into(),
        ..Default::default()
    });
    service.add(spotify);
    service.add(mpv);

    assert_eq!(container.len(), 2);
    assert_eq!(h.layout.views.borrow().len(), 2);
    for view in h.layout.views.borrow().iter() {
        assert_eq!(*view.ops.borrow(), vec![ViewOp::Revealed(true)]);
    }
    let entries: Vec<String> = container
        .cards()
        .iter()
        .map(|c| c.source().state().desktop_entry)
        .collect();
    assert_eq!(entries, vec!["spotify", "mpv"]);
}

#[test]
fn test_duplicate_appearance_makes_two_cards() {
    let h = Harness::new();
    let service = Rc::new(FakeService::default());
    let container = container(&h, &service);

    let source: Rc<dyn MediaSource> = FakeSource::new(spotify_state());
    service.add(source.clone());
    service.add(source);

    assert_eq!(container.len(), 2);
}

#[test]
fn test_closed_card_is_pruned_after_transition() {
    let h = Harness::new();
    let service = Rc::new(FakeService::default());
    let container = container(&h, &service);

    let spotify = FakeSource::new(spotify_state());
    let mpv = FakeSource::new(SourceState {
        desktop_entry: "mpv".into(),
        ..Default::default()
    });
    service.add(spotify.clone());
    service.add(mpv.clone());

    spotify.close();
    assert_eq!(container.len(), 2);
    assert_eq!(h.layout.parented(), 2);

    h.timer.advance(TRANSITION);
    assert_eq!(container.len(), 1);
    assert_eq!(h.layout.parented(), 1);
    assert_eq!(container.cards()[0].source().state().desktop_entry, "mpv");
}

#[test]
fn test_distinct_players_use_distinct_stylesheets() {
    let h = Harness::new();
    let service = Rc::new(FakeService::default());
    let _container = container(&h, &service);

    for entry in ["spotify", "org.mpris.a/b", "org.mpris.a%2Fb"] {
        let source: Rc<dyn MediaSource> = FakeSource::new(SourceState {
            desktop_entry: entry.into(),
            ..Default::default()
        });
        service.add(source);
    }

    let mut active = h.registry.active.borrow().clone();
    active.sort();
    active.dedup();
    assert_eq!(active.len(), 3);
}

#[test]
fn test_returning_player_reuses_its_stylesheet() {
    let h = Harness::new();
    let service = Rc::new(FakeService::default());
    let container = container(&h, &service);

    let first = FakeSource::new(spotify_state());
    service.add(first.clone());
    first.close();
    h.timer.advance(TRANSITION);
    assert!(container.is_empty());

    let second = FakeSource::new(SourceState {
        art_url: Some("/art/later.png".into()),
        ..spotify_state()
    });
    service.add(second);

    assert_eq!(*h.registry.active.borrow(), vec![h.stylesheet("spotify")]);
    let css = fs::read_to_string(h.stylesheet("spotify")).unwrap();
    assert!(css.contains("#later"));
}

#[test]
fn test_refresh_themes_covers_every_card() {
    let h = Harness::new();
    let service = Rc::new(FakeService::default());
    let container = container(&h, &service);

    service.add(FakeSource::new(spotify_state()));
    service.add(FakeSource::new(SourceState {
        desktop_entry: "mpv".into(),
        ..Default::default()
    }));
    let before = h.registry.applies();

    container.refresh_themes();
    assert_eq!(h.registry.applies(), before + 2);
    assert_eq!(h.registry.active.borrow().len(), 2);
}
