//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use nowplaying_core::card::{CardLayout, CardView, CardViewState, Timer};
use nowplaying_core::template::Template;
use nowplaying_core::{
    CallbackId, Callbacks, Error, MediaControlService, MediaSource, Palette, PaletteExtractor,
    Result, SourceEvent, SourceProperty, SourceState, StylesheetRegistry, ThemingContext, Variant,
};

pub const TRANSITION: Duration = Duration::from_millis(300);

/// Source whose state the test mutates directly.
#[derive(Default)]
pub struct FakeSource {
    state: RefCell<SourceState>,
    callbacks: Callbacks<SourceEvent>,
    pub commands: RefCell<Vec<String>>,
}

impl FakeSource {
    pub fn new(state: SourceState) -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(state),
            ..Default::default()
        })
    }

    /// Apply `change` and emit one notification per changed property.
    pub fn update(&self, change: impl FnOnce(&mut SourceState)) {
        let before = self.state.borrow().clone();
        change(&mut self.state.borrow_mut());
        let changed = before.changed_properties(&self.state.borrow());
        for property in changed {
            self.callbacks.notify(&SourceEvent::Changed(property));
        }
    }

    pub fn emit(&self, property: SourceProperty) {
        self.callbacks.notify(&SourceEvent::Changed(property));
    }

    pub fn close(&self) {
        self.callbacks.notify(&SourceEvent::Closed);
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.len()
    }
}

impl MediaSource for FakeSource {
    fn state(&self) -> SourceState {
        self.state.borrow().clone()
    }

    fn connect(&self, callback: Box<dyn Fn(&SourceEvent)>) -> CallbackId {
        self.callbacks.register(callback)
    }

    fn disconnect(&self, id: CallbackId) -> bool {
        self.callbacks.unregister(id)
    }

    fn play_pause(&self) {
        self.commands.borrow_mut().push("play_pause".into());
    }

    fn previous(&self) {
        self.commands.borrow_mut().push("previous".into());
    }

    fn next(&self) {
        self.commands.borrow_mut().push("next".into());
    }

    fn set_position(&self, seconds: i64) {
        self.commands.borrow_mut().push(format!("set_position:{seconds}"));
    }
}

#[derive(Default)]
pub struct FakeService {
    added: Callbacks<Rc<dyn MediaSource>>,
}

impl FakeService {
    pub fn add(&self, source: Rc<dyn MediaSource>) {
        self.added.notify(&source);
    }

    pub fn subscriber_count(&self) -> usize {
        self.added.len()
    }
}

impl MediaControlService for FakeService {
    fn connect_player_added(&self, callback: Box<dyn Fn(&Rc<dyn MediaSource>)>) -> CallbackId {
        self.added.register(callback)
    }

    fn disconnect(&self, id: CallbackId) -> bool {
        self.added.unregister(id)
    }
}

/// Registry that records every call and rejects removal of unknown paths.
#[derive(Default)]
pub struct FakeRegistry {
    pub active: RefCell<Vec<PathBuf>>,
    pub log: RefCell<Vec<String>>,
}

impl FakeRegistry {
    pub fn applies(&self) -> usize {
        self.log.borrow().iter().filter(|l| l.starts_with("apply")).count()
    }
}

impl StylesheetRegistry for FakeRegistry {
    fn apply(&self, path: &Path) -> Result<()> {
        let mut active = self.active.borrow_mut();
        assert!(
            !active.iter().any(|p| p == path),
            "stylesheet {} applied twice",
            path.display()
        );
        active.push(path.to_path_buf());
        self.log.borrow_mut().push(format!("apply {}", path.display()));
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.log.borrow_mut().push(format!("remove {}", path.display()));
        let mut active = self.active.borrow_mut();
        match active.iter().position(|p| p == path) {
            Some(idx) => {
                active.remove(idx);
                Ok(())
            }
            None => Err(Error::StylesheetNotApplied(path.to_path_buf())),
        }
    }
}

/// Extractor that records its inputs and derives a color from the file name.
#[derive(Default)]
pub struct FakeExtractor {
    pub images: RefCell<Vec<PathBuf>>,
}

impl PaletteExtractor for FakeExtractor {
    fn extract(&self, image: &Path, variant: Variant) -> Result<Palette> {
        self.images.borrow_mut().push(image.to_path_buf());
        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut palette = Palette::new();
        palette.insert("primary", format!("#{stem}"));
        palette.insert("variant", variant.as_str());
        Ok(palette)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewOp {
    Update(CardViewState),
    Revealed(bool),
    Unparent,
}

pub struct FakeView {
    pub ops: RefCell<Vec<ViewOp>>,
    pub revealed: Cell<bool>,
    pub parented: Cell<bool>,
}

impl FakeView {
    pub fn last_state(&self) -> Option<CardViewState> {
        self.ops.borrow().iter().rev().find_map(|op| match op {
            ViewOp::Update(state) => Some(state.clone()),
            _ => None,
        })
    }
}

impl CardView for FakeView {
    fn update(&self, state: &CardViewState) {
        self.ops.borrow_mut().push(ViewOp::Update(state.clone()));
    }

    fn set_revealed(&self, revealed: bool) {
        self.revealed.set(revealed);
        self.ops.borrow_mut().push(ViewOp::Revealed(revealed));
    }

    fn unparent(&self) {
        self.parented.set(false);
        self.ops.borrow_mut().push(ViewOp::Unparent);
    }
}

/// Layout that keeps the views it created, in append order.
#[derive(Default)]
pub struct FakeLayout {
    pub views: RefCell<Vec<Rc<FakeView>>>,
    pub initial: RefCell<Vec<CardViewState>>,
}

impl FakeLayout {
    pub fn view(&self, index: usize) -> Rc<FakeView> {
        self.views.borrow()[index].clone()
    }

    pub fn parented(&self) -> usize {
        self.views.borrow().iter().filter(|v| v.parented.get()).count()
    }
}

impl CardLayout for FakeLayout {
    fn create_card_view(
        &self,
        _source: &Rc<dyn MediaSource>,
        state: &CardViewState,
    ) -> Rc<dyn CardView> {
        let view = Rc::new(FakeView {
            ops: RefCell::new(Vec::new()),
            revealed: Cell::new(false),
            parented: Cell::new(true),
        });
        self.views.borrow_mut().push(view.clone());
        self.initial.borrow_mut().push(state.clone());
        view
    }
}

/// Timer driven by the test through `advance`.
#[derive(Default)]
pub struct ManualTimer {
    now: Cell<Duration>,
    pending: RefCell<Vec<(Duration, Box<dyn FnOnce()>)>>,
}

impl ManualTimer {
    /// Move time forward and run every callback that became due.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
        loop {
            let now = self.now.get();
            let due = {
                let mut pending = self.pending.borrow_mut();
                pending
                    .iter()
                    .position(|(at, _)| *at <= now)
                    .map(|idx| pending.remove(idx))
            };
            match due {
                Some((_, callback)) => callback(),
                None => break,
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl Timer for ManualTimer {
    fn schedule_once(&self, delay: Duration, callback: Box<dyn FnOnce()>) {
        let at = self.now.get() + delay;
        self.pending.borrow_mut().push((at, callback));
    }
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub registry: Rc<FakeRegistry>,
    pub extractor: Rc<FakeExtractor>,
    pub layout: Rc<FakeLayout>,
    pub timer: Rc<ManualTimer>,
    pub theming: Rc<ThemingContext>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let registry = Rc::new(FakeRegistry::default());
        let extractor = Rc::new(FakeExtractor::default());
        let template = Template::parse(
            ".{{ card_class }} { color: {{ primary }}; background-image: url(\"{{ art_url }}\"); }",
        )
        .unwrap();
        let theming = ThemingContext::new(
            dir.path().join("cache"),
            dir.path().join("fallback.png"),
            Variant::Dark,
            template,
            registry.clone(),
        )
        .with_extractor(extractor.clone());

        Self {
            dir,
            registry,
            extractor,
            layout: Rc::new(FakeLayout::default()),
            timer: Rc::new(ManualTimer::default()),
            theming: Rc::new(theming),
        }
    }

    pub fn fallback(&self) -> PathBuf {
        self.dir.path().join("fallback.png")
    }

    pub fn stylesheet(&self, desktop_entry: &str) -> PathBuf {
        self.theming.output_path(desktop_entry)
    }
}

pub fn spotify_state() -> SourceState {
    SourceState {
        desktop_entry: "spotify".into(),
        track_id: "spotify:track:1".into(),
        title: "Song".into(),
        artist: "Band".into(),
        art_url: Some("/art/first.png".into()),
        can_play: true,
        can_go_previous: true,
        can_go_next: true,
        ..Default::default()
    }
}
