//! MPRIS players on the session bus.
//!
//! `MprisService` watches `NameOwnerChanged` for `org.mpris.MediaPlayer2.*`
//! names and announces each new player once. Every player is an
//! `MprisPlayer`, a [`MediaSource`] backed by a `gio::DBusProxy`:
//!
//! - property changes arrive through `PropertiesChanged` and are diffed
//!   against the previous state, one notification per changed property
//! - MPRIS never signals position, so it is polled once a second while the
//!   player is playing
//! - the player's `DesktopEntry` (root interface) identifies it, falling back
//!   to the bus-name suffix
//!
//! Positions and lengths are converted from microseconds to whole seconds.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use gtk4::gio;
use gtk4::glib::{self, ControlFlow, Variant};
use gtk4::prelude::*;
use tracing::{debug, error, trace, warn};

use nowplaying_core::source::POSITION_UNKNOWN;
use nowplaying_core::{
    CallbackId, Callbacks, MediaControlService, MediaSource, PlaybackStatus, SourceEvent,
    SourceProperty, SourceState,
};

// D-Bus constants
const DBUS_NAME: &str = "org.freedesktop.DBus";
const DBUS_PATH: &str = "/org/freedesktop/DBus";
const DBUS_INTERFACE: &str = "org.freedesktop.DBus";
const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";
const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
const MPRIS_ROOT_INTERFACE: &str = "org.mpris.MediaPlayer2";
const MPRIS_PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Position polling interval when playing (in milliseconds).
const POSITION_POLL_INTERVAL_MS: u64 = 1000;
/// Delay before re-polling after a track or status change (in milliseconds).
const SETTLE_POLL_DELAY_MS: u64 = 100;
/// Default timeout for D-Bus method calls (in milliseconds).
const DBUS_CALL_TIMEOUT_MS: i32 = 5000;
/// Shorter timeout for position polling queries.
const DBUS_POLL_TIMEOUT_MS: i32 = 1000;

const MICROSECONDS_PER_SECOND: i64 = 1_000_000;

/// Extract player ID from MPRIS bus name (e.g., "org.mpris.MediaPlayer2.spotify" -> "spotify").
fn player_id_from_bus_name(bus_name: &str) -> String {
    bus_name
        .strip_prefix(MPRIS_PREFIX)
        .map(|s| s.split('.').next().unwrap_or(s))
        .unwrap_or(bus_name)
        .to_string()
}

fn micros_to_seconds(micros: i64) -> i64 {
    micros / MICROSECONDS_PER_SECOND
}

/// Fields of `Metadata` the card uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TrackMetadata {
    title: Option<String>,
    artist: Option<String>,
    art_url: Option<String>,
    /// Microseconds.
    length: Option<i64>,
    track_id: Option<String>,
}

fn parse_metadata(variant: &Variant) -> TrackMetadata {
    let mut meta = TrackMetadata::default();

    let Some(dict) = variant.get::<HashMap<String, Variant>>() else {
        return meta;
    };

    if let Some(title) = dict.get("xesam:title") {
        meta.title = title.get::<String>();
    }

    if let Some(artist) = dict.get("xesam:artist") {
        if let Some(artists) = artist.get::<Vec<String>>() {
            meta.artist = Some(artists.join(", "));
        } else if let Some(artist_str) = artist.get::<String>() {
            meta.artist = Some(artist_str);
        }
    }

    if let Some(art_url) = dict.get("mpris:artUrl") {
        meta.art_url = art_url.get::<String>().filter(|s| !s.is_empty());
    }

    if let Some(length) = dict.get("mpris:length") {
        meta.length = length
            .get::<i64>()
            .or_else(|| length.get::<u64>().map(|v| v as i64));
    }

    if let Some(track_id) = dict.get("mpris:trackid") {
        if let Some(id) = track_id.get::<String>() {
            meta.track_id = Some(id);
        } else if let Some(path) = track_id.get::<glib::variant::ObjectPath>() {
            meta.track_id = Some(path.to_string());
        }
    }

    meta
}

/// One connected MPRIS player.
pub struct MprisPlayer {
    bus_name: String,
    connection: gio::DBusConnection,
    proxy: gio::DBusProxy,
    state: RefCell<SourceState>,
    callbacks: Callbacks<SourceEvent>,
    properties_subscription: RefCell<Option<gio::SignalSubscription>>,
    poll_source: RefCell<Option<glib::SourceId>>,
    poll_cancellable: gio::Cancellable,
    closed: Cell<bool>,
}

impl MprisPlayer {
    fn new(
        bus_name: String,
        connection: gio::DBusConnection,
        proxy: gio::DBusProxy,
        desktop_entry: String,
    ) -> Rc<Self> {
        let player = Rc::new(Self {
            bus_name,
            connection,
            proxy,
            state: RefCell::new(SourceState {
                desktop_entry,
                ..Default::default()
            }),
            callbacks: Callbacks::new(),
            properties_subscription: RefCell::new(None),
            poll_source: RefCell::new(None),
            poll_cancellable: gio::Cancellable::new(),
            closed: Cell::new(false),
        });

        let initial = player.read_state();
        player.state.replace(initial);

        let player_weak = Rc::downgrade(&player);
        let subscription = player.connection.subscribe_to_signal(
            Some(&player.bus_name),
            Some(PROPERTIES_INTERFACE),
            Some("PropertiesChanged"),
            Some(MPRIS_PATH),
            None,
            gio::DBusSignalFlags::NONE,
            move |_signal| {
                if let Some(player) = player_weak.upgrade() {
                    player.refresh_from_proxy();
                }
            },
        );
        player.properties_subscription.replace(Some(subscription));

        player.update_polling();
        player.poll_position();
        player
    }

    /// Build a state from the proxy's cached properties.
    ///
    /// Desktop entry and position are not proxy properties and are carried
    /// over from the current state.
    fn read_state(&self) -> SourceState {
        let proxy = &self.proxy;
        let current = self.state.borrow();

        let bool_property = |name: &str| {
            proxy
                .cached_property(name)
                .and_then(|v| v.get::<bool>())
                .unwrap_or(false)
        };

        let playback_status = proxy
            .cached_property("PlaybackStatus")
            .and_then(|v| v.get::<String>())
            .map(|s| s.parse().unwrap_or_default())
            .unwrap_or(PlaybackStatus::Stopped);

        let metadata = proxy
            .cached_property("Metadata")
            .map(|m| parse_metadata(&m))
            .unwrap_or_default();

        SourceState {
            desktop_entry: current.desktop_entry.clone(),
            track_id: metadata.track_id.unwrap_or_default(),
            title: metadata.title.unwrap_or_default(),
            artist: metadata.artist.unwrap_or_default(),
            art_url: metadata.art_url,
            playback_status,
            position: current.position,
            length: metadata.length.map(micros_to_seconds).unwrap_or(0),
            can_play: bool_property("CanPlay"),
            can_go_previous: bool_property("CanGoPrevious"),
            can_go_next: bool_property("CanGoNext"),
        }
    }

    fn refresh_from_proxy(self: &Rc<Self>) {
        if self.closed.get() {
            return;
        }

        let mut next = self.read_state();
        let changed = {
            let mut state = self.state.borrow_mut();
            if next.track_id != state.track_id && next.position != POSITION_UNKNOWN {
                next.position = 0;
            }
            let changed = state.changed_properties(&next);
            *state = next;
            changed
        };

        if changed.is_empty() {
            return;
        }
        trace!("{}: changed {:?}", self.bus_name, changed);

        self.update_polling();
        for property in &changed {
            self.callbacks.notify(&SourceEvent::Changed(*property));
        }

        // Some players report stale positions right after a track or status
        // change; ask again once they have settled.
        if changed.contains(&SourceProperty::TrackId)
            || changed.contains(&SourceProperty::PlaybackStatus)
        {
            let player_weak = Rc::downgrade(self);
            glib::timeout_add_local_once(Duration::from_millis(SETTLE_POLL_DELAY_MS), move || {
                if let Some(player) = player_weak.upgrade() {
                    player.poll_position();
                }
            });
        }
    }

    fn update_polling(self: &Rc<Self>) {
        let playing = self.state.borrow().playback_status == PlaybackStatus::Playing;
        if !playing {
            if let Some(source) = self.poll_source.take() {
                trace!("{}: stopping position polling", self.bus_name);
                source.remove();
            }
            return;
        }
        if self.poll_source.borrow().is_some() {
            return;
        }

        trace!("{}: starting position polling", self.bus_name);
        let player_weak = Rc::downgrade(self);
        let source = glib::timeout_add_local(
            Duration::from_millis(POSITION_POLL_INTERVAL_MS),
            move || {
                let Some(player) = player_weak.upgrade() else {
                    return ControlFlow::Break;
                };
                player.poll_position();
                ControlFlow::Continue
            },
        );
        self.poll_source.replace(Some(source));
    }

    fn poll_position(self: &Rc<Self>) {
        if self.closed.get() {
            return;
        }

        let player_weak = Rc::downgrade(self);
        self.connection.call(
            Some(&self.bus_name),
            MPRIS_PATH,
            PROPERTIES_INTERFACE,
            "Get",
            Some(&(MPRIS_PLAYER_INTERFACE, "Position").to_variant()),
            glib::VariantTy::new("(v)").ok(),
            gio::DBusCallFlags::NONE,
            DBUS_POLL_TIMEOUT_MS,
            Some(&self.poll_cancellable),
            move |res| {
                let Some(player) = player_weak.upgrade() else {
                    return;
                };
                match res {
                    Ok(reply) => {
                        if let Some(inner) = reply.child_value(0).get::<Variant>()
                            && let Some(position) = inner.get::<i64>()
                        {
                            player.set_known_position(micros_to_seconds(position.max(0)));
                        }
                    }
                    Err(e) => {
                        if e.matches(gio::IOErrorEnum::Cancelled) {
                            return;
                        }
                        trace!("{}: position poll failed: {}", player.bus_name, e);
                        if !e.matches(gio::IOErrorEnum::TimedOut) {
                            player.set_known_position(POSITION_UNKNOWN);
                        }
                    }
                }
            },
        );
    }

    fn set_known_position(&self, seconds: i64) {
        if self.closed.get() {
            return;
        }
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = state.position != seconds;
            state.position = seconds;
            changed
        };
        if changed {
            self.callbacks
                .notify(&SourceEvent::Changed(SourceProperty::Position));
        }
    }

    /// Mark the player as gone and tell subscribers.
    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        self.poll_cancellable.cancel();
        if let Some(source) = self.poll_source.take() {
            source.remove();
        }
        self.properties_subscription.take();
        debug!("MPRIS player closed: {}", self.bus_name);
        self.callbacks.notify(&SourceEvent::Closed);
    }

    fn call_player_method(&self, method: &str) {
        if self.closed.get() {
            return;
        }
        let method_owned = method.to_string();
        self.connection.call(
            Some(&self.bus_name),
            MPRIS_PATH,
            MPRIS_PLAYER_INTERFACE,
            method,
            None,
            None::<&glib::VariantTy>,
            gio::DBusCallFlags::NONE,
            DBUS_CALL_TIMEOUT_MS,
            None::<&gio::Cancellable>,
            move |res| {
                if let Err(e) = res {
                    warn!("MPRIS {} failed: {}", method_owned, e);
                }
            },
        );
    }
}

impl MediaSource for MprisPlayer {
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
        self.call_player_method("PlayPause");
    }

    fn previous(&self) {
        self.call_player_method("Previous");
    }

    fn next(&self) {
        self.call_player_method("Next");
    }

    fn set_position(&self, seconds: i64) {
        if self.closed.get() {
            return;
        }
        let track_id = self.state.borrow().track_id.clone();
        let track_path = match glib::variant::ObjectPath::try_from(track_id.as_str()) {
            Ok(p) => p,
            Err(_) => {
                warn!("Invalid track ID for SetPosition: {:?}", track_id);
                return;
            }
        };

        // Optimistic update
        self.set_known_position(seconds);

        self.connection.call(
            Some(&self.bus_name),
            MPRIS_PATH,
            MPRIS_PLAYER_INTERFACE,
            "SetPosition",
            Some(&(track_path, seconds * MICROSECONDS_PER_SECOND).to_variant()),
            None::<&glib::VariantTy>,
            gio::DBusCallFlags::NONE,
            DBUS_CALL_TIMEOUT_MS,
            None::<&gio::Cancellable>,
            |res| {
                if let Err(e) = res {
                    warn!("MPRIS SetPosition failed: {}", e);
                }
            },
        );
    }
}

impl Drop for MprisPlayer {
    fn drop(&mut self) {
        self.poll_cancellable.cancel();
        if let Some(source) = self.poll_source.take() {
            source.remove();
        }
    }
}

/// Announces MPRIS players as they appear on the session bus.
pub struct MprisService {
    connection: RefCell<Option<gio::DBusConnection>>,
    /// Connected players, keyed by bus name.
    players: RefCell<HashMap<String, Rc<MprisPlayer>>>,
    /// Bus names whose proxy or desktop entry is still being fetched.
    pending: RefCell<HashSet<String>>,
    added: Callbacks<Rc<dyn MediaSource>>,
    name_owner_subscription: RefCell<Option<gio::SignalSubscription>>,
}

impl MprisService {
    /// Create the service and start connecting to the session bus.
    ///
    /// Players are discovered asynchronously, so subscribers registered right
    /// after construction see every player.
    pub fn new() -> Rc<Self> {
        let service = Rc::new(Self {
            connection: RefCell::new(None),
            players: RefCell::new(HashMap::new()),
            pending: RefCell::new(HashSet::new()),
            added: Callbacks::new(),
            name_owner_subscription: RefCell::new(None),
        });

        Self::init_dbus(&service);
        service
    }

    fn init_dbus(this: &Rc<Self>) {
        let this_weak = Rc::downgrade(this);

        gio::bus_get(
            gio::BusType::Session,
            None::<&gio::Cancellable>,
            move |res| {
                let Some(this) = this_weak.upgrade() else {
                    return;
                };

                let connection = match res {
                    Ok(c) => c,
                    Err(e) => {
                        error!("Failed to connect to session bus: {}", e);
                        return;
                    }
                };

                debug!("Connected to session bus for MPRIS");
                this.connection.replace(Some(connection.clone()));

                let this_weak = Rc::downgrade(&this);
                let subscription = connection.subscribe_to_signal(
                    Some(DBUS_NAME),
                    Some(DBUS_INTERFACE),
                    Some("NameOwnerChanged"),
                    Some(DBUS_PATH),
                    None,
                    gio::DBusSignalFlags::NONE,
                    move |signal| {
                        if let Some(name) = signal.parameters.child_value(0).str()
                            && name.starts_with(MPRIS_PREFIX)
                            && let Some(this) = this_weak.upgrade()
                        {
                            let old_owner_v = signal.parameters.child_value(1);
                            let new_owner_v = signal.parameters.child_value(2);
                            let old_owner = old_owner_v.str().unwrap_or("");
                            let new_owner = new_owner_v.str().unwrap_or("");

                            if old_owner.is_empty() && !new_owner.is_empty() {
                                debug!("MPRIS player appeared: {}", name);
                                this.add_player(name);
                            } else if !old_owner.is_empty() && new_owner.is_empty() {
                                debug!("MPRIS player vanished: {}", name);
                                this.remove_player(name);
                            }
                        }
                    },
                );
                this.name_owner_subscription.replace(Some(subscription));

                this.discover_players();
            },
        );
    }

    /// Add every MPRIS name already on the bus.
    fn discover_players(self: &Rc<Self>) {
        let Some(connection) = self.connection.borrow().clone() else {
            return;
        };

        let this_weak = Rc::downgrade(self);
        connection.call(
            Some(DBUS_NAME),
            DBUS_PATH,
            DBUS_INTERFACE,
            "ListNames",
            None,
            glib::VariantTy::new("(as)").ok(),
            gio::DBusCallFlags::NONE,
            DBUS_CALL_TIMEOUT_MS,
            None::<&gio::Cancellable>,
            move |res| {
                let Some(this) = this_weak.upgrade() else {
                    return;
                };

                let reply = match res {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("Failed to list D-Bus names: {}", e);
                        return;
                    }
                };

                let players: Vec<String> = reply
                    .child_value(0)
                    .iter()
                    .filter_map(|v| v.get::<String>())
                    .filter(|n| n.starts_with(MPRIS_PREFIX))
                    .collect();

                debug!("Discovered {} MPRIS player(s): {:?}", players.len(), players);

                for bus_name in players {
                    this.add_player(&bus_name);
                }
            },
        );
    }

    fn add_player(self: &Rc<Self>, bus_name: &str) {
        if self.players.borrow().contains_key(bus_name)
            || !self.pending.borrow_mut().insert(bus_name.to_string())
        {
            return;
        }

        let bus_name_owned = bus_name.to_string();
        let this_weak = Rc::downgrade(self);

        gio::DBusProxy::for_bus(
            gio::BusType::Session,
            gio::DBusProxyFlags::NONE,
            None::<&gio::DBusInterfaceInfo>,
            bus_name,
            MPRIS_PATH,
            MPRIS_PLAYER_INTERFACE,
            None::<&gio::Cancellable>,
            move |res| {
                let Some(this) = this_weak.upgrade() else {
                    return;
                };

                match res {
                    Ok(proxy) => this.fetch_desktop_entry(bus_name_owned, proxy),
                    Err(e) => {
                        warn!("Failed to create MPRIS proxy for {}: {}", bus_name_owned, e);
                        this.pending.borrow_mut().remove(&bus_name_owned);
                    }
                }
            },
        );
    }

    /// Read `DesktopEntry` from the root interface, then finish adding.
    fn fetch_desktop_entry(self: &Rc<Self>, bus_name: String, proxy: gio::DBusProxy) {
        let Some(connection) = self.connection.borrow().clone() else {
            return;
        };

        let this_weak = Rc::downgrade(self);
        connection.call(
            Some(&bus_name),
            MPRIS_PATH,
            PROPERTIES_INTERFACE,
            "Get",
            Some(&(MPRIS_ROOT_INTERFACE, "DesktopEntry").to_variant()),
            glib::VariantTy::new("(v)").ok(),
            gio::DBusCallFlags::NONE,
            DBUS_CALL_TIMEOUT_MS,
            None::<&gio::Cancellable>,
            move |res| {
                let Some(this) = this_weak.upgrade() else {
                    return;
                };

                let desktop_entry = res
                    .ok()
                    .and_then(|reply| reply.child_value(0).get::<Variant>())
                    .and_then(|v| v.get::<String>())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| player_id_from_bus_name(&bus_name));

                this.finish_add(bus_name, connection, proxy, desktop_entry);
            },
        );
    }

    fn finish_add(
        &self,
        bus_name: String,
        connection: gio::DBusConnection,
        proxy: gio::DBusProxy,
        desktop_entry: String,
    ) {
        // The player may have vanished while we were fetching.
        if !self.pending.borrow_mut().remove(&bus_name) {
            return;
        }

        debug!("Added MPRIS player: {} ({})", desktop_entry, bus_name);
        let player = MprisPlayer::new(bus_name.clone(), connection, proxy, desktop_entry);
        self.players.borrow_mut().insert(bus_name, player.clone());

        let source: Rc<dyn MediaSource> = player;
        self.added.notify(&source);
    }

    fn remove_player(&self, bus_name: &str) {
        self.pending.borrow_mut().remove(bus_name);
        let removed = self.players.borrow_mut().remove(bus_name);
        if let Some(player) = removed {
            player.close();
        }
    }
}

impl MediaControlService for MprisService {
    fn connect_player_added(&self, callback: Box<dyn Fn(&Rc<dyn MediaSource>)>) -> CallbackId {
        self.added.register(callback)
    }

    fn disconnect(&self, id: CallbackId) -> bool {
        self.added.unregister(id)
    }
}

impl Drop for MprisService {
    fn drop(&mut self) {
        trace!("MprisService dropping, closing players");
        self.name_owner_subscription.take();
        for (_, player) in self.players.borrow_mut().drain() {
            player.close();
        }
    }
}
