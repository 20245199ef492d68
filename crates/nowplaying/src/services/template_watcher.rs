//! Live reload of the stylesheet template.
//!
//! A watcher thread observes the template's directory with a debounced
//! `notify` watcher. Changes hop to the GTK main thread through
//! `glib::idle_add_once`, where the registered handler reloads the template
//! and re-themes every card.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use gtk4::glib;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer, notify::RecursiveMode};
use tracing::{debug, error, info};

/// Debounce interval (in ms) for file change events. Editors often trigger
/// multiple events for a single save.
const FILE_CHANGE_DEBOUNCE_MS: u64 = 300;

/// How often the watcher thread checks its shutdown flag.
const SHUTDOWN_POLL_MS: u64 = 500;

thread_local! {
    static CHANGE_HANDLER: RefCell<Option<Box<dyn Fn()>>> = const { RefCell::new(None) };
}

/// Run the main-thread handler. Called via `glib::idle_add_once`.
fn dispatch_change() {
    CHANGE_HANDLER.with(|cell| {
        if let Some(handler) = cell.borrow().as_ref() {
            handler();
        }
    });
}

/// Watches one template file until dropped.
pub struct TemplateWatcher {
    shutdown_flag: Arc<AtomicBool>,
}

impl TemplateWatcher {
    /// Start watching `path`. `on_change` runs on the calling (main) thread.
    pub fn start<F>(path: &Path, on_change: F) -> Option<Self>
    where
        F: Fn() + 'static,
    {
        let canonical = match path.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to canonicalize template path {}: {}", path.display(), e);
                return None;
            }
        };

        CHANGE_HANDLER.with(|cell| {
            cell.replace(Some(Box::new(on_change)));
        });

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let thread_flag = shutdown_flag.clone();
        info!("Starting template watcher for: {}", canonical.display());
        thread::spawn(move || run_file_watcher(canonical, thread_flag));

        Some(Self { shutdown_flag })
    }
}

impl Drop for TemplateWatcher {
    fn drop(&mut self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
        CHANGE_HANDLER.with(|cell| {
            cell.replace(None);
        });
    }
}

/// Run the file watcher loop (called on a background thread).
fn run_file_watcher(path: PathBuf, shutdown_flag: Arc<AtomicBool>) {
    let debounce_duration = Duration::from_millis(FILE_CHANGE_DEBOUNCE_MS);
    let watched = path.clone();

    let mut debouncer = match new_debouncer(debounce_duration, move |res: DebounceEventResult| {
        match res {
            Ok(events) => {
                if events.iter().any(|e| e.path == watched) {
                    debug!("Template change detected");
                    glib::idle_add_once(dispatch_change);
                }
            }
            Err(err) => {
                error!("File watcher error: {}", err);
            }
        }
    }) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to create template watcher: {}", e);
            return;
        }
    };

    // Watch the parent directory; editors often replace files on save.
    let watch_dir = path.parent().unwrap_or(&path);
    if let Err(e) = debouncer
        .watcher()
        .watch(watch_dir, RecursiveMode::NonRecursive)
    {
        error!("Failed to watch template directory: {}", e);
        return;
    }

    info!("Template watcher started, watching: {}", watch_dir.display());

    while !shutdown_flag.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(SHUTDOWN_POLL_MS));
    }

    debug!("Template watcher thread shutting down");
}
