//! Main-loop timer.

use std::time::Duration;

use gtk4::glib;

use nowplaying_core::Timer;

/// Schedules callbacks with `glib::timeout_add_local_once`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlibTimer;

impl Timer for GlibTimer {
    fn schedule_once(&self, delay: Duration, callback: Box<dyn FnOnce()>) {
        glib::timeout_add_local_once(delay, callback);
    }
}
