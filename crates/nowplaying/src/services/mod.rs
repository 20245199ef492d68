//! Toolkit and bus implementations of the core service traits.

pub mod downloads;
pub mod mpris;
pub mod stylesheets;
pub mod template_watcher;
pub mod timer;
