//! Art downloads off the main loop.

use std::path::PathBuf;

use gtk4::{gio, glib};
use tracing::debug;

use nowplaying_core::Error;
use nowplaying_core::art::{ArtDownload, DownloadRunner};

/// Runs downloads on the gio blocking pool and reports back on the main loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct GioDownloadRunner;

impl DownloadRunner for GioDownloadRunner {
    fn run(
        &self,
        download: ArtDownload,
        done: Box<dyn FnOnce(nowplaying_core::Result<PathBuf>)>,
    ) {
        let url = download.url().to_string();

        // minreq is blocking, so spawn in thread pool
        glib::spawn_future_local(async move {
            let result = match gio::spawn_blocking(move || download.run()).await {
                Ok(result) => result,
                Err(_) => Err(Error::ArtFetch {
                    url: url.clone(),
                    reason: "download task panicked".to_string(),
                }),
            };
            debug!("Album art download finished: {}", url);
            done(result);
        });
    }
}
