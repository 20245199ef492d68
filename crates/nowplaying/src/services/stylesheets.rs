//! Per-path CSS providers on the default display.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gtk4::gdk::Display;
use gtk4::CssProvider;
use tracing::{debug, warn};

use nowplaying_core::{Error, Result, StylesheetRegistry};

/// Generated card stylesheets sit above the base stylesheet.
pub const CARD_CSS_PRIORITY: u32 = gtk4::STYLE_PROVIDER_PRIORITY_USER + 10;

/// Stylesheet registry keyed by file path, one `CssProvider` per path.
pub struct CssRegistry {
    display: Display,
    providers: RefCell<HashMap<PathBuf, CssProvider>>,
}

impl CssRegistry {
    pub fn new(display: Display) -> Self {
        Self {
            display,
            providers: RefCell::new(HashMap::new()),
        }
    }
}

impl StylesheetRegistry for CssRegistry {
    fn apply(&self, path: &Path) -> Result<()> {
        let css = std::fs::read_to_string(path).map_err(|e| Error::StylesheetLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let provider = CssProvider::new();
        let shown = path.display().to_string();
        provider.connect_parsing_error(move |_, section, error| {
            warn!("CSS error in {} at {}: {}", shown, section.to_str(), error);
        });
        provider.load_from_string(&css);

        gtk4::style_context_add_provider_for_display(&self.display, &provider, CARD_CSS_PRIORITY);

        let previous = self
            .providers
            .borrow_mut()
            .insert(path.to_path_buf(), provider);
        if let Some(previous) = previous {
            gtk4::style_context_remove_provider_for_display(&self.display, &previous);
        }

        debug!("Applied stylesheet {}", path.display());
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let provider = self
            .providers
            .borrow_mut()
            .remove(path)
            .ok_or_else(|| Error::StylesheetNotApplied(path.to_path_buf()))?;
        gtk4::style_context_remove_provider_for_display(&self.display, &provider);
        debug!("Removed stylesheet {}", path.display());
        Ok(())
    }
}
