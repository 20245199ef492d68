//! Stylesheet registry seam and output path naming.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Process-wide registry of applied stylesheets, keyed by file path.
pub trait StylesheetRegistry {
    /// Load the file at `path` and apply it.
    fn apply(&self, path: &Path) -> Result<()>;

    /// Remove the stylesheet applied from `path`.
    ///
    /// Returns `Error::StylesheetNotApplied` if nothing is registered for it.
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Output path of the generated stylesheet for a desktop entry.
///
/// The file name escapes `%`, `/`, `\` and NUL so that distinct entries never
/// map to the same file and never escape `cache_dir`.
pub fn stylesheet_path(cache_dir: &Path, desktop_entry: &str) -> PathBuf {
    let mut name = String::with_capacity(desktop_entry.len() + 4);
    for c in desktop_entry.chars() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            '\\' => name.push_str("%5C"),
            '\0' => name.push_str("%00"),
            c => name.push(c),
        }
    }
    name.push_str(".css");
    cache_dir.join(name)
}

/// CSS class used to scope a card's generated stylesheet.
///
/// ASCII alphanumerics and `-` pass through; everything else becomes
/// `_xx` (lowercase hex per UTF-8 byte), so the mapping is injective.
pub fn card_class(desktop_entry: &str) -> String {
    let mut class = String::from("media-card-");
    for byte in desktop_entry.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            class.push(byte as char);
        } else {
            class.push_str(&format!("_{byte:02x}"));
        }
    }
    class
}
