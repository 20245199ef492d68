//! Error types for nowplaying-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid configuration:\n  {}", .0.join("\n  "))]
    ConfigValidation(Vec<String>),

    #[error("stylesheet is not applied: {0}")]
    StylesheetNotApplied(PathBuf),

    #[error("failed to load stylesheet {path}: {reason}")]
    StylesheetLoad { path: PathBuf, reason: String },

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image {0} has no usable pixels")]
    EmptyImage(PathBuf),

    #[error("failed to fetch album art from {url}: {reason}")]
    ArtFetch { url: String, reason: String },

    #[error("template error at byte {offset}: {reason}")]
    TemplateSyntax { offset: usize, reason: String },

    #[error("template references unknown variable '{0}'")]
    TemplateVariable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
