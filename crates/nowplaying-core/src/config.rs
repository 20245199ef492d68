//! Configuration types and parsing.
//!
//! The user file is deep-merged over the embedded default `config.toml`, so
//! a config only needs the keys it wants to change. Empty strings in the
//! `[theme]` section select built-in inputs.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::Table;

use crate::error::{Error, Result};
use crate::palette::Variant;

/// Known valid values for theme.variant.
const VALID_VARIANTS: &[&str] = &["dark", "light"];

/// Known valid values for window.anchor.
const VALID_ANCHORS: &[&str] = &[
    "top-left",
    "top",
    "top-right",
    "bottom-left",
    "bottom",
    "bottom-right",
];

/// Upper bound for card.transition_ms.
const MAX_TRANSITION_MS: u32 = 5000;

/// Embedded default configuration TOML, compiled into the binary.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../../config.toml");

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Path where config was found, if any.
    pub source: Option<PathBuf>,
    /// Whether defaults were used (no config file found).
    pub used_defaults: bool,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Palette and stylesheet generation.
    pub theme: ThemeConfig,

    /// Card layout and animation.
    pub card: CardConfig,

    /// Host window placement.
    pub window: WindowConfig,
}

impl Config {
    /// Load configuration from the embedded default TOML string.
    pub fn from_default_toml() -> Result<Self> {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TOML)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, merging with embedded defaults.
    ///
    /// Returns an error if the file doesn't exist or can't be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::load_with_defaults(&content)
    }

    /// Parse `user_toml`, deep-merge it over the embedded defaults and
    /// deserialize the result.
    pub fn load_with_defaults(user_toml: &str) -> Result<Self> {
        let mut base: Table = toml::from_str(DEFAULT_CONFIG_TOML)?;
        let user: Table = toml::from_str(user_toml)?;

        deep_merge_toml(&mut base, user);

        let config: Config = base.try_into()?;
        Ok(config)
    }

    /// Find and load configuration using the XDG lookup chain.
    ///
    /// If `explicit_path` is `Some`, that path is used directly and an error
    /// is returned if it doesn't exist or can't be parsed (no fallback).
    ///
    /// If `explicit_path` is `None`, searches in order:
    /// 1. `$XDG_CONFIG_HOME/nowplaying/config.toml`
    /// 2. `~/.config/nowplaying/config.toml`
    /// 3. `./config.toml` (current working directory)
    ///
    /// A file that exists but fails to load is an error. Defaults are only
    /// used when no file exists at all.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<ConfigLoadResult> {
        if let Some(path) = explicit_path {
            let config = Self::load(path)?;
            return Ok(ConfigLoadResult {
                config,
                source: Some(path.to_path_buf()),
                used_defaults: false,
            });
        }

        let search_paths = Self::config_search_paths();
        let mut first_error: Option<(PathBuf, Error)> = None;

        for path in &search_paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        return Ok(ConfigLoadResult {
                            config,
                            source: Some(path.clone()),
                            used_defaults: false,
                        });
                    }
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some((path.clone(), e));
                        }
                    }
                }
            }
        }

        if let Some((path, error)) = first_error {
            tracing::error!(
                "Config file {:?} exists but failed to load: {}",
                path,
                error
            );
            return Err(error);
        }

        tracing::info!("No config file found, using built-in default config");
        tracing::debug!(
            "Searched: {}",
            search_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(ConfigLoadResult {
            config: Self::from_default_toml()?,
            source: None,
            used_defaults: true,
        })
    }

    /// Get the list of paths to search for config files.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg_config).join("nowplaying/config.toml"));
        }

        if let Ok(home) = env::var("HOME") {
            paths.push(PathBuf::from(home).join(".config/nowplaying/config.toml"));
        }

        paths.push(PathBuf::from("config.toml"));

        paths
    }

    /// Validate the configuration, returning every invalid value at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !VALID_VARIANTS.contains(&self.theme.variant.as_str()) {
            errors.push(format!(
                "theme.variant: invalid value '{}', expected one of: {}",
                self.theme.variant,
                VALID_VARIANTS.join(", ")
            ));
        }

        if !self.theme.template.is_empty() && !Path::new(&self.theme.template).is_file() {
            errors.push(format!(
                "theme.template: file '{}' does not exist",
                self.theme.template
            ));
        }

        if !self.theme.fallback_art.is_empty() && !Path::new(&self.theme.fallback_art).is_file() {
            errors.push(format!(
                "theme.fallback_art: file '{}' does not exist",
                self.theme.fallback_art
            ));
        }

        if self.card.transition_ms > MAX_TRANSITION_MS {
            errors.push(format!(
                "card.transition_ms: invalid value '{}', must be between 0 and {}",
                self.card.transition_ms, MAX_TRANSITION_MS
            ));
        }

        if self.card.art_size == 0 {
            errors.push("card.art_size: must be greater than 0".to_string());
        }

        if !VALID_ANCHORS.contains(&self.window.anchor.as_str()) {
            errors.push(format!(
                "window.anchor: invalid value '{}', expected one of: {}",
                self.window.anchor,
                VALID_ANCHORS.join(", ")
            ));
        }

        if self.window.width == 0 {
            errors.push("window.width: must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigValidation(errors))
        }
    }

    /// Human-readable summary of the configuration.
    pub fn summary(&self) -> String {
        let or_builtin = |value: &str| {
            if value.is_empty() {
                "(built-in)".to_string()
            } else {
                value.to_string()
            }
        };

        let mut lines = Vec::new();
        lines.push("Theme:".to_string());
        lines.push(format!("  variant: {}", self.theme.variant));
        lines.push(format!("  template: {}", or_builtin(&self.theme.template)));
        lines.push(format!(
            "  fallback_art: {}",
            or_builtin(&self.theme.fallback_art)
        ));
        lines.push(format!("  cache_dir: {}", self.cache_dir().display()));

        lines.push("\nCard:".to_string());
        lines.push(format!("  transition: {}ms", self.card.transition_ms));
        lines.push(format!("  art_size: {}px", self.card.art_size));

        lines.push("\nWindow:".to_string());
        lines.push(format!(
            "  layer_shell: {}, anchor: {}, margin: {}px, width: {}px",
            if self.window.layer_shell {
                "enabled"
            } else {
                "disabled"
            },
            self.window.anchor,
            self.window.margin,
            self.window.width
        ));

        lines.join("\n")
    }

    /// Palette variant. Falls back to dark for values `validate` rejects.
    pub fn variant(&self) -> Variant {
        self.theme.variant.parse().unwrap_or_default()
    }

    /// Directory for generated stylesheets and cached art.
    pub fn cache_dir(&self) -> PathBuf {
        if !self.theme.cache_dir.is_empty() {
            return PathBuf::from(&self.theme.cache_dir);
        }
        default_cache_dir()
    }

    /// Template file, or `None` for the built-in template.
    pub fn template_path(&self) -> Option<PathBuf> {
        non_empty_path(&self.theme.template)
    }

    /// Fallback art file, or `None` for the built-in image.
    pub fn fallback_art_path(&self) -> Option<PathBuf> {
        non_empty_path(&self.theme.fallback_art)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(u64::from(self.card.transition_ms))
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

/// `$XDG_CACHE_HOME/nowplaying`, else `~/.cache/nowplaying`, else a
/// directory under the system temp dir.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(xdg_cache) = env::var("XDG_CACHE_HOME")
        && !xdg_cache.is_empty()
    {
        return PathBuf::from(xdg_cache).join("nowplaying");
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home).join(".cache/nowplaying");
    }
    env::temp_dir().join("nowplaying")
}

/// Deep merge two TOML tables, with `overlay` values taking precedence.
///
/// For nested tables, recursively merges. For arrays and other values,
/// the overlay value completely replaces the base value.
fn deep_merge_toml(base: &mut Table, overlay: Table) {
    for (key, overlay_value) in overlay {
        match (base.get_mut(&key), overlay_value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge_toml(base_table, overlay_table);
            }
            (_, overlay_value) => {
                base.insert(key, overlay_value);
            }
        }
    }
}

/// Theme configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    /// Palette variant: "dark" or "light".
    pub variant: String,

    /// Stylesheet template path. Empty selects the built-in template.
    pub template: String,

    /// Image used when a player reports no art. Empty selects the built-in image.
    pub fallback_art: String,

    /// Cache directory. Empty selects `$XDG_CACHE_HOME/nowplaying`.
    pub cache_dir: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            variant: "dark".to_string(),
            template: String::new(),
            fallback_art: String::new(),
            cache_dir: String::new(),
        }
    }
}

/// Card configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CardConfig {
    /// Reveal and close transition duration in milliseconds.
    pub transition_ms: u32,

    /// Album art edge length in pixels.
    pub art_size: u32,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            transition_ms: 300,
            art_size: 96,
        }
    }
}

/// Window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    /// Place the window on a layer-shell overlay surface.
    pub layer_shell: bool,

    /// Screen corner or edge the window is anchored to.
    pub anchor: String,

    /// Distance from the anchored edges in pixels.
    pub margin: u32,

    /// Window width in pixels.
    pub width: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            layer_shell: true,
            anchor: "top-right".to_string(),
            margin: 12,
            width: 380,
        }
    }
}
