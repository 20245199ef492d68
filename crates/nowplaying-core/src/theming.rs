//! Per-card theming refresh.
//!
//! A refresh resolves the art, removes the card's previous stylesheet,
//! extracts a palette, renders the template to the card's fixed output path
//! and applies the result. Output paths are keyed by desktop entry, so a
//! player that comes back reuses (and overwrites) its old file.
//!
//! Remote art is fetched through the context's [`DownloadRunner`]; the
//! remaining steps run once it arrives, on the thread that asked.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use tracing::{debug, error, info};

use crate::art::{ArtLookup, ArtResolver, CachingArtResolver, DownloadRunner, InlineRunner, file_uri};
use crate::error::{Error, Result};
use crate::palette::{ImagePaletteExtractor, PaletteExtractor, Variant};
use crate::stylesheet::{StylesheetRegistry, card_class, stylesheet_path};
use crate::template::{Template, render_template};

/// Built-in fallback album art.
pub const BUILTIN_FALLBACK_ART: &[u8] = include_bytes!("../../../assets/fallback-art.png");

const BUILTIN_FALLBACK_ART_NAME: &str = "fallback-art.png";

/// Write the built-in fallback art into `cache_dir` (if missing) and return its path.
pub fn ensure_builtin_fallback_art(cache_dir: &Path) -> Result<PathBuf> {
    let path = cache_dir.join(BUILTIN_FALLBACK_ART_NAME);
    if !path.exists() {
        fs::create_dir_all(cache_dir)?;
        fs::write(&path, BUILTIN_FALLBACK_ART)?;
        debug!("Wrote built-in fallback art to {}", path.display());
    }
    Ok(path)
}

/// Shared inputs of every card's theming refresh.
pub struct ThemingContext {
    cache_dir: PathBuf,
    fallback_art: PathBuf,
    variant: Variant,
    template: RefCell<Template>,
    template_path: Option<PathBuf>,
    extractor: Rc<dyn PaletteExtractor>,
    resolver: Rc<dyn ArtResolver>,
    runner: Rc<dyn DownloadRunner>,
    registry: Rc<dyn StylesheetRegistry>,
}

impl ThemingContext {
    /// Create a context using the image-based extractor and a caching art
    /// resolver rooted at `{cache_dir}/art`. Downloads run inline until a
    /// runner is set with [`ThemingContext::with_download_runner`].
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        fallback_art: impl Into<PathBuf>,
        variant: Variant,
        template: Template,
        registry: Rc<dyn StylesheetRegistry>,
    ) -> Self {
        let cache_dir = cache_dir.into();
        let resolver = Rc::new(CachingArtResolver::new(cache_dir.join("art")));
        Self {
            cache_dir,
            fallback_art: fallback_art.into(),
            variant,
            template: RefCell::new(template),
            template_path: None,
            extractor: Rc::new(ImagePaletteExtractor),
            resolver,
            runner: Rc::new(InlineRunner),
            registry,
        }
    }

    pub fn with_extractor(mut self, extractor: Rc<dyn PaletteExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_art_resolver(mut self, resolver: Rc<dyn ArtResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_download_runner(mut self, runner: Rc<dyn DownloadRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Remember the file the template came from so it can be reloaded.
    pub fn with_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn fallback_art(&self) -> &Path {
        &self.fallback_art
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn template_path(&self) -> Option<&Path> {
        self.template_path.as_deref()
    }

    /// Re-read the template file. No-op for the built-in template.
    ///
    /// On error the previous template stays in use.
    pub fn reload_template(&self) -> Result<()> {
        let Some(path) = &self.template_path else {
            return Ok(());
        };
        let template = Template::load(path)?;
        self.template.replace(template);
        info!("Reloaded stylesheet template from {}", path.display());
        Ok(())
    }

    /// Stylesheet output path for a desktop entry.
    pub fn output_path(&self, desktop_entry: &str) -> PathBuf {
        stylesheet_path(&self.cache_dir, desktop_entry)
    }
}

/// Theming state owned by one card.
pub struct ThemeRefresher {
    context: Rc<ThemingContext>,
    desktop_entry: String,
    output: PathBuf,
    /// Bumped by every refresh; a download only applies if it is still current.
    generation: Cell<u64>,
    self_ref: Weak<ThemeRefresher>,
}

impl ThemeRefresher {
    pub fn new(context: Rc<ThemingContext>, desktop_entry: &str) -> Rc<Self> {
        let output = context.output_path(desktop_entry);
        Rc::new_cyclic(|self_ref| Self {
            context,
            desktop_entry: desktop_entry.to_string(),
            output,
            generation: Cell::new(0),
            self_ref: self_ref.clone(),
        })
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Look up the image to extract colors from: the reported art, or the
    /// fallback when there is none.
    pub fn lookup_art(&self, art_url: Option<&str>) -> ArtLookup {
        match art_url.filter(|url| !url.is_empty()) {
            Some(url) => self.context.resolver.resolve(url),
            None => ArtLookup::Ready(Ok(self.context.fallback_art.clone())),
        }
    }

    /// Regenerate and re-apply this card's stylesheet.
    ///
    /// Local art is applied before this returns. Remote art is downloaded by
    /// the context's runner and applied when it arrives, unless a newer
    /// refresh started in the meantime; failures at that point are logged.
    pub fn refresh(&self, art_url: Option<&str>) -> Result<()> {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let download = match self.lookup_art(art_url) {
            ArtLookup::Ready(art) => return self.apply_art(&art?),
            ArtLookup::Download(download) => download,
        };

        debug!("Theming {} once {} is downloaded", self.desktop_entry, download.url());
        let weak = self.self_ref.clone();
        self.context.runner.run(
            download,
            Box::new(move |result: Result<PathBuf>| {
                let Some(refresher) = weak.upgrade() else {
                    return;
                };
                if refresher.generation.get() != generation {
                    debug!("Dropping stale art download for {}", refresher.desktop_entry);
                    return;
                }
                if let Err(e) = result.and_then(|art| refresher.apply_art(&art)) {
                    error!("Failed to theme {} from downloaded art: {}", refresher.desktop_entry, e);
                }
            }),
        );
        Ok(())
    }

    /// Steps after art resolution: remove, extract, render, apply.
    fn apply_art(&self, art: &Path) -> Result<()> {
        match self.context.registry.remove(&self.output) {
            Ok(()) | Err(Error::StylesheetNotApplied(_)) => {}
            Err(e) => return Err(e),
        }

        let mut palette = self.context.extractor.extract(art, self.context.variant)?;
        palette.insert("art_url", art.display().to_string());
        palette.insert("art_uri", file_uri(art));
        palette.insert("desktop_entry", self.desktop_entry.clone());
        palette.insert("card_class", card_class(&self.desktop_entry));

        render_template(&palette, &self.context.template.borrow(), &self.output)?;
        self.context.registry.apply(&self.output)?;

        debug!(
            "Applied stylesheet {} for {} (art: {})",
            self.output.display(),
            self.desktop_entry,
            art.display()
        );
        Ok(())
    }
}
