//! nowplaying - media player cards themed from album art
//!
//! Main entry point: parses arguments, loads configuration and runs the GTK
//! application that shows one card per MPRIS player.

mod services;
pub mod styles;
mod widgets;
mod window;

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use gtk4::prelude::*;
use gtk4::{Application, CssProvider};
use tracing::{debug, error, info, warn};

use nowplaying_core::template::Template;
use nowplaying_core::theming::ensure_builtin_fallback_art;
use nowplaying_core::{Config, MediaContainer, ThemingContext, logging};

use crate::services::downloads::GioDownloadRunner;
use crate::services::mpris::MprisService;
use crate::services::stylesheets::CssRegistry;
use crate::services::template_watcher::TemplateWatcher;
use crate::services::timer::GlibTimer;
use crate::widgets::css::load_base_css;
use crate::widgets::media_container::GtkCardLayout;

/// nowplaying - media player cards themed from album art
#[derive(Parser, Debug)]
#[command(name = "nowplaying", version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (uses XDG lookup if not specified)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print example configuration and exit
    #[arg(long)]
    print_example_config: bool,

    /// Validate configuration and exit (returns non-zero on errors)
    #[arg(long)]
    check_config: bool,
}

/// Objects that must live as long as the application.
struct AppState {
    _container: Rc<MediaContainer>,
    _base_css: CssProvider,
    _watcher: Option<TemplateWatcher>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    logging::init(args.verbose);

    // --print-example-config needs no valid config
    if args.print_example_config {
        print!("{}", nowplaying_core::config::DEFAULT_CONFIG_TOML);
        return ExitCode::SUCCESS;
    }

    // If --config is specified, it must exist and be valid (no fallback)
    let load_result = match Config::find_and_load(args.config.as_deref()) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref source) = load_result.source {
        info!("Loaded configuration from {:?}", source);
    } else if load_result.used_defaults {
        warn!("Using default configuration (no config file found)");
    }

    let config = load_result.config;

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    debug!("Configuration validated successfully");

    if args.check_config {
        if let Some(ref source) = load_result.source {
            println!("Configuration valid: {}", source.display());
        } else {
            println!("Configuration valid (using defaults)");
        }
        println!("{}", config.summary());
        return ExitCode::SUCCESS;
    }

    run_gtk_app(config)
}

/// Build the theming context shared by all cards.
fn build_theming(config: &Config, registry: Rc<CssRegistry>) -> anyhow::Result<ThemingContext> {
    let cache_dir = config.cache_dir();

    let template = match config.template_path() {
        Some(path) => Template::load(&path)
            .with_context(|| format!("loading template {}", path.display()))?,
        None => Template::builtin().context("parsing built-in template")?,
    };

    let fallback_art = match config.fallback_art_path() {
        Some(path) => path,
        None => ensure_builtin_fallback_art(&cache_dir)
            .with_context(|| format!("writing fallback art to {}", cache_dir.display()))?,
    };

    let mut theming = ThemingContext::new(
        cache_dir,
        fallback_art,
        config.variant(),
        template,
        registry,
    )
    .with_download_runner(Rc::new(GioDownloadRunner));
    if let Some(path) = config.template_path() {
        theming = theming.with_template_path(path);
    }
    Ok(theming)
}

/// Create the window, services and container.
fn activate(app: &Application, config: &Config) -> anyhow::Result<AppState> {
    let display = gtk4::gdk::Display::default()
        .context("could not get default display - is a display server running?")?;

    let base_css = load_base_css(&display, config.card.art_size);
    let registry = Rc::new(CssRegistry::new(display));
    let theming = Rc::new(build_theming(config, registry)?);

    let layout = Rc::new(GtkCardLayout::new(
        config.card.art_size,
        config.card.transition_ms,
    ));
    let win = window::create_window(app, &config.window, layout.widget());

    let container = MediaContainer::new(
        MprisService::new(),
        layout,
        theming.clone(),
        Rc::new(GlibTimer),
        config.transition(),
    );
    info!("Media container ready with {} card(s)", container.len());

    let watcher = theming.template_path().and_then(|path| {
        let theming = theming.clone();
        let container = Rc::downgrade(&container);
        TemplateWatcher::start(path, move || {
            if let Err(e) = theming.reload_template() {
                error!("Keeping previous template: {}", e);
                return;
            }
            if let Some(container) = container.upgrade() {
                container.refresh_themes();
            }
        })
    });

    win.present();

    Ok(AppState {
        _container: container,
        _base_css: base_css,
        _watcher: watcher,
    })
}

/// Initialize and run the GTK4 application.
fn run_gtk_app(config: Config) -> ExitCode {
    // SAFETY: called before GTK initialization and before any other thread
    // is spawned, so nothing else reads the environment concurrently.
    if std::env::var("GDK_BACKEND").is_err() {
        unsafe {
            std::env::set_var("GDK_BACKEND", "wayland");
        }
    }

    let app = Application::builder()
        .application_id("io.github.nowplaying")
        .flags(gtk4::gio::ApplicationFlags::NON_UNIQUE)
        .build();

    app.connect_activate(move |app| {
        info!("GTK application activated");

        match activate(app, &config) {
            Ok(state) => {
                // Attach to the application so everything stays alive until exit.
                unsafe {
                    app.set_data("nowplaying-state", state);
                }
            }
            Err(e) => {
                error!("Startup failed: {:#}", e);
                app.quit();
            }
        }
    });

    app.connect_shutdown(|_| {
        info!("GTK application shutting down");
    });

    // Run the application with empty args (we already parsed with clap)
    let empty_args: Vec<String> = vec![];
    let status = app.run_with_args(&empty_args);

    if status == gtk4::glib::ExitCode::SUCCESS {
        ExitCode::SUCCESS
    } else {
        error!("GTK application exited with error");
        ExitCode::FAILURE
    }
}
