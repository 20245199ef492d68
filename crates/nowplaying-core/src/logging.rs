//! Logging setup.
//!
//! `RUST_LOG` takes precedence when set. Otherwise the `-v` count picks the
//! level: none = warn, `-v` = info, `-vv` = debug, `-vvv` = trace.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Map a verbosity count to a default filter directive.
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(verbosity: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(0), "warn");
        assert_eq!(level_for_verbosity(1), "info");
        assert_eq!(level_for_verbosity(2), "debug");
        assert_eq!(level_for_verbosity(3), "trace");
        assert_eq!(level_for_verbosity(200), "trace");
    }
}
