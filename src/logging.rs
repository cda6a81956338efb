//! Logging setup.
//!
//! Logs go to **stderr**; stdout belongs to the plugin host. `RUST_LOG`
//! controls filtering, e.g. `RUST_LOG=lightdash_provider=debug` to see each
//! API request.

use tracing_subscriber::{fmt, prelude::*, registry::Registry, EnvFilter};

/// Filter used when `RUST_LOG` is unset: provider logs at `info`, HTTP
/// internals at `warn`.
pub const DEFAULT_DIRECTIVES: &str = "warn,lightdash_provider=info";

fn subscriber(default_directives: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    Registry::default().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the global subscriber with [`DEFAULT_DIRECTIVES`].
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_DIRECTIVES);
}

/// Install the global subscriber, falling back to `default_directives`
/// when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init_logging_with_default(default_directives: &str) {
    subscriber(default_directives).init();
}

/// Like [`init_logging`], but returns `false` instead of panicking when a
/// subscriber is already set.
pub fn try_init_logging() -> bool {
    subscriber(DEFAULT_DIRECTIVES).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVES).is_ok());
        assert!(EnvFilter::try_new("lightdash_provider::client=debug").is_ok());
    }

    #[test]
    fn test_try_init_twice() {
        // The first call may lose to another test's subscriber; the second never wins.
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
