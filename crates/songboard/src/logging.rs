//! Logging setup for songboard.
//!
//! Output goes through `tracing`. The level comes from the CLI flags unless
//! `RUST_LOG` is set, in which case `RUST_LOG` wins.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above, plus axum extractor rejections.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// Map `-q` and the `-v` count to a verbosity. `-q` wins.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// The most detailed level emitted for songboard's own events.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directives used when `RUST_LOG` is unset.
    ///
    /// axum reports malformed form and JSON bodies under `axum::rejection`
    /// at trace level, so that target is opened up from `Verbose` on.
    #[must_use]
    pub fn directives(self) -> String {
        let base = format!("songboard={}", self.level());
        match self {
            Self::Quiet | Self::Normal => base,
            Self::Verbose | Self::Trace => format!("{base},axum::rejection=trace"),
        }
    }
}

/// Install the global subscriber.
///
/// Call once at startup. Later calls are no-ops.
///
/// ```no_run
/// use songboard::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directives()));

    let detailed = matches!(verbosity, Verbosity::Verbose | Verbosity::Trace);
    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(detailed).with_line_number(detailed));

    let _ = subscriber.try_init();
}

/// Install a warn-level subscriber that writes through the test harness.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
