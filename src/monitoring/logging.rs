//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events; binaries and tests call
//! [`init_tracing`] once to print them. Per-epoch lines use the `training`
//! target so they can be filtered separately (`RUST_LOG=training=info`).

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Target used for per-epoch training lines.
pub const TRAINING_TARGET: &str = "training";

/// Output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// Multi-field single line
    Full,
    /// Abbreviated single line
    Compact,
}

/// Subscriber configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Filter directive, used when `RUST_LOG` is unset
    pub filter: String,
    /// Output format
    pub format: LogFormat,
    /// Include event targets
    pub with_target: bool,
    /// Colored output
    pub ansi: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Full,
            with_target: true,
            ansi: true,
        }
    }
}

impl LoggerConfig {
    /// Config with a specific filter directive.
    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filter = filter.to_string();
        self
    }

    /// Set output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Build the filter; `RUST_LOG` takes precedence.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.filter))
    }
}

/// Install a global fmt subscriber with the given filter directive.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing(filter: &str) -> bool {
    init_with(&LoggerConfig::default().with_filter(filter))
}

/// Install a global fmt subscriber from a full config.
pub fn init_with(config: &LoggerConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_target(config.with_target)
        .with_ansi(config.ansi);
    match config.format {
        LogFormat::Full => builder.try_init().is_ok(),
        LogFormat::Compact => builder.compact().try_init().is_ok(),
    }
}
