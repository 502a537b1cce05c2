//! Logging setup

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{MeetingError, MeetingResult};

/// Subscriber settings for the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum level; `RUST_LOG` can add directives on top
    pub level: Level,
    /// One JSON object per line instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingConfig {
    /// Human-readable output at `level`
    pub fn new(level: Level) -> Self {
        LoggingConfig { level, json: false }
    }

    /// Enable JSON formatting
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Install the global subscriber. `RUST_LOG` directives are honoured on top
/// of the configured level.
pub fn setup_logging(config: &LoggingConfig) -> MeetingResult<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let subscriber = fmt::Subscriber::builder().with_env_filter(filter);

    let result = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    result.map_err(|e| MeetingError::config(format!("logging already initialised: {e}")))?;

    tracing::info!("Starting meetwire v{}", crate::VERSION);
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> MeetingResult<Level> {
    Level::from_str(level).map_err(|_| MeetingError::config(format!("Invalid log level: {level}")))
}
