// Tracing subscriber setup.
// Pretty or JSON output to stderr, or to a log file while the terminal UI owns the screen.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{ApiError, Result};

/// Environment variable selecting the log format (`json` or anything else for pretty).
pub const LOG_FORMAT_ENV: &str = "NATIVIWEB_LOG_FORMAT";

const DEFAULT_FILTER: &str = "warn,nativiweb=info";

/// Telemetry configuration.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Write logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl TelemetryConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            json: std::env::var(LOG_FORMAT_ENV)
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            log_file: None,
        }
    }

    pub fn with_log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init(config: &TelemetryConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match (&config.log_file, config.json) {
        (Some(path), json) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            if json {
                registry.with(layer.json()).try_init()
            } else {
                registry.with(layer).try_init()
            }
        }
        (None, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        (None, false) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.map_err(|e| ApiError::Other(format!("failed to install log subscriber: {}", e)))?;

    tracing::debug!(
        json = config.json,
        log_file = ?config.log_file,
        "telemetry initialized"
    );
    Ok(())
}
