//! Tracing setup. Logs go to stderr; stdout carries the IPC responses.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "SCHOOLBOOKD_LOG";
pub const LOG_FORMAT_ENV: &str = "SCHOOLBOOKD_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level: std::env::var(LOG_ENV).unwrap_or(defaults.level),
            format: std::env::var(LOG_FORMAT_ENV).unwrap_or(defaults.format),
        }
    }

    /// `SCHOOLBOOKD_LOG` wins, then `RUST_LOG`, then the configured level.
    fn filter(&self) -> EnvFilter {
        match std::env::var(LOG_ENV) {
            Ok(directive) => EnvFilter::try_new(directive)
                .unwrap_or_else(|_| EnvFilter::new(&self.level)),
            Err(_) => {
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
            }
        }
    }

    pub fn init(&self) {
        let filter = self.filter();
        match self.format.as_str() {
            "json" => {
                let _ = fmt()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_env_filter(filter)
                    .try_init();
            }
            _ => {
                let _ = fmt()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_env_filter(filter)
                    .try_init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}
