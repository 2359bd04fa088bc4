//! Structured logging setup.
//!
//! One `tracing_subscriber` registry with an `EnvFilter` and a `fmt` layer.
//! `RUST_LOG` always wins over the configured level so a running service can
//! be made chattier without touching its config file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// JSON for production, pretty-printed for development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    /// Unknown names fall back to JSON.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("pretty") {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// trace / debug / info / warn / error
    pub level: String,
    pub format: LogFormat,
    /// Add file and line to each event.
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Read `APIROUTE_LOG_LEVEL`, `APIROUTE_LOG_FORMAT` and
    /// `APIROUTE_LOG_INCLUDE_LOCATION`, falling back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level: env::var("APIROUTE_LOG_LEVEL").unwrap_or(defaults.level),
            format: env::var("APIROUTE_LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.format),
            include_location: env::var("APIROUTE_LOG_INCLUDE_LOCATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.include_location),
        }
    }

    fn level(&self) -> Level {
        self.level.trim().parse().unwrap_or(Level::INFO)
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level().as_str()));
    // Client disconnects are reported by the transport at info.
    if let Ok(directive) = "may_minihttp=warn".parse() {
        filter = filter.add_directive(directive);
    }

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install the tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parse_defaults_to_json() {
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    #[test]
    fn unknown_level_means_info() {
        let config = LogConfig {
            level: "chatty".to_string(),
            ..LogConfig::default()
        };
        assert_eq!(config.level(), Level::INFO);
        let config = LogConfig {
            level: "DEBUG".to_string(),
            ..LogConfig::default()
        };
        assert_eq!(config.level(), Level::DEBUG);
    }
}
