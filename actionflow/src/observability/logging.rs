//! Subscriber setup for `tracing` output.
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: default filter when `RUST_LOG` is unset (defaults to `info`)
//! - `LOG_FORMAT`: `json`, `pretty` or `compact` (defaults to `compact`)
//! - `LOG_SPANS`: include span open/close events (defaults to `false`)
//! - `RUST_LOG`: overrides the filter entirely

use serde::{Deserialize, Serialize};
use std::env;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line, human readable.
    Pretty,
    /// Single-line, terminal friendly.
    #[default]
    Compact,
}

impl LogFormat {
    /// Parses a format name, falling back to [`LogFormat::Compact`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Emit span open and close events.
    pub include_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            include_spans: false,
        }
    }
}

impl LogConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `LOG_LEVEL`, `LOG_FORMAT` and `LOG_SPANS`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level: env::var("LOG_LEVEL").map_or(defaults.level, |level| level.to_lowercase()),
            format: env::var("LOG_FORMAT").map_or(defaults.format, |format| LogFormat::parse(&format)),
            include_spans: env::var("LOG_SPANS").is_ok_and(|spans| spans.eq_ignore_ascii_case("true")),
        }
    }

    /// Sets the level directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables span events.
    #[must_use]
    pub const fn with_spans(mut self, include: bool) -> Self {
        self.include_spans = include;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Installs a global subscriber.
///
/// Returns false if a subscriber was already installed, which makes repeated
/// calls from tests harmless.
pub fn init_tracing(config: &LogConfig) -> bool {
    let subscriber = tracing_subscriber::registry().with(config.filter());

    let installed = match config.format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_span_events(config.span_events()))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().pretty().with_span_events(config.span_events()))
            .try_init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_span_events(config.span_events()),
            )
            .try_init(),
    };

    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("whatever"), LogFormat::Compact);
    }

    #[test]
    fn test_config_builder() {
        let config = LogConfig::new()
            .with_level("debug")
            .with_format(LogFormat::Json)
            .with_spans(true);

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.span_events(), FmtSpan::NEW | FmtSpan::CLOSE);
    }

    #[test]
    fn test_config_deserialize() {
        let config: LogConfig = serde_json::from_str(r#"{"format": "pretty"}"#).unwrap();

        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LogConfig::new().with_level("warn");
        init_tracing(&config);

        assert!(!init_tracing(&config));
    }
}
