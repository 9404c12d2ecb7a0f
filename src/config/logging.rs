//! Logging configuration types.

use serde::de::{value, DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

use crate::error::KumiageError;

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    /// Maps `-q` and repeated `-v` flags to a level.
    ///
    /// Returns `None` when neither flag was given, leaving the configured
    /// level in charge.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Option<Self> {
        match (quiet, verbose) {
            (true, _) => Some(LogLevel::Error),
            (false, 0) => None,
            (false, 1) => Some(LogLevel::Debug),
            (false, _) => Some(LogLevel::Trace),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Log format.
///
/// Text is the default since kumiage is mostly driven from a terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    #[default]
    Stderr,
    /// Appends to `logging.file_path`.
    File,
}

/// Parses a case-insensitive keyword with the same names the config file accepts.
fn parse_keyword<T: DeserializeOwned>(kind: &str, s: &str) -> Result<T, KumiageError> {
    let lowered = s.to_lowercase();
    T::deserialize(IntoDeserializer::<value::Error>::into_deserializer(
        lowered.as_str(),
    ))
    .map_err(|_| KumiageError::config(format!("Unknown log {}: {}", kind, s)))
}

impl FromStr for LogLevel {
    type Err = KumiageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_keyword("level", s)
    }
}

impl FromStr for LogFormat {
    type Err = KumiageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_keyword("format", s)
    }
}

impl FromStr for LogOutput {
    type Err = KumiageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_keyword("output", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.output, LogOutput::Stderr);
        assert!(config.file_path.is_none());
    }

    #[test]
    fn test_effective_level_prefers_cli() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            ..Default::default()
        };
        assert_eq!(config.effective_level(None), LogLevel::Warn);
        assert_eq!(config.effective_level(Some(LogLevel::Trace)), LogLevel::Trace);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);

        let err = "loud".parse::<LogLevel>().unwrap_err();
        assert!(err.to_string().contains("Unknown log level: loud"));
    }

    #[test]
    fn test_keywords_match_config_file() {
        let config: LoggingConfig =
            serde_yaml::from_str("level: warning\nformat: json\noutput: file\n").unwrap();
        assert_eq!(config.level, "Warning".parse().unwrap());
        assert_eq!(config.format, "JSON".parse().unwrap());
        assert_eq!(config.output, "File".parse().unwrap());

        assert!("xml".parse::<LogFormat>().is_err());
        assert!("syslog".parse::<LogOutput>().is_err());
    }

    #[test]
    fn test_from_verbosity() {
        assert_eq!(LogLevel::from_verbosity(0, false), None);
        assert_eq!(LogLevel::from_verbosity(1, false), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_verbosity(4, false), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_verbosity(0, true), Some(LogLevel::Error));
    }

    #[test]
    fn test_level_filter() {
        assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::DEBUG);
        assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
        assert!(LevelFilter::from(LogLevel::Warn) < LevelFilter::from(LogLevel::Trace));
    }
}
