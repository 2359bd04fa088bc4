//! Service configuration loaded from YAML.
//!
//! Every section rejects keys it does not know, so a typo in a config file is
//! a startup error instead of a silently ignored setting. All fields have
//! defaults; an empty file is a valid configuration.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::Path;

use crate::logging::{LogConfig, LogFormat};
use crate::spec::Encoding;

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, source: io::Error },
    Parse(serde_yaml::Error),
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "cannot read config {path}: {source}"),
            ConfigError::Parse(err) => write!(f, "invalid config: {err}"),
            ConfigError::Invalid { field, reason } => write!(f, "invalid value for {field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub openapi: OpenApiConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HttpConfig {
    pub addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Document-level metadata for the emitted OpenAPI description.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OpenApiConfig {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    pub servers: Vec<String>,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            title: "apiroute".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: None,
            servers: Vec::new(),
        }
    }
}

/// Settings the dispatcher receives at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DispatchConfig {
    /// Used when the client sends no `Accept` header or nothing acceptable.
    pub default_media_type: String,
    /// Larger request bodies are rejected as malformed.
    pub max_body_bytes: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_media_type: Encoding::Json.mime().to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl DispatchConfig {
    /// The configured default as an encoding; JSON if it names none.
    #[must_use]
    pub fn default_encoding(&self) -> Encoding {
        Encoding::from_media_type(&self.default_media_type).unwrap_or(Encoding::Json)
    }
}

/// Logging overrides. Fields left out fall back to the `APIROUTE_LOG_*`
/// environment variables, then to the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
}

impl LoggingConfig {
    /// Merge with the environment; the config file wins where it sets a value.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        self.merge_onto(LogConfig::from_env())
    }

    #[must_use]
    pub fn merge_onto(&self, base: LogConfig) -> LogConfig {
        LogConfig {
            level: self.level.clone().unwrap_or(base.level),
            format: self.format.unwrap_or(base.format),
            ..base
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = if content.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(ConfigError::Parse)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http
            .addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                field: "http.addr",
                reason: e.to_string(),
            })?;
        if Encoding::from_media_type(&self.dispatch.default_media_type).is_none() {
            return Err(ConfigError::Invalid {
                field: "dispatch.default_media_type",
                reason: format!(
                    "'{}' is neither {} nor {}",
                    self.dispatch.default_media_type,
                    Encoding::Json.mime(),
                    Encoding::Xml.mime()
                ),
            });
        }
        if self.dispatch.max_body_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "dispatch.max_body_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.openapi.title.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "openapi.title",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = AppConfig::from_yaml_str("").unwrap();
        assert_eq!(config.http.addr, "0.0.0.0:8080");
        assert_eq!(config.dispatch.default_encoding(), Encoding::Json);
        assert_eq!(config.dispatch.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn unknown_keys_are_rejected_in_nested_sections() {
        let err = AppConfig::from_yaml_str("dispatch:\n  max_body: 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("max_body"));
    }

    #[test]
    fn absent_logging_fields_keep_the_base() {
        let base = LogConfig {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
        };
        let config = AppConfig::from_yaml_str("http:\n  addr: 127.0.0.1:1\n").unwrap();
        assert_eq!(config.logging.merge_onto(base.clone()), base);

        let config = AppConfig::from_yaml_str("logging:\n  level: debug\n").unwrap();
        let merged = config.logging.merge_onto(base);
        assert_eq!(merged.level, "debug");
        assert_eq!(merged.format, LogFormat::Pretty);
        assert!(merged.include_location);
    }

    #[test]
    fn xml_default_is_accepted() {
        let config =
            AppConfig::from_yaml_str("dispatch:\n  default_media_type: application/xml\n").unwrap();
        assert_eq!(config.dispatch.default_encoding(), Encoding::Xml);
    }

    #[test]
    fn unsupported_default_media_type_is_invalid() {
        let err = AppConfig::from_yaml_str("dispatch:\n  default_media_type: text/plain\n")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "dispatch.default_media_type",
                ..
            }
        ));
    }
}
