//! Server configuration: bind address, read deadlines and size limits.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.
//!
//! ```toml
//! bind = "0.0.0.0:3333"
//! head_timeout_ms = 50
//! body_timeout_ms = 5000
//! max_content_length = 65536
//! hosts = ["gateway", "nas.local"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Tunables for [`Server`](crate::server::Server) and the `pingmon` binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the listener binds to (default `127.0.0.1:3333`).
    pub bind: String,

    /// Size of the first read that is expected to hold the request head (default `2048`).
    pub head_buffer_size: usize,

    /// Deadline for the head read in milliseconds (default `50`).
    ///
    /// Clients are expected to send the request as soon as they connect, so this
    /// only needs to cover a few round trips on a local network.
    pub head_timeout_ms: u64,

    /// Overall deadline for collecting the declared body in milliseconds (default `5000`).
    pub body_timeout_ms: u64,

    /// Largest `Content-Length` accepted before answering `413` (default `65536`).
    pub max_content_length: usize,

    /// Hosts whose charts are served under `/chart/<host>`.
    pub hosts: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3333".to_owned(),
            head_buffer_size: 2048,
            head_timeout_ms: 50,
            body_timeout_ms: 5000,
            max_content_length: 1 << 16,
            hosts: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Parses a TOML document, filling omitted fields with defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML or unknown keys,
    /// [`ConfigError::Invalid`] for values the server cannot run with.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn head_timeout(&self) -> Duration {
        Duration::from_millis(self.head_timeout_ms)
    }

    pub fn body_timeout(&self) -> Duration {
        Duration::from_millis(self.body_timeout_ms)
    }

    /// Checks values the server cannot run with.
    ///
    /// Called by the loaders; call it again after changing fields by hand.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.head_buffer_size == 0 {
            return Err(ConfigError::Invalid("head_buffer_size must be positive"));
        }
        if self.max_content_length == 0 {
            return Err(ConfigError::Invalid("max_content_length must be positive"));
        }
        if self.head_timeout_ms == 0 || self.body_timeout_ms == 0 {
            return Err(ConfigError::Invalid("read timeouts must be positive"));
        }
        if let Some(host) = self.hosts.iter().find(|h| h.is_empty() || h.contains('/')) {
            tracing::warn!(host = %host, "rejecting host name that cannot be a path segment");
            return Err(ConfigError::Invalid("host names must be non-empty and contain no `/`"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.head_buffer_size, 2048);
        assert_eq!(config.max_content_length, 65536);
        assert_eq!(config.body_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn partial_override() {
        let config = ServerConfig::from_toml_str(
            r#"
            bind = "0.0.0.0:8080"
            body_timeout_ms = 250
            hosts = ["gateway", "nas.local"]
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.body_timeout(), Duration::from_millis(250));
        assert_eq!(config.head_timeout_ms, 50);
        assert_eq!(config.hosts, vec!["gateway", "nas.local"]);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = ServerConfig::from_toml_str("port = 80").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ServerConfig::from_toml_str("head_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_content_length_cap_is_rejected() {
        let err = ServerConfig::from_toml_str("max_content_length = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("max_content_length")));
    }

    #[test]
    fn hosts_added_after_loading_are_checked() {
        let mut config = ServerConfig::from_toml_str(r#"hosts = ["gateway"]"#).unwrap();
        assert!(config.validate().is_ok());
        config.hosts.push(String::new());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn host_with_separator_is_rejected() {
        let err = ServerConfig::from_toml_str(r#"hosts = ["a/b"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ServerConfig::from_file("/nonexistent/pingmon.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pingmon.toml"));
    }
}
