//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::net::SocketAddr;

/// Default upper bound on the length of a search query, in characters.
pub const DEFAULT_MAX_QUERY_LENGTH: u64 = 4096;

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `EVENTSEARCH_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `EVENTSEARCH_PORT`: The port to listen on (default: 8080)
/// - `EVENTSEARCH_MAX_QUERY_LENGTH`: Longest accepted search query (default: 4096)
/// - `EVENTSEARCH_KEY_MAPPINGS`: Legacy search keys, as
///   `canonical=legacy,canonical=legacy` (default: none)
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Longest accepted search query, in characters.
    pub max_query_length: u64,
    /// Canonical search keys paired with a legacy name users may type instead.
    pub key_mappings: Vec<(String, String)>,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `EVENTSEARCH_PORT` is set but cannot be parsed as a valid port number
    /// - `EVENTSEARCH_MAX_QUERY_LENGTH` is set but is not a positive integer
    /// - `EVENTSEARCH_KEY_MAPPINGS` is set but malformed
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("EVENTSEARCH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = std::env::var("EVENTSEARCH_PORT")
            .ok()
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("EVENTSEARCH_PORT must be a valid port number")?
            .unwrap_or(8080);

        let max_query_length = std::env::var("EVENTSEARCH_MAX_QUERY_LENGTH")
            .ok()
            .map(|l| l.parse::<u64>())
            .transpose()
            .context("EVENTSEARCH_MAX_QUERY_LENGTH must be a positive integer")?
            .unwrap_or(DEFAULT_MAX_QUERY_LENGTH);

        if max_query_length == 0 {
            anyhow::bail!("EVENTSEARCH_MAX_QUERY_LENGTH must be a positive integer");
        }

        let key_mappings = match std::env::var("EVENTSEARCH_KEY_MAPPINGS") {
            Ok(value) => parse_key_mappings(&value)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            host,
            port,
            max_query_length,
            key_mappings,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port combination cannot be parsed as a
    /// valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }
}

/// Parses `canonical=legacy` pairs separated by commas. Blank entries are
/// skipped.
fn parse_key_mappings(value: &str) -> Result<Vec<(String, String)>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (canonical, legacy) = entry
                .split_once('=')
                .map(|(canonical, legacy)| (canonical.trim(), legacy.trim()))
                .filter(|(canonical, legacy)| !canonical.is_empty() && !legacy.is_empty())
                .with_context(|| {
                    format!("EVENTSEARCH_KEY_MAPPINGS entry '{entry}' must be canonical=legacy")
                })?;
            Ok((canonical.to_string(), legacy.to_string()))
        })
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            key_mappings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_query_length, DEFAULT_MAX_QUERY_LENGTH);
        assert!(config.key_mappings.is_empty());
    }

    #[test]
    fn test_parse_key_mappings() {
        let mappings = tokio_test::assert_ok!(parse_key_mappings(
            "user.email=email, user.email = mail,,release=version"
        ));
        assert_eq!(
            mappings,
            vec![
                ("user.email".to_string(), "email".to_string()),
                ("user.email".to_string(), "mail".to_string()),
                ("release".to_string(), "version".to_string()),
            ]
        );
        assert!(tokio_test::assert_ok!(parse_key_mappings("")).is_empty());
    }

    #[test]
    fn test_parse_key_mappings_rejects_malformed_entries() {
        for value in ["user.email", "=email", "user.email=", "release=version,broken"] {
            let err = tokio_test::assert_err!(parse_key_mappings(value));
            assert!(
                err.to_string().contains("must be canonical=legacy"),
                "value {value}: {err}"
            );
        }
    }

    #[test]
    fn test_config_socket_addr() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 3000,
            ..Config::default()
        };
        let addr = tokio_test::assert_ok!(config.socket_addr());
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_config_invalid_socket_addr() {
        let config = Config {
            host: "not a host".to_string(),
            ..Config::default()
        };
        tokio_test::assert_err!(config.socket_addr());
    }
}
