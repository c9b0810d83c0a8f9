//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, DEFAULT_MAX_QUERY_LENGTH};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Longest accepted search query, in characters.
    max_query_length: u64,
    /// Canonical search keys mapped to the legacy names users may still type.
    key_mappings: Arc<HashMap<String, Vec<String>>>,
}

impl AppState {
    /// Creates a new application state from the server configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let mut key_mappings: HashMap<String, Vec<String>> = HashMap::new();
        for (canonical, legacy) in &config.key_mappings {
            key_mappings
                .entry(canonical.clone())
                .or_default()
                .push(legacy.clone());
        }

        Self {
            max_query_length: config.max_query_length,
            key_mappings: Arc::new(key_mappings),
        }
    }

    /// Adds legacy names accepted for a canonical search key.
    #[must_use]
    pub fn with_key_mapping<S: Into<String>>(
        mut self,
        canonical: impl Into<String>,
        legacy: impl IntoIterator<Item = S>,
    ) -> Self {
        Arc::make_mut(&mut self.key_mappings)
            .entry(canonical.into())
            .or_default()
            .extend(legacy.into_iter().map(Into::into));
        self
    }

    /// Returns the longest accepted search query.
    #[must_use]
    pub fn max_query_length(&self) -> u64 {
        self.max_query_length
    }

    /// Returns the configured key mappings.
    #[must_use]
    pub fn key_mappings(&self) -> &HashMap<String, Vec<String>> {
        &self.key_mappings
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            key_mappings: Arc::new(HashMap::new()),
        }
    }
}
