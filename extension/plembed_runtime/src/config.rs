//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Tunables of a [`crate::Runtime`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Upper bound on the number of polymorphism-specialized type
    /// descriptors kept across calls. The oldest entry is evicted first.
    pub polymorph_cache_capacity: usize,

    /// Number of rows requested per round trip when a native cursor is
    /// drained into a materialized result.
    pub cursor_fetch_size: usize,

    /// The highest number of internal subtransactions that may be open at
    /// once.
    pub subtransaction_limit: u64,

    /// The name reported in error context for inline code blocks.
    pub inline_filename: String,

    /// The name of the embedded language, shown in error context.
    pub language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            polymorph_cache_capacity: 256,
            cursor_fetch_size: 30,
            subtransaction_limit: u64::MAX,
            inline_filename: "__inline_executor__".to_owned(),
            language: "Python".to_owned(),
        }
    }
}

/// The configuration text could not be turned into a [`Config`].
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),
}

impl Config {
    /// Parses a TOML document. Absent keys keep their default value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed TOML, unknown keys, or a zero
    /// capacity, fetch size or subtransaction limit.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;

        if config.polymorph_cache_capacity == 0 {
            return Err(ConfigError::Zero("polymorph_cache_capacity"));
        }
        if config.cursor_fetch_size == 0 {
            return Err(ConfigError::Zero("cursor_fetch_size"));
        }
        if config.subtransaction_limit == 0 {
            return Err(ConfigError::Zero("subtransaction_limit"));
        }

        Ok(config)
    }

    /// Renders the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Propagates the serializer's error.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}
