//! Configuration management for the CLI.

use std::env;
use treesync_engine::{IdScheme, ImportOptions};

const DEFAULT_SIZE_LIMIT: usize = 10_000;

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of invalidation trie entries
    pub size_limit: usize,
    /// Options passed to the importer
    pub import: ImportOptions,
    /// Write indented JSON
    pub pretty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size_limit: DEFAULT_SIZE_LIMIT,
            import: ImportOptions::default(),
            pretty: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key-value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let size_limit = match lookup("TREESYNC_SIZE_LIMIT") {
            Some(value) => value
                .trim()
                .parse()
                .ok()
                .filter(|limit: &usize| *limit > 0)
                .ok_or(ConfigError::InvalidSizeLimit(value))?,
            None => DEFAULT_SIZE_LIMIT,
        };

        let strict_references = parse_flag(&lookup, "TREESYNC_STRICT_REFERENCES", false)?;

        let id_scheme = match lookup("TREESYNC_ID_SCHEME") {
            None => IdScheme::default(),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "positional" => IdScheme::Positional,
                "random" => IdScheme::Random,
                _ => return Err(ConfigError::InvalidIdScheme(value)),
            },
        };

        let pretty = parse_flag(&lookup, "TREESYNC_PRETTY", true)?;

        Ok(Self {
            size_limit,
            import: ImportOptions {
                strict_references,
                id_scheme,
            },
            pretty,
        })
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { key, value }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid TREESYNC_SIZE_LIMIT value: {0} (expected a positive integer)")]
    InvalidSizeLimit(String),

    #[error("Invalid TREESYNC_ID_SCHEME value: {0} (expected positional or random)")]
    InvalidIdScheme(String),

    #[error("Invalid {key} value: {value} (expected true or false)")]
    InvalidFlag { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        assert_eq!(load(&[]).unwrap(), Config::default());
    }

    #[test]
    fn all_values() {
        let config = load(&[
            ("TREESYNC_SIZE_LIMIT", "64"),
            ("TREESYNC_STRICT_REFERENCES", "yes"),
            ("TREESYNC_ID_SCHEME", "Random"),
            ("TREESYNC_PRETTY", "0"),
        ])
        .unwrap();

        assert_eq!(config.size_limit, 64);
        assert!(config.import.strict_references);
        assert_eq!(config.import.id_scheme, IdScheme::Random);
        assert!(!config.pretty);
    }

    #[test]
    fn zero_size_limit() {
        assert_eq!(
            load(&[("TREESYNC_SIZE_LIMIT", "0")]).unwrap_err(),
            ConfigError::InvalidSizeLimit("0".into())
        );
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            load(&[("TREESYNC_ID_SCHEME", "sequential")]),
            Err(ConfigError::InvalidIdScheme(_))
        ));
        assert_eq!(
            load(&[("TREESYNC_PRETTY", "maybe")]).unwrap_err(),
            ConfigError::InvalidFlag {
                key: "TREESYNC_PRETTY",
                value: "maybe".into(),
            }
        );
    }
}
