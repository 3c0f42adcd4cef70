//! Flat string-keyed configuration properties.
//!
//! A [`ServiceConfig`] feeds both the service layer (auto-start and
//! shutdown-wait flags) and engine construction (instance name, tick
//! interval); unrecognized keys pass through untouched for whichever layer
//! wants them.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

/// Errors that can occur when loading configuration properties.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the properties file.
    #[error("failed to read properties file: {0}")]
    Io(#[from] std::io::Error),

    /// A line was not `key=value` or a comment.
    #[error("malformed property line {line}: {text}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        text: String,
    },
}

/// A flat set of string properties.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    props: HashMap<String, String>,
}

impl ServiceConfig {
    /// Create an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a property.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.props.insert(key.into(), value.into());
    }

    /// Look up a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// Parse a boolean property. Absent keys yield `default`; present keys
    /// are `true` only for the literal `true`, case-insensitively.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(value) => value.trim().eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.props.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Load `key=value` lines from a properties file. Blank lines and lines
    /// starting with `#` or `!` are ignored; values keep embedded `=`.
    pub fn from_properties_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_properties_str(&text)
    }

    /// Parse properties from a string, same format as
    /// [`from_properties_file`](Self::from_properties_file).
    pub fn from_properties_str(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Malformed {
                    line: idx + 1,
                    text: raw.to_string(),
                });
            };
            config.set(key.trim(), value.trim());
        }
        Ok(config)
    }
}

impl FromIterator<(String, String)> for ServiceConfig {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            props: iter.into_iter().collect(),
        }
    }
}
