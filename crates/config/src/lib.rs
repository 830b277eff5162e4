//! # Config - decode-time configuration
//!
//! Everything a decode pass needs to know besides the input itself. A
//! [`DecodeConfig`] is built once, passed explicitly to the pipeline, and
//! never mutated while decoding.
//!
//! ```text
//! now_ms           reference time for expiry checks, captured once
//! key_patterns     regular expressions; a key is kept if any matches
//! exclude_expired  drop entries whose expiry <= now_ms
//! fields           attributes forwarded to consumers (None = all)
//! key_only         step over values instead of decoding them
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown field {0:?} (expected one of db, key, expiration, size, type, encoding, value)")]
    UnknownField(String),

    #[error("field list is empty")]
    EmptyFieldList,
}

/// An entry attribute that can be projected into consumer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Db,
    Key,
    Expiration,
    Size,
    Type,
    Encoding,
    Value,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Db,
        Field::Key,
        Field::Expiration,
        Field::Size,
        Field::Type,
        Field::Encoding,
        Field::Value,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Field::Db => "db",
            Field::Key => "key",
            Field::Expiration => "expiration",
            Field::Size => "size",
            Field::Type => "type",
            Field::Encoding => "encoding",
            Field::Value => "value",
        }
    }

    /// Parses a comma-separated list such as `"key,size"`.
    ///
    /// Whitespace around names is ignored and duplicates are dropped while
    /// keeping the first occurrence's position.
    pub fn parse_list(list: &str) -> Result<Vec<Field>, ConfigError> {
        let mut fields = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let field: Field = name.parse()?;
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        if fields.is_empty() {
            return Err(ConfigError::EmptyFieldList);
        }
        Ok(fields)
    }
}

impl FromStr for Field {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "db" => Ok(Field::Db),
            "key" => Ok(Field::Key),
            "expiration" | "expire" | "ttl" => Ok(Field::Expiration),
            "size" => Ok(Field::Size),
            "type" => Ok(Field::Type),
            "encoding" => Ok(Field::Encoding),
            // per-type value field names all select the value
            "value" | "values" | "hash" | "members" | "entries" => Ok(Field::Value),
            _ => Err(ConfigError::UnknownField(s.to_string())),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Current unix time in milliseconds.
#[must_use]
pub fn unix_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Configuration for one decode pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeConfig {
    pub now_ms: i64,
    pub key_patterns: Vec<String>,
    pub exclude_expired: bool,
    pub fields: Option<Vec<Field>>,
    pub key_only: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeConfig {
    /// Accept everything, decode values, `now_ms` sampled from the clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now_ms: unix_now_ms(),
            key_patterns: Vec::new(),
            exclude_expired: false,
            fields: None,
            key_only: false,
        }
    }

    #[must_use]
    pub fn with_now_ms(mut self, now_ms: i64) -> Self {
        self.now_ms = now_ms;
        self
    }

    #[must_use]
    pub fn with_key_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.key_patterns.push(pattern.into());
        self
    }

    #[must_use]
    pub fn with_key_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_exclude_expired(mut self, exclude: bool) -> Self {
        self.exclude_expired = exclude;
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: Option<Vec<Field>>) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn with_key_only(mut self, key_only: bool) -> Self {
        self.key_only = key_only;
        self
    }

    /// Returns `true` if `field` is forwarded to consumers.
    #[must_use]
    pub fn includes(&self, field: Field) -> bool {
        self.fields.as_ref().map_or(true, |f| f.contains(&field))
    }
}

#[cfg(test)]
mod tests;
