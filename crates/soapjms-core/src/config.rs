//! Configuration views
//!
//! Configuration is a flat map of dotted keys to string values:
//! ```text
//! transport-cache.max-size = 16
//! endpoint.orders.transactional = false
//! jms.selector = region = 'EU'
//! ```
//!
//! Views are immutable. `subset` and `overlay` build new views and never touch
//! their inputs, so a global configuration can be shared freely between
//! endpoints while each endpoint derives its own effective settings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::{Error, Result};

/// An immutable dotted-key configuration view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    entries: Arc<BTreeMap<String, String>>,
}

impl Configuration {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Parse a TOML document, flattening nested tables into dotted keys
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let table: toml::Table = s.parse().map_err(|e: toml::de::Error| {
            Error::ConfigParse(e.message().to_string())
        })?;
        Ok(Self::from_toml_table(&table))
    }

    /// Flatten an already parsed TOML table
    pub fn from_toml_table(table: &toml::Table) -> Self {
        let mut entries = BTreeMap::new();
        flatten_table("", table, &mut entries);
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Get a raw value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|v| v.as_str())
    }

    /// Get a value as an owned string, treating blank values as absent
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Get a boolean, accepting `true/false`, `yes/no`, `on/off` and `1/0`
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.invalid(key)),
            },
        }
    }

    /// Get an unsigned size
    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize> {
        self.get_parsed(key, default)
    }

    /// Get an unsigned 64-bit integer
    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64> {
        self.get_parsed(key, default)
    }

    fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.trim().parse().map_err(|_| self.invalid(key)),
        }
    }

    fn invalid(&self, key: &str) -> Error {
        Error::InvalidConfig {
            key: key.to_string(),
            value: self.get(key).unwrap_or_default().to_string(),
        }
    }

    /// Check if a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over all keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Iterate over all entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys under `prefix.`, with the prefix stripped
    pub fn subset(&self, prefix: &str) -> Configuration {
        let dotted = format!("{}.", prefix);
        Self::from_pairs(self.entries.iter().filter_map(|(k, v)| {
            k.strip_prefix(&dotted)
                .filter(|rest| !rest.is_empty())
                .map(|rest| (rest.to_string(), v.clone()))
        }))
    }

    /// A new view in which every key of `top` shadows the same key here
    pub fn overlay(&self, top: &Configuration) -> Configuration {
        if top.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return top.clone();
        }
        let mut entries = (*self.entries).clone();
        entries.extend(top.entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            entries: Arc::new(entries),
        }
    }

    /// A new view with one key set
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Configuration {
        self.overlay(&Self::from_pairs([(key.into(), value.into())]))
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in self.entries.iter() {
            writeln!(f, "{} = {}", k, v)?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for Configuration {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let table = toml::Table::deserialize(deserializer)?;
        Ok(Self::from_toml_table(&table))
    }
}

fn flatten_table(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>) {
    for (key, value) in table {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(inner) => flatten_table(&full, inner, out),
            other => {
                out.insert(full, scalar_to_string(other));
            }
        }
    }
}

fn scalar_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(d) => d.to_string(),
        toml::Value::Array(items) => items
            .iter()
            .map(scalar_to_string)
            .collect::<Vec<_>>()
            .join(","),
        toml::Value::Table(_) => String::new(),
    }
}
