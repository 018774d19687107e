//! Connection cache sizing

use crate::{Configuration, Error, Result};

pub const MAX_SIZE_KEY: &str = "transport-cache.max-size";
pub const CONCURRENCY_KEY: &str = "transport-cache.concurrency";
pub const INITIAL_SIZE_KEY: &str = "transport-cache.initial-size";

pub const DEFAULT_CACHE_SIZE: usize = 16;
pub const DEFAULT_CACHE_CONCURRENCY: usize = 4;

/// Sizing of the connection cache, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached connections
    pub max_size: usize,
    /// Capacity reserved up front
    pub initial_capacity: usize,
    /// Number of independently locked segments
    pub concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_CACHE_SIZE,
            initial_capacity: DEFAULT_CACHE_SIZE / 4,
            concurrency: DEFAULT_CACHE_CONCURRENCY,
        }
    }
}

impl CacheConfig {
    /// Create a config with the given maximum size and default derived values
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            max_size,
            initial_capacity: max_size / 4,
            ..Default::default()
        }
    }

    /// Read `transport-cache.*` keys, falling back to defaults
    pub fn from_configuration(config: &Configuration) -> Result<Self> {
        let max_size = config.get_usize(MAX_SIZE_KEY, DEFAULT_CACHE_SIZE)?;
        let cache = Self {
            max_size,
            initial_capacity: config.get_usize(INITIAL_SIZE_KEY, max_size / 4)?,
            concurrency: config.get_usize(CONCURRENCY_KEY, DEFAULT_CACHE_CONCURRENCY)?,
        };
        cache.validate()?;
        Ok(cache)
    }

    /// Reject sizes the cache cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::InvalidConfig {
                key: MAX_SIZE_KEY.to_string(),
                value: "0".to_string(),
            });
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig {
                key: CONCURRENCY_KEY.to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
