//! # Scene Configuration
//!
//! Tunables for a [`crate::Scene`], loaded once at startup from TOML.
//!
//! ```toml
//! reuse_threshold = 1024
//! pool_chunk_size = 256
//! initial_entity_capacity = 4096
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Default depth the free-index queue must exceed before indices are reused.
pub const DEFAULT_REUSE_THRESHOLD: usize = 1024;

/// Default number of blocks per component pool chunk.
pub const DEFAULT_POOL_CHUNK_SIZE: usize = 256;

/// Scene tunables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneConfig {
    /// A freed index is only recycled once more than this many indices are
    /// waiting in the free queue. `0` recycles as soon as one is free.
    pub reuse_threshold: usize,
    /// Blocks reserved per growth step of every component pool.
    pub pool_chunk_size: usize,
    /// Entity slots reserved up front.
    pub initial_entity_capacity: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            reuse_threshold: DEFAULT_REUSE_THRESHOLD,
            pool_chunk_size: DEFAULT_POOL_CHUNK_SIZE,
            initial_entity_capacity: 0,
        }
    }
}

impl SceneConfig {
    /// Parses and validates a TOML document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ConfigParse`] if the text is not valid for this schema
    /// - [`CoreError::InvalidConfig`] if a value is out of range
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| CoreError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string(self).map_err(|e| CoreError::InvalidConfig(e.to_string()))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if `pool_chunk_size` is zero or
    /// `initial_entity_capacity` does not fit a `u32` index.
    pub fn validate(&self) -> CoreResult<()> {
        if self.pool_chunk_size == 0 {
            return Err(CoreError::InvalidConfig(
                "pool_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.initial_entity_capacity > u32::MAX as usize {
            return Err(CoreError::InvalidConfig(format!(
                "initial_entity_capacity {} exceeds the u32 index space",
                self.initial_entity_capacity
            )));
        }
        Ok(())
    }

    /// Sets the reuse threshold.
    #[must_use]
    pub fn reuse_threshold(mut self, threshold: usize) -> Self {
        self.reuse_threshold = threshold;
        self
    }

    /// Sets the pool chunk size.
    #[must_use]
    pub fn pool_chunk_size(mut self, chunk_size: usize) -> Self {
        self.pool_chunk_size = chunk_size;
        self
    }

    /// Sets the number of entity slots reserved up front.
    #[must_use]
    pub fn initial_entity_capacity(mut self, capacity: usize) -> Self {
        self.initial_entity_capacity = capacity;
        self
    }
}
