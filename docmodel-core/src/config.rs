//! Store configuration.
//!
//! [`StoreConfig`] derives `Deserialize` with per-field defaults, so it can be embedded in any
//! serde-backed configuration file. Values are checked by [`StoreConfig::validate`], which
//! [`StoreConfigBuilder::build`] and [`StoreConfig::from_json`] both run.

use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

pub const DEFAULT_DELETE_BATCH_SIZE: usize = 100;
pub const MAX_DELETE_BATCH_SIZE: usize = 500;
pub const DEFAULT_MAX_REFERENCE_DEPTH: usize = 16;
pub const MAX_REFERENCE_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Documents fetched and deleted per round when deleting a whole collection.
    pub delete_batch_size: usize,
    /// Longest chain of references resolved while materializing one document.
    pub max_reference_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            delete_batch_size: DEFAULT_DELETE_BATCH_SIZE,
            max_reference_depth: DEFAULT_MAX_REFERENCE_DEPTH,
        }
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::new()
    }

    pub fn from_json(json: &str) -> DocumentStoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> DocumentStoreResult<()> {
        if !(1..=MAX_DELETE_BATCH_SIZE).contains(&self.delete_batch_size) {
            return Err(DocumentStoreError::config(format!(
                "delete_batch_size must be between 1 and {MAX_DELETE_BATCH_SIZE}, got {}",
                self.delete_batch_size
            )));
        }
        if !(1..=MAX_REFERENCE_DEPTH).contains(&self.max_reference_depth) {
            return Err(DocumentStoreError::config(format!(
                "max_reference_depth must be between 1 and {MAX_REFERENCE_DEPTH}, got {}",
                self.max_reference_depth
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete_batch_size(mut self, delete_batch_size: usize) -> Self {
        self.config.delete_batch_size = delete_batch_size;
        self
    }

    pub fn max_reference_depth(mut self, max_reference_depth: usize) -> Self {
        self.config.max_reference_depth = max_reference_depth;
        self
    }

    pub fn build(self) -> DocumentStoreResult<StoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = StoreConfig::from_json(r#"{ "delete_batch_size": 25 }"#).unwrap();

        assert_eq!(config.delete_batch_size, 25);
        assert_eq!(config.max_reference_depth, DEFAULT_MAX_REFERENCE_DEPTH);
        assert_eq!(StoreConfig::from_json("{}").unwrap(), StoreConfig::default());
    }

    #[test]
    fn zero_and_oversized_values_are_rejected() {
        assert!(StoreConfig::builder().delete_batch_size(0).build().is_err());
        assert!(StoreConfig::builder().max_reference_depth(0).build().is_err());
        assert!(
            StoreConfig::builder()
                .delete_batch_size(MAX_DELETE_BATCH_SIZE + 1)
                .build()
                .is_err()
        );
        assert!(StoreConfig::from_json(r#"{ "max_reference_depth": 0 }"#).is_err());
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = StoreConfig::from_json("{ nope").unwrap_err();

        assert!(matches!(err, DocumentStoreError::Serialization(_)));
    }
}
