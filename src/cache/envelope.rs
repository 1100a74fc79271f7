//! Serialization contract for cached post lists.

use serde::{Deserialize, Serialize};

use crate::domain::posts::Post;

use super::error::{CacheError, CacheResult};

/// Current envelope schema. Entries written with any other version decode as errors.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub schema: u32,
    pub posts: Vec<Post>,
}

impl CacheEnvelope {
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            schema: CACHE_SCHEMA_VERSION,
            posts,
        }
    }

    pub fn encode(&self) -> CacheResult<String> {
        serde_json::to_string(self).map_err(|err| CacheError::Serialization(err.to_string()))
    }

    /// Decode a stored payload, rejecting foreign shapes and schema versions.
    pub fn decode(payload: &str) -> CacheResult<Self> {
        let envelope: CacheEnvelope = serde_json::from_str(payload)
            .map_err(|err| CacheError::Serialization(err.to_string()))?;
        if envelope.schema != CACHE_SCHEMA_VERSION {
            return Err(CacheError::Serialization(format!(
                "unsupported cache schema {} (expected {CACHE_SCHEMA_VERSION})",
                envelope.schema
            )));
        }
        Ok(envelope)
    }
}
