//! RD cache configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coap_types::resource_types;
use crate::error::{RdCacheError, Result};

/// Settings of the RD cache resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RdCacheConfig {
    /// Name of the cache resource, its children are the cached endpoints
    pub resource_name: String,
    /// Resource type advertised for the cache resource
    pub resource_type: String,
    /// Domain used when a registration carries no `d` parameter
    pub default_domain: String,
    /// Lifetime (seconds) used when a registration carries no `lt` parameter
    pub default_lifetime: u32,
    /// Smaller lifetimes are raised to this value
    pub min_lifetime: u32,
    /// Relation type of the link template returned on registration
    pub cache_relation: String,
    /// Path under which endpoint registrations are located
    pub registration_base: String,
}

impl Default for RdCacheConfig {
    fn default() -> Self {
        Self {
            resource_name: "rd-cache".to_string(),
            resource_type: resource_types::RD_CACHE.to_string(),
            default_domain: "local".to_string(),
            default_lifetime: 86400,
            min_lifetime: 60,
            cache_relation: "http://w3id.org/semiot/coap/rd-cache".to_string(),
            registration_base: "rd".to_string(),
        }
    }
}

impl RdCacheConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Parse configuration from a JSON string, missing fields take defaults
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resource_name.is_empty() || self.resource_name.contains('/') {
            return Err(RdCacheError::InvalidConfig(format!(
                "resource_name '{}' must be a single path segment",
                self.resource_name
            )));
        }
        if self.default_domain.is_empty() {
            return Err(RdCacheError::InvalidConfig("default_domain is empty".into()));
        }
        if self.min_lifetime == 0 {
            return Err(RdCacheError::InvalidConfig("min_lifetime must be positive".into()));
        }
        if self.min_lifetime > self.default_lifetime {
            return Err(RdCacheError::InvalidConfig(format!(
                "min_lifetime {} exceeds default_lifetime {}",
                self.min_lifetime, self.default_lifetime
            )));
        }
        Ok(())
    }

    /// Raise `requested` to the configured floor
    pub fn clamp_lifetime(&self, requested: u32) -> u32 {
        requested.max(self.min_lifetime)
    }
}
