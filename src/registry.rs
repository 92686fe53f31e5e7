//! Endpoint registry
//!
//! The registry maps (endpoint name, domain) to the registration record of an
//! endpoint. [`EndpointRegistry`] is the seam a host resource directory plugs
//! into; [`InMemoryRegistry`] is the default keyed implementation.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{RdCacheError, Result};

/// Identity of an endpoint registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub name: String,
    pub domain: String,
}

impl EndpointKey {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
        }
    }
}

impl std::fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.domain)
    }
}

/// Parameters of one registration request, already defaulted and clamped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationParams {
    pub endpoint: String,
    pub domain: String,
    pub endpoint_type: Option<String>,
    pub lifetime: u32,
    pub context: Option<String>,
}

/// Registration record of one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRecord {
    pub key: EndpointKey,
    /// Registration resource path, e.g. `rd/1`
    pub location: String,
    pub endpoint_type: Option<String>,
    /// Lifetime in seconds most recently supplied
    pub lifetime: u32,
    /// Base URI of the registered resources
    pub context: Option<String>,
}

/// Collaborator holding endpoint registrations
pub trait EndpointRegistry {
    /// Look up the record registered under `name` in `domain`
    fn find_by_name_and_domain(&self, name: &str, domain: &str) -> Option<&EndpointRecord>;

    /// Create an empty record for `key`
    fn create(&mut self, key: &EndpointKey) -> &EndpointRecord;

    /// Copy registration parameters onto the record of `key`
    ///
    /// Returns [`RdCacheError::InvalidParameters`] when the parameters are rejected.
    fn apply_parameters(&mut self, key: &EndpointKey, params: &RegistrationParams) -> Result<()>;

    /// Remove the record of `key`
    fn delete(&mut self, key: &EndpointKey) -> Option<EndpointRecord>;

    /// Number of registered endpoints
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory registry keyed by (endpoint name, domain)
#[derive(Debug)]
pub struct InMemoryRegistry {
    base: String,
    records: HashMap<EndpointKey, EndpointRecord>,
    next_id: u64,
}

impl InMemoryRegistry {
    /// Create a registry whose records are located under `base` (e.g. "rd")
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            records: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &EndpointRecord> {
        self.records.values()
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new("rd")
    }
}

impl EndpointRegistry for InMemoryRegistry {
    fn find_by_name_and_domain(&self, name: &str, domain: &str) -> Option<&EndpointRecord> {
        self.records.get(&EndpointKey::new(name, domain))
    }

    fn create(&mut self, key: &EndpointKey) -> &EndpointRecord {
        let location = format!("{}/{}", self.base, self.next_id);
        self.next_id += 1;
        debug!(endpoint = %key, %location, "creating endpoint record");

        self.records
            .entry(key.clone())
            .or_insert_with(|| EndpointRecord {
                key: key.clone(),
                location,
                endpoint_type: None,
                lifetime: 0,
                context: None,
            })
    }

    fn apply_parameters(&mut self, key: &EndpointKey, params: &RegistrationParams) -> Result<()> {
        if let Some(context) = &params.context {
            validate_context(context)?;
        }
        if params.lifetime == 0 {
            return Err(RdCacheError::InvalidParameters("lifetime must be positive".into()));
        }

        let record = self
            .records
            .get_mut(key)
            .ok_or_else(|| RdCacheError::ResourceNotFound(key.to_string()))?;

        if params.endpoint_type.is_some() {
            record.endpoint_type = params.endpoint_type.clone();
        }
        if params.context.is_some() {
            record.context = params.context.clone();
        }
        record.lifetime = params.lifetime;
        Ok(())
    }

    fn delete(&mut self, key: &EndpointKey) -> Option<EndpointRecord> {
        self.records.remove(key)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// A context must be an absolute `coap` or `coaps` URI with a host
fn validate_context(context: &str) -> Result<()> {
    let rest = context
        .strip_prefix("coap://")
        .or_else(|| context.strip_prefix("coaps://"))
        .ok_or_else(|| {
            RdCacheError::InvalidParameters(format!("context '{}' is not a coap URI", context))
        })?;

    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(RdCacheError::InvalidParameters(format!(
            "context '{}' has no host",
            context
        )));
    }
    Ok(())
}
