//! Directory state: the cache root and the endpoint registry
//!
//! Both live in one owned [`Directory`] so a registration can update them
//! together. Handlers share it as a [`SharedDirectory`].

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{RdCacheError, Result};
use crate::link_format::WebLink;
use crate::registry::{EndpointKey, EndpointRegistry, InMemoryRegistry, RegistrationParams};
use crate::tree::{CacheNode, tokenize_path};

/// Directory guarded for concurrent request handling
pub type SharedDirectory<R = InMemoryRegistry> = Arc<RwLock<Directory<R>>>;

/// Outcome of a successful registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// True if the endpoint record was created, false if it was updated
    pub created: bool,
    /// Location of the endpoint record, e.g. `rd/1`
    pub location: String,
    /// Path of the endpoint's cache subtree, e.g. `/rd-cache/node1`
    pub cache_path: String,
    pub lifetime: u32,
}

/// Cache tree plus endpoint registry
#[derive(Debug)]
pub struct Directory<R = InMemoryRegistry> {
    root: CacheNode,
    registry: R,
}

impl<R: EndpointRegistry> Directory<R> {
    /// Create a directory whose cache root is named `root_name`
    pub fn new(root_name: impl Into<String>, registry: R) -> Self {
        Self {
            root: CacheNode::new(root_name),
            registry,
        }
    }

    pub fn root(&self) -> &CacheNode {
        &self.root
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    pub fn into_shared(self) -> SharedDirectory<R> {
        Arc::new(RwLock::new(self))
    }

    /// Register an endpoint and rebuild its cache subtree from `links`
    ///
    /// Either the endpoint record and the cache tree are both updated, or
    /// neither is. A record whose parameters are rejected is deleted.
    pub fn register(
        &mut self,
        params: &RegistrationParams,
        links: &[WebLink],
    ) -> Result<Registration> {
        // First occurrence of a path wins, however its URI was spelled
        let mut entries: Vec<(Vec<&str>, &WebLink)> = Vec::with_capacity(links.len());
        for link in links {
            let segments = tokenize_path(&link.uri)?;
            if entries.iter().any(|(seen, _)| *seen == segments) {
                debug!(uri = %link.uri, "skipping duplicate link");
                continue;
            }
            entries.push((segments, link));
        }

        let key = EndpointKey::new(&params.endpoint, &params.domain);
        let created = self
            .registry
            .find_by_name_and_domain(&key.name, &key.domain)
            .is_none();
        if created {
            self.registry.create(&key);
        }

        if let Err(e) = self.registry.apply_parameters(&key, params) {
            warn!(endpoint = %key, error = %e, "registration parameters rejected");
            self.registry.delete(&key);
            return Err(e);
        }

        let location = match self.registry.find_by_name_and_domain(&key.name, &key.domain) {
            Some(record) => record.location.clone(),
            None => {
                warn!(endpoint = %key, "endpoint record vanished after update");
                return Err(RdCacheError::ResourceNotFound(key.to_string()));
            }
        };

        let mut subtree = CacheNode::with_lifetime(&params.endpoint, params.lifetime);
        for (segments, link) in &entries {
            subtree
                .locate_or_create(segments, Some(params.lifetime))
                .apply_attributes(&link.attributes, &params.endpoint);
        }
        debug!(
            endpoint = %key,
            links = entries.len(),
            nodes = subtree.node_count(),
            "cache subtree built"
        );
        self.root.attach(subtree);

        Ok(Registration {
            created,
            location,
            cache_path: format!("/{}/{}", self.root.name(), params.endpoint),
            lifetime: params.lifetime,
        })
    }

    /// Cache tree as pretty-printed JSON
    pub fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }
}
