//! Cache tree mirroring registered endpoint resources
//!
//! Every [`CacheNode`] owns its children directly. Full paths are never stored;
//! they are computed while walking down from a root.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coap_types::params;
use crate::error::{RdCacheError, Result};
use crate::link_format::LinkAttributes;

/// One path segment of a cached resource tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheNode {
    name: String,
    #[serde(default)]
    attributes: LinkAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lifetime: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<CacheNode>,
}

impl CacheNode {
    /// Create a node without lifetime (used for the cache root)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: LinkAttributes::new(),
            lifetime: None,
            children: Vec::new(),
        }
    }

    /// Create a node for an entry registered with `lifetime` seconds
    pub fn with_lifetime(name: impl Into<String>, lifetime: u32) -> Self {
        Self {
            lifetime: Some(lifetime),
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &LinkAttributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut LinkAttributes {
        &mut self.attributes
    }

    pub fn lifetime(&self) -> Option<u32> {
        self.lifetime
    }

    /// Children in insertion order
    pub fn children(&self) -> &[CacheNode] {
        &self.children
    }

    /// Name of the endpoint that last wrote this node
    pub fn owner(&self) -> Option<&str> {
        self.attributes.first(params::END_POINT)
    }

    pub fn child(&self, name: &str) -> Option<&CacheNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Follow `segments` down from this node without creating anything
    pub fn find(&self, segments: &[&str]) -> Option<&CacheNode> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Walk `segments` from this node, creating missing nodes on the way
    ///
    /// Created nodes carry only their name and `lifetime` until written.
    /// An empty `segments` returns this node.
    pub fn locate_or_create(&mut self, segments: &[&str], lifetime: Option<u32>) -> &mut CacheNode {
        let mut node = self;
        for segment in segments {
            let index = match node.children.iter().position(|c| c.name == *segment) {
                Some(index) => index,
                None => {
                    debug!(parent = %node.name, segment = %segment, "creating cache node");
                    node.children.push(CacheNode {
                        lifetime,
                        ..CacheNode::new(*segment)
                    });
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index];
        }
        node
    }

    /// Replace this node's attributes with `attributes` and tag it with `endpoint`
    ///
    /// Any previous attribute, including a previous owner, is discarded.
    pub fn apply_attributes(&mut self, attributes: &LinkAttributes, endpoint: &str) {
        self.attributes = LinkAttributes::new();
        for (key, values) in attributes.iter() {
            for value in values {
                self.attributes.add(key, value);
            }
        }
        self.attributes.set(params::END_POINT, endpoint);
    }

    /// Attach `child`, replacing an existing child of the same name in place
    ///
    /// Returns the replaced child, if any.
    pub fn attach(&mut self, child: CacheNode) -> Option<CacheNode> {
        match self.children.iter_mut().find(|c| c.name == child.name) {
            Some(existing) => Some(std::mem::replace(existing, child)),
            None => {
                self.children.push(child);
                None
            }
        }
    }

    /// Every descendant with its path relative to this node, depth first
    pub fn descendants(&self) -> Vec<(String, &CacheNode)> {
        let mut out = Vec::new();
        self.collect_descendants("", &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a CacheNode)>) {
        for child in &self.children {
            let path = format!("{}/{}", prefix, child.name);
            out.push((path.clone(), child));
            child.collect_descendants(&path, out);
        }
    }

    /// Number of nodes in this subtree, this node included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(CacheNode::node_count).sum::<usize>()
    }
}

/// Split a root-relative path into segments
///
/// `""` and `"/"` address the root and yield no segments. Absolute URIs are
/// reduced to their path. One leading and one trailing `/` are ignored; an
/// empty segment anywhere else (including `//`) is rejected.
pub fn tokenize_path(path: &str) -> Result<Vec<&str>> {
    let path = strip_authority(path);
    if path.is_empty() || path == "/" {
        return Ok(Vec::new());
    }

    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(RdCacheError::MalformedLinkFormat(format!(
            "empty path segment in '{}'",
            path
        )));
    }
    Ok(segments)
}

fn strip_authority(uri: &str) -> &str {
    match uri.split_once("://") {
        Some((_scheme, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => uri,
    }
}
