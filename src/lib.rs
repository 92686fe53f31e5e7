//! rust-rdcache - Rust implementation of a CoAP Resource Directory cache
//!
//! Endpoints register their resources in CoRE Link Format; the cache mirrors
//! each registration as a tree of nodes below the `rd-cache` resource and
//! lists the cached endpoints. Request handling is transport-agnostic.
//!
//! # Example
//!
//! ```no_run
//! use rust_rdcache::{RdCacheConfig, RdCacheHandler};
//! use rust_rdcache::coap_types::{ContentFormat, Method, Request};
//!
//! // Create handler with an in-memory endpoint registry
//! let handler = RdCacheHandler::new(RdCacheConfig::default());
//!
//! // Register an endpoint
//! let request = Request::new(Method::Post)
//!     .with_query("ep=node1&lt=3600")
//!     .with_payload(r#"</sensors/temp>;rt="temperature""#, ContentFormat::LinkFormat);
//! let response = handler.handle(&request);
//! assert!(response.code.is_success());
//!
//! // List cached endpoints
//! let listing = handler.handle(&Request::new(Method::Get));
//! assert_eq!(listing.text(), "</node1>");
//! ```

pub mod coap_types;
pub mod config;
pub mod directory;
mod error;
pub mod handler;
pub mod link_format;
pub mod registry;
pub mod tree;

pub use config::RdCacheConfig;
pub use directory::{Directory, Registration, SharedDirectory};
pub use error::{RdCacheError, Result};
pub use handler::RdCacheHandler;
pub use link_format::{LinkAttributes, WebLink};
pub use registry::{EndpointRecord, EndpointRegistry, InMemoryRegistry};
pub use tree::CacheNode;
