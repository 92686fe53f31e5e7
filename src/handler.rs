//! RD cache Request Handler
//!
//! Coap library-agnostic request handling for the RD cache resource.
//! This is the core of the library - plug into any CoAP server.

use tracing::{info, warn};

use crate::coap_types::{Method, QueryParam, Request, Response, params};
use crate::config::RdCacheConfig;
use crate::directory::{Directory, Registration, SharedDirectory};
use crate::error::{RdCacheError, Result};
use crate::link_format::{self, WebLink};
use crate::registry::{EndpointRegistry, InMemoryRegistry, RegistrationParams};

/// Main RD cache request handler
///
/// Registrations take the directory write lock for their whole duration;
/// listings take the read lock, so they never see a half-attached subtree.
///
/// # Example
/// ```ignore
/// let handler = RdCacheHandler::new(RdCacheConfig::default());
/// let response = handler.handle(&request);
/// // Send response via your CoAP transport
/// ```
#[derive(Debug)]
pub struct RdCacheHandler<R: EndpointRegistry = InMemoryRegistry> {
    config: RdCacheConfig,
    directory: SharedDirectory<R>,
}

impl RdCacheHandler<InMemoryRegistry> {
    /// Create a handler backed by an in-memory endpoint registry
    pub fn new(config: RdCacheConfig) -> Self {
        let registry = InMemoryRegistry::new(config.registration_base.clone());
        Self::with_registry(config, registry)
    }
}

impl<R: EndpointRegistry> RdCacheHandler<R> {
    /// Create a handler around a host-provided endpoint registry
    pub fn with_registry(config: RdCacheConfig, registry: R) -> Self {
        let directory = Directory::new(config.resource_name.clone(), registry).into_shared();
        Self { config, directory }
    }

    /// Create a handler sharing an existing directory
    pub fn with_directory(config: RdCacheConfig, directory: SharedDirectory<R>) -> Self {
        Self { config, directory }
    }

    pub fn config(&self) -> &RdCacheConfig {
        &self.config
    }

    /// Shared handle to the directory state
    pub fn directory(&self) -> SharedDirectory<R> {
        self.directory.clone()
    }

    /// Handle an incoming request addressed at the RD cache resource
    pub fn handle(&self, request: &Request) -> Response {
        let result = match (request.method, request.path.is_empty()) {
            (Method::Get, true) => Ok(Response::link_format(self.list())),
            (Method::Get, false) => self.describe(&request.path).map(Response::link_format),
            (Method::Post, true) => self.register(request).map(|reg| {
                let template = self.link_template(&reg);
                Response::registered(reg.created, &reg.location, template)
            }),
            (method, _) => return Response::method_not_allowed(method),
        };

        result.unwrap_or_else(|e| {
            warn!(method = %request.method, error = %e, "request rejected");
            Response::error(e.response_code(), &e.to_string())
        })
    }

    /// Register the endpoint described by `request` and rebuild its cache subtree
    pub fn register(&self, request: &Request) -> Result<Registration> {
        let params = self.registration_params(&request.query)?;
        let payload = std::str::from_utf8(&request.payload).map_err(|e| {
            RdCacheError::MalformedLinkFormat(format!("payload is not UTF-8: {}", e))
        })?;
        let links = link_format::parse(payload)?;

        let registration = self.directory.write().register(&params, &links)?;
        info!(
            endpoint = %params.endpoint,
            domain = %params.domain,
            lifetime = params.lifetime,
            created = registration.created,
            location = %registration.location,
            "endpoint registered"
        );
        Ok(registration)
    }

    /// Immediate children of the cache root as `</name>` entries
    pub fn list(&self) -> String {
        let directory = self.directory.read();
        directory
            .root()
            .children()
            .iter()
            .map(|child| format!("</{}>", child.name()))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Descendants of the node at `path` with their attributes
    pub fn describe(&self, path: &[String]) -> Result<String> {
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        let directory = self.directory.read();
        let root = directory.root();
        let node = root
            .find(&segments)
            .ok_or_else(|| RdCacheError::ResourceNotFound(format!("/{}", path.join("/"))))?;

        let prefix = format!("/{}/{}", root.name(), path.join("/"));
        let links: Vec<WebLink> = node
            .descendants()
            .into_iter()
            .map(|(relative, child)| WebLink {
                uri: format!("{}{}", prefix, relative),
                attributes: child.attributes().clone(),
            })
            .collect();
        Ok(link_format::render(&links))
    }

    /// Discovery entry of the cache resource, as served in `/.well-known/core`
    pub fn resource_link(&self) -> String {
        WebLink::new(format!("/{}", self.config.resource_name))
            .with_attribute("rt", &self.config.resource_type)
            .to_string()
    }

    /// Link template advertising the cache subtree of a registration
    pub fn link_template(&self, registration: &Registration) -> String {
        WebLink::new(registration.cache_path.as_str())
            .with_attribute("rel", &self.config.cache_relation)
            .to_string()
    }

    /// Extract registration parameters from Uri-Query items
    ///
    /// Flag items are ignored and a repeated key keeps its last value.
    pub fn registration_params(&self, query: &[QueryParam]) -> Result<RegistrationParams> {
        let mut endpoint = None;
        let mut domain = None;
        let mut endpoint_type = None;
        let mut lifetime = None;
        let mut context = None;

        for param in query {
            let Some(value) = param.value.as_deref() else {
                continue;
            };
            match param.name.as_str() {
                params::END_POINT => endpoint = Some(value),
                params::DOMAIN => domain = Some(value),
                params::END_POINT_TYPE => endpoint_type = Some(value),
                params::LIFE_TIME => lifetime = Some(value),
                params::CONTEXT => context = Some(value),
                _ => {}
            }
        }

        let endpoint = endpoint
            .filter(|ep| !ep.is_empty())
            .ok_or(RdCacheError::MissingEndpointName)?;

        let lifetime = match lifetime {
            Some(value) => self.config.clamp_lifetime(parse_lifetime(value)?),
            None => self.config.default_lifetime,
        };

        Ok(RegistrationParams {
            endpoint: endpoint.to_string(),
            domain: domain.unwrap_or(self.config.default_domain.as_str()).to_string(),
            endpoint_type: endpoint_type.map(str::to_string),
            lifetime,
            context: context.map(str::to_string),
        })
    }
}

/// Negative lifetimes count as zero and are raised by clamping
fn parse_lifetime(value: &str) -> Result<u32> {
    let seconds: i64 = value
        .trim()
        .parse()
        .map_err(|_| RdCacheError::InvalidLifetime(format!("'{}' is not a number", value)))?;
    u32::try_from(seconds.max(0))
        .map_err(|_| RdCacheError::InvalidLifetime(format!("{} is out of range", seconds)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coap_types::{ContentFormat, ResponseCode};

    fn create_handler() -> RdCacheHandler {
        RdCacheHandler::new(RdCacheConfig::default())
    }

    fn post(query: &str, payload: &str) -> Request {
        Request::new(Method::Post)
            .with_query(query)
            .with_payload(payload, ContentFormat::LinkFormat)
    }

    #[test]
    fn test_registration_params_defaults() {
        let handler = create_handler();
        let params = handler
            .registration_params(&post("ep=node1", "").query)
            .unwrap();

        assert_eq!(params.domain, "local");
        assert_eq!(params.lifetime, 86400);
        assert_eq!(params.endpoint_type, None);
    }

    #[test]
    fn test_registration_params_clamps_lifetime() {
        let handler = create_handler();
        let lifetime = |lt: &str| {
            handler
                .registration_params(&post(&format!("ep=n&lt={}", lt), "").query)
                .map(|p| p.lifetime)
        };

        assert_eq!(lifetime("10").unwrap(), 60);
        assert_eq!(lifetime("-5").unwrap(), 60);
        assert_eq!(lifetime("7200").unwrap(), 7200);
        assert!(matches!(lifetime("soon"), Err(RdCacheError::InvalidLifetime(_))));
        assert!(matches!(
            lifetime("99999999999"),
            Err(RdCacheError::InvalidLifetime(_))
        ));
    }

    #[test]
    fn test_registration_params_ignores_flags_and_keeps_last() {
        let handler = create_handler();
        let request = post("ep=first&ep=second&d&et=sensor", "");
        let params = handler.registration_params(&request.query).unwrap();

        assert_eq!(params.endpoint, "second");
        assert_eq!(params.domain, "local");
        assert_eq!(params.endpoint_type.as_deref(), Some("sensor"));
    }

    #[test]
    fn test_missing_endpoint_name() {
        let handler = create_handler();
        for query in ["d=home", "ep=", "ep"] {
            assert!(matches!(
                handler.registration_params(&post(query, "").query),
                Err(RdCacheError::MissingEndpointName)
            ));
        }
    }

    #[test]
    fn test_handle_register_response() {
        let handler = create_handler();
        let response = handler.handle(&post("ep=node1&lt=120", "</s>;rt=\"x\""));

        assert_eq!(response.code, ResponseCode::Created);
        assert_eq!(response.location_path, vec!["rd", "1"]);
        assert_eq!(
            response.link_template.as_deref(),
            Some(r#"</rd-cache/node1>;rel="http://w3id.org/semiot/coap/rd-cache""#)
        );
        assert_eq!(response.content_format, Some(ContentFormat::LinkFormat));

        let again = handler.handle(&post("ep=node1&lt=120", "</s>;rt=\"x\""));
        assert_eq!(again.code, ResponseCode::Changed);
        assert_eq!(again.location_path, vec!["rd", "1"]);
    }

    #[test]
    fn test_register_rejects_invalid_utf8() {
        let handler = create_handler();
        let request = Request::new(Method::Post)
            .with_query("ep=n")
            .with_payload(vec![b'<', b'/', 0xff, b'>'], ContentFormat::LinkFormat);

        assert!(matches!(
            handler.register(&request),
            Err(RdCacheError::MalformedLinkFormat(_))
        ));
        assert_eq!(handler.handle(&request).code, ResponseCode::BadRequest);
        assert!(handler.directory().read().registry().is_empty());
        assert_eq!(handler.list(), "");
    }

    #[test]
    fn test_handle_list() {
        let handler = create_handler();
        assert_eq!(handler.handle(&Request::new(Method::Get)).text(), "");

        handler.handle(&post("ep=node1", ""));
        handler.handle(&post("ep=node2", ""));
        let response = handler.handle(&Request::new(Method::Get));

        assert_eq!(response.code, ResponseCode::Content);
        assert_eq!(response.text(), "</node1>,</node2>");
    }

    #[test]
    fn test_handle_describe() {
        let handler = create_handler();
        handler.handle(&post("ep=node1", r#"</s/temp>;rt="temperature";ct=0"#));

        let response = handler.handle(&Request::new(Method::Get).with_path("node1"));
        assert_eq!(response.code, ResponseCode::Content);
        assert_eq!(
            response.text(),
            r#"</rd-cache/node1/s>,</rd-cache/node1/s/temp>;ct=0;ep="node1";rt="temperature""#
        );

        let missing = handler.handle(&Request::new(Method::Get).with_path("node9"));
        assert_eq!(missing.code, ResponseCode::NotFound);
    }

    #[test]
    fn test_resource_link() {
        let handler = create_handler();
        assert_eq!(handler.resource_link(), r#"</rd-cache>;rt="core.rd-cache""#);
    }

    #[test]
    fn test_unsupported_methods() {
        let handler = create_handler();
        let response = handler.handle(&Request::new(Method::Delete));
        assert_eq!(response.code, ResponseCode::MethodNotAllowed);

        let response = handler.handle(&post("ep=node1", "").with_path("node1"));
        assert_eq!(response.code, ResponseCode::MethodNotAllowed);
    }
}
