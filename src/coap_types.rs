//! RD cache CoAP types and constants
//!
//! This module defines the CoAP types exchanged with the RD cache.
//! These abstractions allow the library to work with any CoAP implementation.

/// CoAP option number used to carry the rd-cache link template
pub const LINK_TEMPLATE_OPTION: u16 = 41;

/// CoAP Content-Format identifiers used by the RD cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ContentFormat {
    /// text/plain;charset=utf-8
    TextPlain = 0,
    /// application/link-format (RFC 6690)
    LinkFormat = 40,
}

impl ContentFormat {
    /// Convert from raw content-format ID
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::TextPlain),
            40 => Some(Self::LinkFormat),
            _ => None,
        }
    }

    /// Get the raw content-format ID
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Request methods understood by the RD cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// List or describe cached entries
    Get,
    /// Register an endpoint
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
            Method::Put => f.write_str("PUT"),
            Method::Delete => f.write_str("DELETE"),
        }
    }
}

/// CoAP response codes used by the RD cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    // Success codes
    /// 2.01 Created
    Created,
    /// 2.04 Changed
    Changed,
    /// 2.05 Content
    Content,

    // Client error codes
    /// 4.00 Bad Request
    BadRequest,
    /// 4.04 Not Found
    NotFound,
    /// 4.05 Method Not Allowed
    MethodNotAllowed,

    // Server error codes
    /// 5.00 Internal Server Error
    InternalServerError,
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (class, detail) = self.to_code_pair();
        write!(f, "{}.{:02}", class, detail)
    }
}

impl ResponseCode {
    /// Convert to CoAP response code format (class.detail)
    pub fn to_code_pair(self) -> (u8, u8) {
        match self {
            Self::Created => (2, 1),
            Self::Changed => (2, 4),
            Self::Content => (2, 5),
            Self::BadRequest => (4, 0),
            Self::NotFound => (4, 4),
            Self::MethodNotAllowed => (4, 5),
            Self::InternalServerError => (5, 0),
        }
    }

    /// Check if this is a success code
    pub fn is_success(self) -> bool {
        matches!(self, Self::Created | Self::Changed | Self::Content)
    }
}

/// A single Uri-Query item, either `key=value` or a bare `key` flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: String,
    pub value: Option<String>,
}

impl QueryParam {
    /// Parse one query item
    pub fn parse(item: &str) -> Self {
        match item.split_once('=') {
            Some((name, value)) => Self {
                name: name.to_string(),
                value: Some(value.to_string()),
            },
            None => Self {
                name: item.to_string(),
                value: None,
            },
        }
    }

    /// Returns true for a bare `key` without value
    pub fn is_flag(&self) -> bool {
        self.value.is_none()
    }
}

/// Query parameter names of the resource directory interface
pub mod params {
    /// Endpoint name
    pub const END_POINT: &str = "ep";
    /// Domain
    pub const DOMAIN: &str = "d";
    /// Endpoint type
    pub const END_POINT_TYPE: &str = "et";
    /// Lifetime in seconds
    pub const LIFE_TIME: &str = "lt";
    /// Context (base URI of the registered resources)
    pub const CONTEXT: &str = "con";
}

/// Resource types for RD cache discovery
pub mod resource_types {
    /// RD cache resource type
    pub const RD_CACHE: &str = "core.rd-cache";
}

/// An RD cache request (transport-agnostic)
#[derive(Debug, Clone)]
pub struct Request {
    /// The request method
    pub method: Method,
    /// Path segments below the RD cache resource
    pub path: Vec<String>,
    /// Uri-Query items in arrival order
    pub query: Vec<QueryParam>,
    /// Request body (link-format text for registrations)
    pub payload: Vec<u8>,
    /// Content format of the payload
    pub content_format: Option<ContentFormat>,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method) -> Self {
        Self {
            method,
            path: Vec::new(),
            query: Vec::new(),
            payload: Vec::new(),
            content_format: None,
        }
    }

    /// Set the payload
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>, format: ContentFormat) -> Self {
        self.payload = payload.into();
        self.content_format = Some(format);
        self
    }

    /// Set the path below the RD cache resource (e.g. "node1/sensors")
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    /// Append one Uri-Query item
    pub fn with_query_item(mut self, item: &str) -> Self {
        self.query.push(QueryParam::parse(item));
        self
    }

    /// Append every item of a `&`-separated query string
    pub fn with_query(mut self, query: &str) -> Self {
        self.query.extend(
            query
                .split('&')
                .filter(|part| !part.is_empty())
                .map(QueryParam::parse),
        );
        self
    }
}

/// An RD cache response (transport-agnostic)
#[derive(Debug, Clone)]
pub struct Response {
    /// Response code
    pub code: ResponseCode,
    /// Response body
    pub payload: Vec<u8>,
    /// Content format of the payload
    pub content_format: Option<ContentFormat>,
    /// Location-Path option values
    pub location_path: Vec<String>,
    /// Value of the link template option (option 41)
    pub link_template: Option<String>,
}

impl Response {
    fn with_code(code: ResponseCode) -> Self {
        Self {
            code,
            payload: Vec::new(),
            content_format: None,
            location_path: Vec::new(),
            link_template: None,
        }
    }

    /// Create a 2.05 response with a link-format body
    pub fn link_format(body: String) -> Self {
        Self {
            payload: body.into_bytes(),
            content_format: Some(ContentFormat::LinkFormat),
            ..Self::with_code(ResponseCode::Content)
        }
    }

    /// Create a 2.01 Created or 2.04 Changed registration response
    pub fn registered(created: bool, location: &str, link_template: String) -> Self {
        let code = if created {
            ResponseCode::Created
        } else {
            ResponseCode::Changed
        };
        Self {
            payload: link_template.clone().into_bytes(),
            content_format: Some(ContentFormat::LinkFormat),
            location_path: location
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            link_template: Some(link_template),
            ..Self::with_code(code)
        }
    }

    /// Create an error response
    pub fn error(code: ResponseCode, message: &str) -> Self {
        Self {
            payload: message.as_bytes().to_vec(),
            content_format: Some(ContentFormat::TextPlain),
            ..Self::with_code(code)
        }
    }

    /// Create a method not allowed error
    pub fn method_not_allowed(method: Method) -> Self {
        Self::error(
            ResponseCode::MethodNotAllowed,
            &format!("Method {} not allowed", method),
        )
    }

    /// Payload interpreted as UTF-8 text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
