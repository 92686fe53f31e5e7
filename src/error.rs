//! Error types for rust-rdcache

use thiserror::Error;

use crate::coap_types::ResponseCode;

/// Main error type for RD cache operations
#[derive(Debug, Error)]
pub enum RdCacheError {
    /// Registration without an `ep` query parameter (maps to CoAP 4.00)
    #[error("missing mandatory endpoint name (ep)")]
    MissingEndpointName,

    /// The endpoint registry rejected the registration parameters (maps to CoAP 4.00)
    #[error("Invalid registration parameters: {0}")]
    InvalidParameters(String),

    /// Lifetime query parameter is not a valid number of seconds (maps to CoAP 4.00)
    #[error("Invalid lifetime: {0}")]
    InvalidLifetime(String),

    /// Payload or link path could not be parsed as CoRE Link Format (maps to CoAP 4.00)
    #[error("Malformed link format: {0}")]
    MalformedLinkFormat(String),

    /// Resource not found (maps to CoAP 4.04)
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Method not allowed (maps to CoAP 4.05)
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Configuration rejected at load time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RdCacheError {
    /// CoAP response code reported to the client for this error
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::MissingEndpointName
            | Self::InvalidParameters(_)
            | Self::InvalidLifetime(_)
            | Self::MalformedLinkFormat(_) => ResponseCode::BadRequest,
            Self::ResourceNotFound(_) => ResponseCode::NotFound,
            Self::MethodNotAllowed(_) => ResponseCode::MethodNotAllowed,
            Self::InvalidConfig(_) | Self::Io(_) | Self::Json(_) => {
                ResponseCode::InternalServerError
            }
        }
    }
}

/// Result type alias for RD cache operations
pub type Result<T> = std::result::Result<T, RdCacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        assert_eq!(
            RdCacheError::MissingEndpointName.response_code(),
            ResponseCode::BadRequest
        );
        assert_eq!(
            RdCacheError::MalformedLinkFormat("x".into()).response_code(),
            ResponseCode::BadRequest
        );
        assert_eq!(
            RdCacheError::ResourceNotFound("/x".into()).response_code(),
            ResponseCode::NotFound
        );
    }
}
