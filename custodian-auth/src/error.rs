//! Error types for request signing

use crate::debugger::PartMismatch;
use thiserror::Error;

/// Errors that can occur while preparing or signing a request
#[derive(Error, Debug)]
pub enum AuthError {
    /// A query parameter could not be reduced to a string
    #[error("Query parameter cannot be canonicalized: {0}")]
    Canonicalization(String),

    /// A credential of the signing key is missing or blank
    #[error("Signing key is missing its {0}")]
    MissingCredential(&'static str),

    /// The request body is not buffered and therefore cannot be signed
    #[error("Request body cannot be signed: {0}")]
    UnsignableBody(String),

    /// A header value contains bytes HTTP does not allow
    #[error("Invalid value for header {0}")]
    InvalidHeader(&'static str),

    /// Payload serialization failed
    #[error("Payload error: {0}")]
    PayloadError(String),

    /// The server refused the signature of a request
    #[error("Server rejected the request signature (HTTP {status})")]
    SignatureRejected {
        status: u16,
        mismatch: Option<Box<PartMismatch>>,
    },
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::PayloadError(err.to_string())
    }
}
