//! API-key request signing for the Custodian SDK
//!
//! Every request made with a tenant API key carries four headers:
//!
//! - `X-UP-API-Key`: the key identifier
//! - `X-UP-API-Passphrase`: the key passphrase
//! - `X-UP-API-Timestamp`: Unix seconds at send time
//! - `X-UP-API-Signature`: `hex(HMAC-SHA512(secret, message))`
//!
//! where `message` is the concatenation of timestamp, uppercased method,
//! literal path, canonical query string and raw body.
//!
//! # Example: Signing a request
//!
//! ```rust
//! use custodian_auth::{ApiKeySigner, QueryParams, RequestDescriptor, SigningKey};
//!
//! let key = SigningKey::new("key-id", "secret", "passphrase")?;
//! let signer = ApiKeySigner::new(key);
//!
//! let descriptor = RequestDescriptor::new("GET", "/1.0/tenancy/users/")
//!     .with_query(QueryParams::parse("page_size=100")?);
//!
//! let headers = signer.sign(descriptor);
//! assert_eq!(headers.signature.len(), 128);
//! # Ok::<(), custodian_auth::AuthError>(())
//! ```
//!
//! # Example: Signing reqwest requests
//!
//! ```rust,no_run
//! use custodian_auth::{ApiKeyInterceptor, ApiKeySigner, Interceptor, SigningKey};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let signer = ApiKeySigner::new(SigningKey::new("key-id", "secret", "passphrase")?);
//! let interceptor = ApiKeyInterceptor::new(signer);
//!
//! let client = reqwest::Client::new();
//! let request = client.get("https://api.example.com/1.0/tenancy/echo/").build()?;
//! let request = interceptor.intercept_request(request).await?;
//! client.execute(request).await?;
//! # Ok(())
//! # }
//! ```

pub mod canonical;
pub mod debugger;
mod error;
pub mod interceptor;
mod key;
pub mod message;
pub mod signer;

pub use canonical::{ParamValue, QueryParams, canonicalize, encode_component};
pub use debugger::{
    PartDigest, PartMismatch, ServerDebugHint, SignatureDebugInfo, SignatureDebugger,
};
pub use error::AuthError;
pub use interceptor::{ApiKeyInterceptor, Interceptor, json_body};
pub use key::SigningKey;
pub use message::{MessagePart, MessageParts, RequestDescriptor};
pub use signer::{ApiKeySigner, SignatureHeaders, hmac_sha512_hex};

/// Result type for signing operations
pub type Result<T> = std::result::Result<T, AuthError>;
