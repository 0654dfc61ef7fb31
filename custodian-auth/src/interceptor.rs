//! Request interceptors
//!
//! The API-key interceptor must run last, right before a request goes on
//! the wire: it signs the URL path, query and body exactly as they will be
//! transmitted, and any later edit would invalidate the signature.

use crate::signer::headers;
use crate::{
    ApiKeySigner, AuthError, QueryParams, RequestDescriptor, Result, SignatureDebugInfo,
    SignatureDebugger, SignatureHeaders, message::current_timestamp,
};
use async_trait::async_trait;
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use reqwest::Request;
use serde::Serialize;
use tracing::debug;

/// Interceptor trait for modifying outgoing requests
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Intercept and optionally modify the request before sending.
    async fn intercept_request(&self, request: Request) -> Result<Request> {
        Ok(request)
    }
}

/// Adds API-key authentication headers to outgoing requests
#[derive(Debug, Clone)]
pub struct ApiKeyInterceptor {
    signer: ApiKeySigner,
    debugger: Option<SignatureDebugger>,
}

impl ApiKeyInterceptor {
    /// Create an interceptor around a signer
    pub fn new(signer: ApiKeySigner) -> Self {
        Self {
            signer,
            debugger: None,
        }
    }

    /// Attach a signature debugger
    pub fn with_debugger(mut self, debugger: SignatureDebugger) -> Self {
        self.debugger = Some(debugger);
        self
    }

    /// The attached debugger, if debugging was enabled
    pub fn debugger(&self) -> Option<&SignatureDebugger> {
        self.debugger.as_ref()
    }

    /// The signer used by this interceptor
    pub fn signer(&self) -> &ApiKeySigner {
        &self.signer
    }

    /// Reduce a request to the parts covered by the signature
    ///
    /// Fails when the body is a stream, since its bytes are not known yet,
    /// and when a query escape does not decode to UTF-8.
    pub fn describe(request: &Request, timestamp: i64) -> Result<RequestDescriptor> {
        let url = request.url();
        let query = QueryParams::parse(url.query().unwrap_or(""))?;

        let body = match request.body() {
            None => None,
            Some(body) => Some(body.as_bytes().ok_or_else(|| {
                AuthError::UnsignableBody("streaming bodies are not buffered".to_string())
            })?),
        };

        Ok(RequestDescriptor::at(timestamp, request.method().as_str(), url.path())
            .with_query(query)
            .with_body(body))
    }

    /// Sign a request in place with a fresh timestamp
    pub fn sign_request(&self, request: &mut Request) -> Result<SignatureHeaders> {
        let descriptor = Self::describe(request, current_timestamp())?;
        let signed = self.signer.sign(descriptor);
        signed.apply(request.headers_mut())?;

        debug!(
            key_id = %signed.key_id,
            method = %request.method(),
            path = %request.url().path(),
            "Attached API-key signature"
        );
        Ok(signed)
    }

    /// Digests of what was signed for an already signed request
    ///
    /// Returns `None` unless a debugger is attached or when the request
    /// carries no signature timestamp.
    pub fn debug_info(&self, request: &Request) -> Result<Option<SignatureDebugInfo>> {
        let Some(debugger) = &self.debugger else {
            return Ok(None);
        };

        let Some(timestamp) = request
            .headers()
            .get(headers::TIMESTAMP)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i64>().ok())
        else {
            return Ok(None);
        };

        let descriptor = Self::describe(request, timestamp)?;
        Ok(Some(debugger.capture(&descriptor)))
    }
}

#[async_trait]
impl Interceptor for ApiKeyInterceptor {
    async fn intercept_request(&self, mut request: Request) -> Result<Request> {
        self.sign_request(&mut request)?;
        Ok(request)
    }
}

/// Serialize `value` as the request body and mark it as JSON
///
/// Must happen before signing.
pub fn json_body<T: Serialize + ?Sized>(request: &mut Request, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    *request.body_mut() = Some(bytes.into());
    request
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SigningKey;
    use reqwest::{Method, Url};

    fn interceptor() -> ApiKeyInterceptor {
        ApiKeyInterceptor::new(ApiKeySigner::new(
            SigningKey::new("key-1", "secret", "passphrase").unwrap(),
        ))
    }

    fn request(method: Method, url: &str) -> Request {
        Request::new(method, Url::parse(url).unwrap())
    }

    #[test]
    fn test_describe_uses_path_and_query() {
        let request = request(
            Method::GET,
            "https://api.example.com/1.0/tenancy/users/?page_size=10&cursor=a%20b",
        );
        let descriptor = ApiKeyInterceptor::describe(&request, 42).unwrap();

        assert_eq!(descriptor.method, "GET");
        assert_eq!(descriptor.path, "/1.0/tenancy/users/");
        assert_eq!(descriptor.query.canonicalize(), "cursor=a%20b&page_size=10");
        assert!(descriptor.body.is_empty());
    }

    #[test]
    fn test_non_utf8_query_escape_is_not_signed() {
        let signer = interceptor();
        for url in ["https://h/p?x=%FF", "https://h/p?x=%FE"] {
            let mut request = request(Method::GET, url);
            assert!(matches!(
                ApiKeyInterceptor::describe(&request, 42),
                Err(AuthError::Canonicalization(_))
            ));
            assert!(signer.sign_request(&mut request).is_err());
            assert!(!request.headers().contains_key(headers::SIGNATURE));
        }
    }

    #[test]
    fn test_json_body_then_sign() {
        let mut request = request(Method::POST, "https://api.example.com/1.0/tenancy/users/");
        json_body(&mut request, &serde_json::json!({"username": "alice"})).unwrap();

        let signed = interceptor().sign_request(&mut request).unwrap();

        let descriptor = ApiKeyInterceptor::describe(
            &request,
            signed.timestamp.parse().unwrap(),
        )
        .unwrap();
        assert_eq!(descriptor.body, br#"{"username":"alice"}"#.to_vec());
        assert_eq!(interceptor().signer().signature(&descriptor), signed.signature);
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            request.headers().get(headers::SIGNATURE).unwrap(),
            signed.signature.as_str()
        );
    }

    #[test]
    fn test_debug_info_requires_debugger() {
        let mut request = request(Method::GET, "https://api.example.com/1.0/tenancy/echo/");
        let plain = interceptor();
        plain.sign_request(&mut request).unwrap();
        assert!(plain.debug_info(&request).unwrap().is_none());

        let debugging = interceptor().with_debugger(SignatureDebugger::new());
        let info = debugging.debug_info(&request).unwrap().unwrap();
        assert_eq!(info.parts.len(), 5);
    }

    #[test]
    fn test_debug_info_without_timestamp() {
        let request = request(Method::GET, "https://api.example.com/");
        let debugging = interceptor().with_debugger(SignatureDebugger::new());
        assert!(debugging.debug_info(&request).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_intercept_request_signs() {
        let request = request(Method::DELETE, "https://api.example.com/1.0/tenancy/users/bob");
        let request = interceptor().intercept_request(request).await.unwrap();

        assert_eq!(request.headers().get(headers::API_KEY).unwrap(), "key-1");
        assert_eq!(
            request.headers().get(headers::PASSPHRASE).unwrap(),
            "passphrase"
        );
        assert!(request.headers().contains_key(headers::TIMESTAMP));
        assert!(request.headers().contains_key(headers::SIGNATURE));
    }
}
