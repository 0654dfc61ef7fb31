// Client facade tying signing, debugging and webhooks together

use crate::{ClientError, Result};
use custodian_auth::{
    ApiKeyInterceptor, ApiKeySigner, AuthError, SignatureDebugger, SigningKey, json_body,
};
use custodian_config::ClientConfig;
use custodian_webhooks::{WebhookConfig, WebhookListener, WebhookRecording};
use reqwest::{Method, Request, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Signed HTTP access to the custody API plus its webhook feed
#[derive(Debug)]
pub struct CustodianClient {
    http: reqwest::Client,
    base_url: Url,
    interceptor: ApiKeyInterceptor,
    listener: Option<WebhookListener>,
    match_timeout: Duration,
}

impl CustodianClient {
    /// Build a client from loaded configuration
    ///
    /// A signature debugger is attached when `signature_debug` is set. The
    /// webhook listener is only created when an HMAC key is configured.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Like [`from_config`](Self::from_config) with a caller-supplied HTTP client
    pub fn with_http_client(config: &ClientConfig, http: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;

        let key = SigningKey::new(
            config.api_key.key.as_str(),
            config.api_key.secret.as_str(),
            config.api_key.passphrase.as_str(),
        )?;
        let mut interceptor = ApiKeyInterceptor::new(ApiKeySigner::new(key));
        if config.signature_debug {
            interceptor = interceptor.with_debugger(SignatureDebugger::new());
        }

        let listener = match &config.webhook.hmac_key {
            Some(hmac_key) => Some(WebhookListener::new(
                WebhookConfig::builder()
                    .secret(hmac_key.as_str())
                    .signature_header(config.webhook.signature_header.as_str())
                    .match_timeout(config.webhook.match_timeout())
                    .build(),
            )?),
            None => None,
        };

        debug!(
            base_url = %base_url,
            key_id = %config.api_key.key,
            signature_debug = config.signature_debug,
            webhooks = listener.is_some(),
            "Custodian client ready"
        );

        Ok(Self {
            http,
            base_url,
            interceptor,
            listener,
            match_timeout: config.webhook.match_timeout(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The request signer
    pub fn signer(&self) -> &ApiKeySigner {
        self.interceptor.signer()
    }

    /// Build an unsigned request for a path on the API host
    pub fn request(&self, method: Method, path: &str) -> Result<Request> {
        let url = self.base_url.join(path)?;
        Ok(Request::new(method, url))
    }

    /// Sign and send a request
    ///
    /// With signature debugging enabled, a 403 carrying the server's debug
    /// hint becomes [`AuthError::SignatureRejected`] naming the first message
    /// part that differs. Every other response is returned unchanged.
    pub async fn execute(&self, mut request: Request) -> Result<Response> {
        self.interceptor.sign_request(&mut request)?;
        let debug_info = self.interceptor.debug_info(&request)?;

        let response = self.http.execute(request).await?;
        let status = response.status();

        let (Some(info), Some(debugger)) = (debug_info, self.interceptor.debugger()) else {
            return Ok(response);
        };
        if status != reqwest::StatusCode::FORBIDDEN {
            return Ok(response);
        }

        let version = response.version();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        let body = serde_json::from_slice::<serde_json::Value>(&bytes).unwrap_or_default();
        if custodian_auth::ServerDebugHint::from_rejection(status.as_u16(), &body).is_some() {
            let mismatch = debugger.inspect_rejection(&info, status.as_u16(), &body);
            return Err(AuthError::SignatureRejected {
                status: status.as_u16(),
                mismatch: mismatch.map(Box::new),
            }
            .into());
        }

        // Not a signature problem; hand back an equivalent response.
        let mut rebuilt = http::Response::new(bytes);
        *rebuilt.status_mut() = status;
        *rebuilt.version_mut() = version;
        *rebuilt.headers_mut() = headers;
        Ok(Response::from(rebuilt))
    }

    /// Send a request and decode a successful JSON response
    pub async fn execute_json<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let response = self.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Custody API request failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Signed `GET` of a JSON resource
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.request(Method::GET, path)?;
        self.execute_json(request).await
    }

    /// Signed request with a JSON body
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.request(method, path)?;
        json_body(&mut request, body)?;
        self.execute_json(request).await
    }

    /// The shared webhook listener
    pub fn webhooks(&self) -> Result<&WebhookListener> {
        self.listener
            .as_ref()
            .ok_or(ClientError::WebhooksNotConfigured)
    }

    /// Open a recording on the shared webhook feed
    pub fn recording(&self) -> Result<WebhookRecording> {
        Ok(self.webhooks()?.recording())
    }

    /// Configured default for [`WebhookRecording::are_all_matched`]
    pub fn match_timeout(&self) -> Duration {
        self.match_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodian_config::{ApiKeyConfig, WebhookSettings};

    fn config() -> ClientConfig {
        ClientConfig {
            base_url: "https://api.example.com".to_string(),
            api_key: ApiKeyConfig {
                key: "key-id".to_string(),
                secret: "secret".to_string(),
                passphrase: "passphrase".to_string(),
            },
            webhook: WebhookSettings::default(),
            signature_debug: false,
        }
    }

    #[test]
    fn test_from_config() {
        let client = CustodianClient::from_config(&config()).unwrap();
        assert_eq!(client.signer().key_id(), "key-id");
        assert_eq!(client.match_timeout(), Duration::from_secs(180));
        assert!(matches!(
            client.recording(),
            Err(ClientError::WebhooksNotConfigured)
        ));
    }

    #[test]
    fn test_webhooks_from_config() {
        let mut config = config();
        config.webhook.hmac_key = Some("hook-key".to_string());
        config.webhook.match_timeout_secs = 12;

        let client = CustodianClient::from_config(&config).unwrap();
        assert_eq!(client.webhooks().unwrap().match_timeout(), Duration::from_secs(12));

        let _recording = client.recording().unwrap();
        assert_eq!(client.webhooks().unwrap().subscriber_count(), 1);
    }

    #[test]
    fn test_request_joins_base_url() {
        let client = CustodianClient::from_config(&config()).unwrap();
        let request = client.request(Method::GET, "/1.0/tenancy/echo/").unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/1.0/tenancy/echo/"
        );
    }

    #[test]
    fn test_invalid_credentials() {
        let mut config = config();
        config.api_key.secret = String::new();
        assert!(matches!(
            CustodianClient::from_config(&config),
            Err(ClientError::Auth(AuthError::MissingCredential(_)))
        ));
    }
}
