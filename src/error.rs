// Error types for the client facade

use custodian_auth::AuthError;
use custodian_config::ConfigError;
use custodian_webhooks::WebhookError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Webhooks are not configured")]
    WebhooksNotConfigured,
}

impl ClientError {
    /// The first diverging message part when the server rejected a signature
    pub fn signature_mismatch(&self) -> Option<&custodian_auth::PartMismatch> {
        match self {
            ClientError::Auth(AuthError::SignatureRejected {
                mismatch: Some(mismatch),
                ..
            }) => Some(&**mismatch),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
