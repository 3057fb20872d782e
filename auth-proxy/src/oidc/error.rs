use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the relying party and the token verifier
#[derive(Debug, Error)]
pub enum OidcError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("discovery failed: {0}")]
    Discovery(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("state is not valid base64")]
    StateEncoding,
    #[error("state mismatch")]
    StateMismatch,
    #[error("state expired")]
    StateExpired,
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[error("token response carries no id_token")]
    MissingIdToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    TokenExpired,
    #[error("nonce mismatch")]
    NonceMismatch,
    #[error("no signing key for kid {0:?}")]
    UnknownKey(Option<String>),
    #[error("key set unavailable: {0}")]
    KeySet(String),
    #[error("crypto failure")]
    Crypto,
}

impl From<jsonwebtoken::errors::Error> for OidcError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => OidcError::TokenExpired,
            _ => OidcError::InvalidToken(err.to_string()),
        }
    }
}
