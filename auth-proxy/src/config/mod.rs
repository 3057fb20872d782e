pub use crate::config::oidc::{OidcConfig, OidcCredentials};
use confique::Config;
use thiserror::Error;

pub mod oidc;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] confique::Error),
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// Main configuration structure for the auth proxy
#[derive(Debug, Config, Clone)]
pub struct ProxyConfig {
    /// Address the server binds to (default: 0.0.0.0)
    #[config(env = "AUTH_PROXY_HOST", default = "0.0.0.0")]
    pub host: String,

    /// The port the auth proxy will listen to (default: 3002)
    #[config(env = "AUTH_PROXY_PORT", default = 3002)]
    pub port: u16,

    /// Exit at startup when the identity provider cannot be resolved,
    /// instead of serving 503 (default: false)
    #[config(env = "AUTH_PROXY_FAIL_FAST", default = false)]
    pub fail_fast: bool,

    /// OpenID Connect configuration
    #[config(nested)]
    pub oidc: OidcConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            fail_fast: false,
            oidc: OidcConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Creates a new Config instance from environment variables
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self::builder().env().load()?)
    }

    #[cfg(test)]
    pub fn for_test_with_mocks(provider_mock: &wiremock::MockServer) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0, // Let the OS choose a port
            fail_fast: false,
            oidc: OidcConfig {
                client_id: Some("test-client".to_string()),
                client_secret: Some("test-client-secret".to_string()),
                provider_url: Some(provider_mock.uri()),
                auth_proxy_url: Some("https://auth.example.com".to_string()),
                http_timeout: 5,
                ..Default::default()
            },
        }
    }
}
