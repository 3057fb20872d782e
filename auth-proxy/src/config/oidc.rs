//! OpenID Connect relying party configuration

use confique::Config;
use std::time::Duration;

use super::ConfigError;

/// OIDC client configuration
///
/// The four connection values are optional at load time so that a process
/// started without them still comes up and answers every request with 503.
#[derive(Debug, Config, Clone)]
pub struct OidcConfig {
    /// Client identifier registered with the identity provider
    #[config(env = "OIDC_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Client secret; also the root of the URL signing and state encryption keys
    #[config(env = "OIDC_CLIENT_SECRET")]
    pub client_secret: Option<String>,

    /// Issuer URL of the identity provider, used for discovery
    #[config(env = "OIDC_PROVIDER_URL")]
    pub provider_url: Option<String>,

    /// Public URL under which this proxy's /oidc endpoints are reachable
    #[config(env = "OIDC_AUTH_PROXY_URL")]
    pub auth_proxy_url: Option<String>,

    /// Requested scopes, comma-separated (default: "openid,profile,email,groups")
    #[config(env = "OIDC_SCOPES", default = "openid,profile,email,groups")]
    pub scopes: String,

    /// Lifetime of an encrypted login state in seconds (default: 600)
    #[config(env = "OIDC_STATE_TTL", default = 600)]
    pub state_ttl: u64,

    /// Timeout for calls to the identity provider in seconds (default: 10)
    #[config(env = "OIDC_HTTP_TIMEOUT", default = 10)]
    pub http_timeout: u64,

    /// Allowed clock skew when checking token expiry in seconds (default: 60)
    #[config(env = "OIDC_CLOCK_SKEW", default = 60)]
    pub clock_skew: u64,

    /// How long fetched signing keys are trusted in seconds (default: 300)
    #[config(env = "OIDC_JWKS_CACHE_TTL", default = 300)]
    pub jwks_cache_ttl: u64,

    /// Minimum delay between two key set fetches in seconds (default: 10)
    #[config(env = "OIDC_JWKS_MIN_REFRESH_INTERVAL", default = 10)]
    pub jwks_min_refresh_interval: u64,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            provider_url: None,
            auth_proxy_url: None,
            scopes: "openid,profile,email,groups".to_string(),
            state_ttl: 600,
            http_timeout: 10,
            clock_skew: 60,
            jwks_cache_ttl: 300,
            jwks_min_refresh_interval: 10,
        }
    }
}

/// The required connection values, all present and non-empty
#[derive(Debug, Clone)]
pub struct OidcCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub provider_url: String,
    pub auth_proxy_url: String,
}

impl OidcCredentials {
    /// Callback URL registered with the provider
    pub fn redirect_url(&self) -> String {
        format!("{}/oidc/callback", self.auth_proxy_url)
    }

    /// Entry point of the login flow on this proxy
    pub fn login_url(&self) -> String {
        format!("{}/oidc/login", self.auth_proxy_url)
    }
}

impl OidcConfig {
    /// Returns the connection values, or the first missing variable
    pub fn credentials(&self) -> Result<OidcCredentials, ConfigError> {
        Ok(OidcCredentials {
            client_id: required(&self.client_id, "OIDC_CLIENT_ID")?,
            client_secret: required(&self.client_secret, "OIDC_CLIENT_SECRET")?,
            provider_url: required(&self.provider_url, "OIDC_PROVIDER_URL")?
                .trim_end_matches('/')
                .to_string(),
            auth_proxy_url: required(&self.auth_proxy_url, "OIDC_AUTH_PROXY_URL")?
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Get scopes as a vector
    pub fn get_scopes(&self) -> Vec<String> {
        self.scopes
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    pub fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew)
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl)
    }

    pub fn jwks_min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.jwks_min_refresh_interval)
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}
