use crate::config::ProxyConfig;
use crate::oidc::{OidcError, OidcProvider};
use log::{error, warn};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    /// `None` when the OIDC environment is incomplete or discovery failed
    pub oidc: Option<Arc<OidcProvider>>,
}

impl AppState {
    /// Client used for discovery, key set and token endpoint calls
    pub fn create_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(2))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
    }

    /// Resolve the provider once.
    ///
    /// Configuration problems are logged here and leave the state without a
    /// provider; every OIDC and authz request then answers 503.
    pub async fn new(config: ProxyConfig) -> Self {
        let oidc = match Self::resolve_provider(&config).await {
            Ok(provider) => Some(Arc::new(provider)),
            Err(OidcError::Config(e)) => {
                warn!("OIDC is not configured: {}", e);
                None
            }
            Err(e) => {
                error!("Failed to initialize OIDC provider: {}", e);
                None
            }
        };

        Self {
            config: Arc::new(config),
            oidc,
        }
    }

    async fn resolve_provider(config: &ProxyConfig) -> Result<OidcProvider, OidcError> {
        let client = Self::create_http_client(config.oidc.http_timeout())?;
        OidcProvider::discover(&config.oidc, client).await
    }

    pub fn is_ready(&self) -> bool {
        self.oidc.is_some()
    }
}
