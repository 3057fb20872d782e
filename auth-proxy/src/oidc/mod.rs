//! OpenID Connect relying party
//!
//! [`OidcProvider`] is resolved once at startup from the environment and the
//! provider's discovery document and is immutable afterwards.

pub mod discovery;
mod error;
pub mod signature;
pub mod state;
pub mod verifier;

pub use error::OidcError;

use crate::config::{OidcConfig, OidcCredentials};
use discovery::{fetch_discovery, DiscoveryDocument};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use signature::UrlSigner;
use state::{StateCodec, StatePayload};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use verifier::{TokenVerifier, VerifierConfig};

/// How the client authenticates at the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthMethod {
    /// HTTP Basic with client id and secret
    Basic,
    /// Client id and secret in the form body
    Post,
}

impl ClientAuthMethod {
    /// `client_secret_basic` is the OIDC default; use post only when it is
    /// the sole secret method the provider advertises.
    pub fn from_supported(methods: &[String]) -> Self {
        let supports = |m: &str| methods.iter().any(|s| s == m);
        if !supports("client_secret_basic") && supports("client_secret_post") {
            Self::Post
        } else {
            Self::Basic
        }
    }
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    pub fn into_id_token(self) -> Result<String, OidcError> {
        match self.id_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(OidcError::MissingIdToken),
        }
    }
}

#[derive(Debug)]
pub struct OidcProvider {
    credentials: OidcCredentials,
    scopes: Vec<String>,
    authorization_endpoint: Url,
    token_endpoint: Url,
    auth_method: ClientAuthMethod,
    state_ttl: Duration,
    clock_skew: Duration,
    client: Client,
    signer: UrlSigner,
    state_codec: StateCodec,
    verifier: Arc<TokenVerifier>,
}

impl OidcProvider {
    /// Resolve the provider: check the environment, run discovery and load
    /// the initial key set. Any failure leaves the proxy unconfigured.
    pub async fn discover(config: &OidcConfig, client: Client) -> Result<Self, OidcError> {
        let credentials = config.credentials()?;
        let discovery = fetch_discovery(&client, &credentials.provider_url).await?;
        Self::from_discovery(config, credentials, discovery, client).await
    }

    async fn from_discovery(
        config: &OidcConfig,
        credentials: OidcCredentials,
        discovery: DiscoveryDocument,
        client: Client,
    ) -> Result<Self, OidcError> {
        let authorization_endpoint = Url::parse(&discovery.authorization_endpoint)?;
        let token_endpoint = Url::parse(&discovery.token_endpoint)?;
        let auth_method =
            ClientAuthMethod::from_supported(&discovery.token_endpoint_auth_methods_supported);
        debug!("Token endpoint client authentication: {:?}", auth_method);

        let verifier = TokenVerifier::new(
            VerifierConfig {
                issuer: discovery.issuer.clone(),
                client_id: credentials.client_id.clone(),
                jwks_uri: discovery.jwks_uri.clone(),
                leeway: config.clock_skew,
                key_ttl: config.jwks_cache_ttl(),
                min_refresh_interval: config.jwks_min_refresh_interval(),
            },
            client.clone(),
        );
        verifier.refresh().await?;

        info!(
            "OIDC provider {} resolved for client {}",
            discovery.issuer, credentials.client_id
        );

        Ok(Self {
            signer: UrlSigner::new(&credentials.client_secret),
            state_codec: StateCodec::from_secret(&credentials.client_secret),
            scopes: config.get_scopes(),
            state_ttl: config.state_ttl(),
            clock_skew: config.clock_skew(),
            credentials,
            authorization_endpoint,
            token_endpoint,
            auth_method,
            client,
            verifier: Arc::new(verifier),
        })
    }

    pub fn credentials(&self) -> &OidcCredentials {
        &self.credentials
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    pub fn state_codec(&self) -> &StateCodec {
        &self.state_codec
    }

    pub fn verifier(&self) -> &Arc<TokenVerifier> {
        &self.verifier
    }

    pub fn state_ttl(&self) -> Duration {
        self.state_ttl
    }

    /// Tolerated clock difference between replicas and the provider
    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// `<auth proxy>/oidc/login` carrying the signed return address
    pub fn login_redirect(&self, original_url: &str) -> Result<Url, OidcError> {
        let mut url = Url::parse(&self.credentials.login_url())?;
        url.query_pairs_mut()
            .append_pair("original_url", original_url)
            .append_pair("sign", &self.signer.sign(original_url));
        Ok(url)
    }

    /// Authorization endpoint URL for one login attempt
    pub fn authorization_url(&self, state: &StatePayload) -> Result<Url, OidcError> {
        let encoded_state = self.state_codec.encode_param(state)?;

        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("redirect_uri", &self.credentials.redirect_url())
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &encoded_state)
            .append_pair("nonce", &state.nonce);
        Ok(url)
    }

    /// Redeem an authorization code at the token endpoint
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OidcError> {
        let redirect_uri = self.credentials.redirect_url();
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let mut request = self.client.post(self.token_endpoint.clone());
        match self.auth_method {
            ClientAuthMethod::Basic => {
                // RFC 6749 section 2.3.1: both halves are form-urlencoded first
                request = request.basic_auth(
                    form_encode(&self.credentials.client_id),
                    Some(form_encode(&self.credentials.client_secret)),
                );
            }
            ClientAuthMethod::Post => {
                form.push(("client_id", self.credentials.client_id.as_str()));
                form.push(("client_secret", self.credentials.client_secret.as_str()));
            }
        }

        let response = request.form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OidcError::Exchange(format!(
                "token endpoint returned HTTP {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| OidcError::Exchange(format!("invalid token response: {e}")))
    }
}

fn form_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
