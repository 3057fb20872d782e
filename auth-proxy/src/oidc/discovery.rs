use log::debug;
use reqwest::Client;
use serde::Deserialize;

use super::OidcError;

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// The subset of the provider metadata the relying party relies on
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

/// Fetch and sanity-check `<provider_url>/.well-known/openid-configuration`
pub async fn fetch_discovery(
    client: &Client,
    provider_url: &str,
) -> Result<DiscoveryDocument, OidcError> {
    let url = format!("{}{}", provider_url.trim_end_matches('/'), DISCOVERY_PATH);
    debug!("Fetching OIDC discovery document from {}", url);

    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(OidcError::Discovery(format!(
            "{} returned HTTP {}",
            url,
            response.status()
        )));
    }

    let discovery: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| OidcError::Discovery(format!("invalid discovery document: {e}")))?;

    if discovery.issuer.trim().is_empty()
        || discovery.authorization_endpoint.trim().is_empty()
        || discovery.token_endpoint.trim().is_empty()
        || discovery.jwks_uri.trim().is_empty()
    {
        return Err(OidcError::Discovery(
            "discovery document is missing mandatory fields".to_string(),
        ));
    }

    // Tokens are checked against this issuer, so it has to be the one we asked.
    if discovery.issuer.trim_end_matches('/') != provider_url.trim_end_matches('/') {
        return Err(OidcError::Discovery(format!(
            "issuer {} does not match provider url {}",
            discovery.issuer, provider_url
        )));
    }

    Ok(discovery)
}
