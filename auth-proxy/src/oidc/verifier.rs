//! ID token validation against the provider's rotating key set

use chrono::{DateTime, Utc};
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, PublicKeyUse};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use log::{debug, info, warn};
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::OidcError;

/// Cache key for a JWK published without a `kid`
const UNKEYED: &str = "";

const ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Standard claims of an OIDC ID token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// A token that passed verification
#[derive(Debug, Clone)]
pub struct IdToken {
    pub claims: IdTokenClaims,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawJwks {
    keys: Vec<Value>,
}

/// Verifier settings, mirrored from the discovered provider
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub issuer: String,
    pub client_id: String,
    pub jwks_uri: String,
    pub leeway: u64,
    pub key_ttl: Duration,
    pub min_refresh_interval: Duration,
}

/// Verifies ID tokens
///
/// Signing keys are cached per `kid`. A token signed with an unknown key
/// triggers one refresh of the key set; refreshes are serialized and rate
/// limited so that a stream of forged `kid`s cannot turn into a stream of
/// requests against the provider. A refresh only ever adds keys; keys dropped
/// by the provider stay usable until their cache entry expires, which gives
/// tokens in flight an overlap window during rotation.
pub struct TokenVerifier {
    config: VerifierConfig,
    client: Client,
    keys: Cache<String, Arc<DecodingKey>>,
    last_refresh: Mutex<Option<Instant>>,
}

impl TokenVerifier {
    pub fn new(config: VerifierConfig, client: Client) -> Self {
        let keys = Cache::builder()
            .time_to_live(config.key_ttl)
            .max_capacity(100)
            .build();
        Self {
            config,
            client,
            keys,
            last_refresh: Mutex::new(None),
        }
    }

    /// Verify signature, issuer, audience and expiry
    pub async fn verify(&self, token: &str) -> Result<IdToken, OidcError> {
        self.verify_token(token, None).await
    }

    /// `verify`, and also require the `nonce` claim to match
    pub async fn verify_with_nonce(&self, token: &str, nonce: &str) -> Result<IdToken, OidcError> {
        self.verify_token(token, Some(nonce)).await
    }

    async fn verify_token(&self, token: &str, nonce: Option<&str>) -> Result<IdToken, OidcError> {
        let header = decode_header(token)?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(OidcError::InvalidToken(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let key = self.signing_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[self.config.client_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = self.config.leeway;

        let data = decode::<IdTokenClaims>(token, &key, &validation)?;

        if let Some(expected) = nonce {
            let matches = data
                .claims
                .nonce
                .as_deref()
                .is_some_and(|n| n.as_bytes().ct_eq(expected.as_bytes()).into());
            if !matches {
                return Err(OidcError::NonceMismatch);
            }
        }

        let expiry = DateTime::from_timestamp(data.claims.exp, 0)
            .ok_or_else(|| OidcError::InvalidToken("exp out of range".to_string()))?;

        Ok(IdToken {
            claims: data.claims,
            expiry,
        })
    }

    async fn signing_key(&self, kid: Option<&str>) -> Result<Arc<DecodingKey>, OidcError> {
        if let Some(key) = self.lookup(kid).await {
            return Ok(key);
        }

        debug!("No cached signing key for kid {:?}, refreshing key set", kid);
        self.refresh().await?;

        self.lookup(kid)
            .await
            .ok_or_else(|| OidcError::UnknownKey(kid.map(str::to_string)))
    }

    async fn lookup(&self, kid: Option<&str>) -> Option<Arc<DecodingKey>> {
        match kid {
            Some(kid) => match self.keys.get(kid).await {
                Some(key) => Some(key),
                None => self.keys.get(UNKEYED).await,
            },
            None => {
                if let Some(key) = self.keys.get(UNKEYED).await {
                    return Some(key);
                }
                // Without a kid the choice is only unambiguous for a single key.
                let mut keys = self.keys.iter();
                let first = keys.next();
                match keys.next() {
                    None => first.map(|(_, key)| key),
                    Some(_) => None,
                }
            }
        }
    }

    /// Fetch the key set and add its keys to the cache.
    ///
    /// Returns `Ok(false)` when a refresh happened too recently to run again.
    pub async fn refresh(&self) -> Result<bool, OidcError> {
        let mut last_refresh = self.last_refresh.lock().await;
        if last_refresh.is_some_and(|at| at.elapsed() < self.config.min_refresh_interval) {
            debug!("Key set refreshed recently, skipping");
            return Ok(false);
        }

        let fetched = self.fetch_jwks().await;
        *last_refresh = Some(Instant::now());
        let jwks = fetched?;

        let mut loaded = 0;
        for value in jwks.keys {
            let jwk: Jwk = match serde_json::from_value(value) {
                Ok(jwk) => jwk,
                Err(e) => {
                    debug!("Skipping unparseable JWK: {}", e);
                    continue;
                }
            };
            if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption))
                || matches!(jwk.algorithm, AlgorithmParameters::OctetKey(_))
            {
                continue;
            }
            match DecodingKey::from_jwk(&jwk) {
                Ok(key) => {
                    let kid = jwk.common.key_id.clone().unwrap_or_default();
                    self.keys.insert(kid, Arc::new(key)).await;
                    loaded += 1;
                }
                Err(e) => warn!("Skipping JWK {:?}: {}", jwk.common.key_id, e),
            }
        }

        if loaded == 0 {
            return Err(OidcError::KeySet(
                "key set contains no usable signing keys".to_string(),
            ));
        }

        info!("Loaded {} signing keys from {}", loaded, self.config.jwks_uri);
        Ok(true)
    }

    async fn fetch_jwks(&self) -> Result<RawJwks, OidcError> {
        let response = self.client.get(&self.config.jwks_uri).send().await?;
        if !response.status().is_success() {
            return Err(OidcError::KeySet(format!(
                "{} returned HTTP {}",
                self.config.jwks_uri,
                response.status()
            )));
        }
        response
            .json::<RawJwks>()
            .await
            .map_err(|e| OidcError::KeySet(format!("invalid key set: {e}")))
    }

    /// Keep the key cache warm by refreshing on a fixed period
    pub fn spawn_refresh(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let verifier = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // the first tick completes immediately; keys were loaded at startup
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = verifier.refresh().await {
                    warn!("Background key set refresh failed: {}", e);
                }
            }
        })
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
