//! Encrypted login state carried through the provider redirect.
//!
//! Nothing about a login attempt is kept server side. The nonce and the URL the
//! user started from travel inside the OAuth `state` parameter, sealed with
//! AES-256-GCM so that any tampering fails authentication instead of
//! producing a different, well-formed payload.

use aes_gcm::aead::{rand_core::RngCore, Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use super::OidcError;

const KEY_DERIVATION_LABEL: &[u8] = b"auth-proxy/state-key/v1";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const STATE_NONCE_LEN: usize = 16;

/// CSRF nonce and return address for one login attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    pub nonce: String,
    pub original_url: String,
    /// Unix seconds at which the login attempt started
    pub issued_at: i64,
}

impl StatePayload {
    pub fn new(original_url: impl Into<String>) -> Self {
        let nonce = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_NONCE_LEN)
            .map(char::from)
            .collect();
        Self {
            nonce,
            original_url: original_url.into(),
            issued_at: Utc::now().timestamp(),
        }
    }

    /// Whether the attempt started longer than `ttl` ago. A state stamped up
    /// to `leeway` in the future is accepted, since another replica may have
    /// issued it with a slightly faster clock.
    pub fn is_expired(&self, ttl: Duration, leeway: Duration) -> bool {
        let age = Utc::now().timestamp() - self.issued_at;
        if age < 0 {
            return age.unsigned_abs() > leeway.as_secs();
        }
        age.unsigned_abs() > ttl.as_secs()
    }
}

pub struct StateCodec {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for StateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCodec").finish_non_exhaustive()
    }
}

impl StateCodec {
    /// Derive the state key from the client secret
    pub fn from_secret(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_DERIVATION_LABEL);
        hasher.update(secret.as_bytes());
        let key: [u8; 32] = hasher.finalize().into();
        Self {
            cipher: Aes256Gcm::new((&key).into()),
        }
    }

    /// Serialize and seal a payload; output is `nonce || ciphertext || tag`
    pub fn encode(&self, state: &StatePayload) -> Result<Vec<u8>, OidcError> {
        let payload = serde_json::to_vec(state).map_err(|_| OidcError::Crypto)?;
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), payload.as_ref())
            .map_err(|_| OidcError::Crypto)?;

        let mut out = Vec::with_capacity(nonce.len() + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Open a sealed payload; any failure is a `StateMismatch`
    pub fn decode(&self, raw: &[u8]) -> Result<StatePayload, OidcError> {
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(OidcError::StateMismatch);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| OidcError::StateMismatch)?;

        serde_json::from_slice(&plaintext).map_err(|_| OidcError::StateMismatch)
    }

    /// `encode` as a URL-safe base64 string for the `state` query parameter
    pub fn encode_param(&self, state: &StatePayload) -> Result<String, OidcError> {
        Ok(URL_SAFE_NO_PAD.encode(self.encode(state)?))
    }

    pub fn decode_param(&self, value: &str) -> Result<StatePayload, OidcError> {
        let raw = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| OidcError::StateEncoding)?;
        self.decode(&raw)
    }
}
