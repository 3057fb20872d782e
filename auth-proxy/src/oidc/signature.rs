//! Keyed signatures for values that cross from the protected domain into the
//! login domain and back.
//!
//! The two legs of the flow may be served under different public hosts, so
//! there is no shared cookie to bind them. Instead the gateway signs the URL it
//! wants the user returned to and the login endpoint refuses anything it cannot
//! re-sign to the same value.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Clone)]
pub struct UrlSigner {
    secret: Arc<[u8]>,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
        }
    }

    /// SHA-256 over the value followed by the secret, base64 without padding
    pub fn sign(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        hasher.update(self.secret.as_ref());
        STANDARD_NO_PAD.encode(hasher.finalize())
    }

    /// Recompute the signature and compare in constant time
    pub fn verify(&self, value: &str, signature: &str) -> bool {
        let expected = self.sign(value);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("secret_length", &self.secret.len())
            .finish_non_exhaustive()
    }
}
