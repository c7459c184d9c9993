//! Admin authentication: a detached ed25519 signature over a
//! server-issued nonce, from a public key on the configured allow-list.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rand::Rng;

use super::error::ApiError;
use super::state::AppState;

const NONCE_TTL: Duration = Duration::from_secs(300);

#[derive(Default)]
pub struct NonceStore {
    issued: Mutex<HashMap<String, Instant>>,
}

impl NonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> String {
        let bytes: [u8; 32] = rand::rng().random();
        let nonce = bs58::encode(bytes).into_string();
        let mut issued = self.issued.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        issued.retain(|_, at| now.duration_since(*at) < NONCE_TTL);
        issued.insert(nonce.clone(), now);
        nonce
    }

    /// Single use: a consumed nonce cannot authenticate twice.
    pub fn consume(&self, nonce: &str) -> bool {
        let mut issued = self.issued.lock().unwrap_or_else(|p| p.into_inner());
        match issued.remove(nonce) {
            Some(at) => at.elapsed() < NONCE_TTL,
            None => false,
        }
    }
}

/// Verify a detached signature over the nonce bytes against a base58
/// ed25519 public key.
pub fn verify_detached(pubkey_b58: &str, nonce: &str, signature_b58: &str) -> bool {
    let Ok(key_bytes) = bs58::decode(pubkey_b58).into_vec() else {
        return false;
    };
    let key_bytes: [u8; 32] = match key_bytes.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = bs58::decode(signature_b58).into_vec() else {
        return false;
    };
    let sig_bytes: [u8; 64] = match sig_bytes.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(&sig_bytes);
    key.verify(nonce.as_bytes(), &signature).is_ok()
}

/// Extractor for admin routes. Requires `x-admin-key`, `x-admin-nonce`,
/// and `x-admin-signature` headers.
pub struct AdminAuth {
    pub admin_key: String,
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let key = header("x-admin-key")
            .ok_or_else(|| ApiError::Unauthorized("missing x-admin-key".into()))?;
        let nonce = header("x-admin-nonce")
            .ok_or_else(|| ApiError::Unauthorized("missing x-admin-nonce".into()))?;
        let signature = header("x-admin-signature")
            .ok_or_else(|| ApiError::Unauthorized("missing x-admin-signature".into()))?;

        if !state.ctx.env.admin_allowed_keys.iter().any(|k| k == &key) {
            return Err(ApiError::Unauthorized("key not on allow-list".into()));
        }
        if !state.nonces.consume(&nonce) {
            return Err(ApiError::Unauthorized("unknown or expired nonce".into()));
        }
        if !verify_detached(&key, &nonce, &signature) {
            return Err(ApiError::Unauthorized("signature verification failed".into()));
        }

        Ok(AdminAuth { admin_key: key })
    }
}
