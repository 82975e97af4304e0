//! Signed session tokens.
//!
//! Token layout: `base64url(claims_json) "." hex(mac)`, where
//! `mac = BLAKE3::keyed_hash(K_session, base64url(claims_json))` and
//! `K_session = BLAKE3::derive_key("Cursus v1 session-token", secret)`.
//!
//! The ledger only verifies tokens. [`SessionKey::issue`] exists for the
//! authentication service that mints them and for tests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use cursus_types::identity::{Role, VerifiedIdentity};

use crate::blake3::contexts;
use crate::{CryptoError, Result, SecretKey};

/// Claims carried by a session token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the user id.
    pub sub: String,
    pub role: Role,
    /// Expiry, Unix seconds.
    pub exp: u64,
}

/// MAC key shared with the authentication service.
#[derive(Clone, Debug)]
pub struct SessionKey {
    key: SecretKey,
    leeway_secs: u64,
}

impl SessionKey {
    /// Derive the session key from operator secret material.
    ///
    /// `leeway_secs` tolerates small clock skew when checking `exp`.
    pub fn new(secret: &[u8], leeway_secs: u64) -> Result<Self> {
        Ok(Self {
            key: SecretKey::derive(contexts::SESSION_TOKEN, secret)?,
            leeway_secs,
        })
    }

    /// Mint a token for `claims`.
    pub fn issue(&self, claims: &SessionClaims) -> Result<String> {
        let json =
            serde_json::to_vec(claims).map_err(|e| CryptoError::Serialization(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let mac = self.key.mac(payload.as_bytes());
        Ok(format!("{payload}.{}", hex::encode(mac)))
    }

    /// Verify a token and return the identity it asserts.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::MalformedToken`] if the layout or claims do not parse
    /// - [`CryptoError::SignatureVerification`] if the MAC does not match
    /// - [`CryptoError::Expired`] if `now` is past `exp + leeway`
    pub fn verify(&self, token: &str, now: u64) -> Result<VerifiedIdentity> {
        let (payload, mac_hex) = token
            .split_once('.')
            .ok_or_else(|| CryptoError::MalformedToken("missing separator".into()))?;

        // MAC first: never parse attacker-controlled claims before authenticating them.
        self.key.verify_hex(payload.as_bytes(), mac_hex)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| CryptoError::MalformedToken(e.to_string()))?;
        let claims: SessionClaims =
            serde_json::from_slice(&json).map_err(|e| CryptoError::MalformedToken(e.to_string()))?;

        if claims.sub.is_empty() {
            return Err(CryptoError::MalformedToken("empty subject".into()));
        }
        if now > claims.exp.saturating_add(self.leeway_secs) {
            return Err(CryptoError::Expired { expires_at: claims.exp });
        }

        Ok(VerifiedIdentity {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}
