//! Identity verification.
//!
//! The ledger does not mint identities; it only checks session tokens issued
//! by the authentication service.

use cursus_crypto::session::SessionKey;
use cursus_crypto::CryptoError;
use cursus_types::identity::VerifiedIdentity;

use crate::{AccessError, Result};

/// Turns an opaque session token into a verified identity.
pub trait IdentityVerifier: Send + Sync {
    /// # Errors
    ///
    /// - [`AccessError::Unauthenticated`] for missing, malformed, forged or
    ///   expired tokens
    fn verify_identity(&self, token: &str, now: u64) -> Result<VerifiedIdentity>;
}

/// Verifies tokens MAC'd with the shared session key.
#[derive(Debug, Clone)]
pub struct SessionTokenVerifier {
    key: SessionKey,
}

impl SessionTokenVerifier {
    pub fn new(key: SessionKey) -> Self {
        Self { key }
    }
}

impl IdentityVerifier for SessionTokenVerifier {
    fn verify_identity(&self, token: &str, now: u64) -> Result<VerifiedIdentity> {
        if token.is_empty() {
            return Err(AccessError::Unauthenticated("missing session token".into()));
        }
        self.key.verify(token, now).map_err(|e| {
            tracing::debug!(error = %e, "session token rejected");
            match e {
                CryptoError::Expired { .. } => AccessError::Unauthenticated("session expired".into()),
                _ => AccessError::Unauthenticated("invalid session token".into()),
            }
        })
    }
}
