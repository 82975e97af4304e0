//! # cursus-crypto
//!
//! Cryptographic helpers for the Cursus ledger. Everything is built on
//! domain-separated BLAKE3; there is no algorithm negotiation.
//!
//! ## Modules
//!
//! - [`blake3`]: Hashing, key derivation and keyed MACs with registered contexts
//! - [`session`]: Verification of signed session tokens
//! - [`webhook`]: Signatures on payment-processor signals
//! - [`codes`]: Certificate ids, verification codes and integrity hashes

pub mod blake3;
pub mod codes;
pub mod session;
pub mod webhook;

use zeroize::Zeroize;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The token is not in `payload.mac` form or its payload does not decode.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The MAC over a token or signal did not match.
    #[error("signature verification failed")]
    SignatureVerification,

    /// The session token has expired.
    #[error("token expired at {expires_at}")]
    Expired {
        /// Expiry recorded in the token.
        expires_at: u64,
    },

    /// Invalid key material.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

/// A 32-byte MAC key derived from an operator secret. Wiped on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Derive a key for `context` from raw secret material.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidKey`] if the material is shorter than 16 bytes
    pub fn derive(context: &str, material: &[u8]) -> Result<Self> {
        if material.len() < 16 {
            return Err(CryptoError::InvalidKey(format!(
                "secret material must be at least 16 bytes, got {}",
                material.len()
            )));
        }
        Ok(Self(crate::blake3::derive_key(context, material)))
    }

    pub(crate) fn mac(&self, message: &[u8]) -> [u8; 32] {
        crate::blake3::keyed_hash(&self.0, message)
    }

    /// Constant-time comparison of a hex MAC against the MAC of `message`.
    pub(crate) fn verify_hex(&self, message: &[u8], mac_hex: &str) -> Result<()> {
        let mut presented = [0u8; 32];
        hex::decode_to_slice(mac_hex, &mut presented)
            .map_err(|_| CryptoError::SignatureVerification)?;
        // blake3::Hash equality is constant-time.
        if ::blake3::Hash::from(self.mac(message)) == ::blake3::Hash::from(presented) {
            Ok(())
        } else {
            Err(CryptoError::SignatureVerification)
        }
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}
