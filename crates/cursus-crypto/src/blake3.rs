//! Domain-separated BLAKE3 hashing.
//!
//! BLAKE3 serves several distinct purposes in the ledger. Cross-domain
//! collisions are prevented by mandatory domain separation using BLAKE3's
//! built-in mode flags.
//!
//! ## Modes
//!
//! - [`hash`]: Pure hashing: certificate integrity digests
//! - [`derive_key`]: Key derivation: MAC keys, deterministic certificate ids
//! - [`keyed_hash`]: Keyed MAC: session tokens, webhook signatures

/// Registered BLAKE3 context strings. Using an unregistered context is a bug.
pub mod contexts {
    pub const SESSION_TOKEN: &str = "Cursus v1 session-token";
    pub const PAYMENT_WEBHOOK: &str = "Cursus v1 payment-webhook";
    pub const CERTIFICATE_ID: &str = "Cursus v1 certificate-id";
    pub const CERTIFICATE_INTEGRITY: &str = "Cursus v1 certificate-integrity";

    /// All registered context strings. Used for validation.
    pub const ALL_CONTEXTS: &[&str] = &[
        SESSION_TOKEN,
        PAYMENT_WEBHOOK,
        CERTIFICATE_ID,
        CERTIFICATE_INTEGRITY,
    ];
}

/// Compute BLAKE3 hash of the input data.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *::blake3::hash(data).as_bytes()
}

/// Derive a key using BLAKE3's built-in key derivation mode.
///
/// # Arguments
///
/// * `context` - A registered context string (must start with "Cursus v1 ")
/// * `key_material` - The input key material
pub fn derive_key(context: &str, key_material: &[u8]) -> [u8; 32] {
    let mut hasher = ::blake3::Hasher::new_derive_key(context);
    hasher.update(key_material);
    *hasher.finalize().as_bytes()
}

/// Compute a keyed BLAKE3 hash (MAC/PRF).
pub fn keyed_hash(key: &[u8; 32], message: &[u8]) -> [u8; 32] {
    *::blake3::keyed_hash(key, message).as_bytes()
}

/// Verify that a context string is registered.
pub fn is_registered_context(context: &str) -> bool {
    contexts::ALL_CONTEXTS.contains(&context)
}

/// Encode multiple dynamic fields using length-prefixed encoding.
///
/// `LE32(len(field1)) || field1 || LE32(len(field2)) || field2 || ...`
///
/// Prevents `("ab", "c")` and `("a", "bc")` from hashing identically.
pub fn encode_multi_field(fields: &[&[u8]]) -> Vec<u8> {
    let total_len: usize = fields.iter().map(|f| 4 + f.len()).sum();
    let mut output = Vec::with_capacity(total_len);
    for field in fields {
        output.extend_from_slice(&(field.len() as u32).to_le_bytes());
        output.extend_from_slice(field);
    }
    output
}
