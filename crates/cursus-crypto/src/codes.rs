//! Certificate identifiers, public verification codes and integrity hashes.

use rand::{CryptoRng, Rng, RngCore};

use crate::blake3::{contexts, derive_key, encode_multi_field};

/// Unambiguous uppercase alphabet: no `I`, `O`, `0` or `1`.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of random groups in a verification code.
pub const CODE_GROUPS: usize = 3;

/// Characters per random group. 3 groups x 4 chars x 5 bits = 60 bits.
pub const CODE_GROUP_LEN: usize = 4;

/// Deterministic certificate id for `(user_id, course_id)`.
///
/// The id is the natural key of the certificate: every issuance attempt for
/// the same pair computes the same id, so the store's primary key rejects
/// duplicates.
pub fn certificate_id(user_id: &str, course_id: &str) -> String {
    let digest = derive_key(
        contexts::CERTIFICATE_ID,
        &encode_multi_field(&[user_id.as_bytes(), course_id.as_bytes()]),
    );
    hex::encode(&digest[..16])
}

/// Generate a verification code `PREFIX-XXXX-XXXX-XXXX` from `rng`.
pub fn generate_code_with<R: RngCore + CryptoRng>(prefix: &str, rng: &mut R) -> String {
    let mut code = String::with_capacity(prefix.len() + CODE_GROUPS * (CODE_GROUP_LEN + 1));
    code.push_str(prefix);
    for _ in 0..CODE_GROUPS {
        code.push('-');
        for _ in 0..CODE_GROUP_LEN {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            code.push(char::from(CODE_ALPHABET[idx]));
        }
    }
    code
}

/// Generate a verification code using the operating system RNG.
pub fn generate_code(prefix: &str) -> String {
    generate_code_with(prefix, &mut rand::rngs::OsRng)
}

/// Normalize a user-typed code: trim, uppercase.
pub fn normalize_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// Facts bound together by a certificate's integrity hash.
#[derive(Clone, Debug)]
pub struct IntegrityInput<'a> {
    pub user_id: &'a str,
    pub course_id: &'a str,
    pub course_revision: u32,
    /// Lesson ids required at issuance, in curriculum order.
    pub lesson_ids: &'a [String],
    pub issued_at: u64,
}

/// Hex BLAKE3 digest over the issuance facts.
pub fn integrity_hash(input: &IntegrityInput<'_>) -> String {
    let revision = input.course_revision.to_le_bytes();
    let issued_at = input.issued_at.to_le_bytes();
    let lessons = encode_multi_field(
        &input
            .lesson_ids
            .iter()
            .map(|id| id.as_bytes())
            .collect::<Vec<_>>(),
    );
    let encoded = encode_multi_field(&[
        input.user_id.as_bytes(),
        input.course_id.as_bytes(),
        &revision,
        &lessons,
        &issued_at,
    ]);
    hex::encode(derive_key(contexts::CERTIFICATE_INTEGRITY, &encoded))
}
