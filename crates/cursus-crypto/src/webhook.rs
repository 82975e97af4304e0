//! Signatures on payment signals forwarded by the webhook adapter.
//!
//! `sig = hex(BLAKE3::keyed_hash(K_webhook, LP(event_id) || LP(user_id) ||
//! LP(course_id) || LP(signal_json)))` with length-prefixed fields.

use cursus_types::signal::SignalEnvelope;

use crate::blake3::{contexts, encode_multi_field};
use crate::{CryptoError, Result, SecretKey};

/// Shared key between the webhook adapter and the ledger.
#[derive(Clone, Debug)]
pub struct WebhookKey {
    key: SecretKey,
}

impl WebhookKey {
    pub fn new(secret: &[u8]) -> Result<Self> {
        Ok(Self {
            key: SecretKey::derive(contexts::PAYMENT_WEBHOOK, secret)?,
        })
    }

    /// Hex signature over the envelope.
    pub fn sign(&self, envelope: &SignalEnvelope) -> Result<String> {
        Ok(hex::encode(self.key.mac(&signing_bytes(envelope)?)))
    }

    /// Check `signature` against the envelope.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::SignatureVerification`] if the signature is not valid hex
    ///   or does not match
    pub fn verify(&self, envelope: &SignalEnvelope, signature: &str) -> Result<()> {
        self.key.verify_hex(&signing_bytes(envelope)?, signature)
    }
}

fn signing_bytes(envelope: &SignalEnvelope) -> Result<Vec<u8>> {
    let signal =
        serde_json::to_vec(&envelope.signal).map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(encode_multi_field(&[
        envelope.event_id.as_bytes(),
        envelope.user_id.as_bytes(),
        envelope.course_id.as_bytes(),
        &signal,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cursus_types::signal::PaymentSignal;

    fn envelope(signal: PaymentSignal) -> SignalEnvelope {
        SignalEnvelope {
            event_id: "evt_1".into(),
            user_id: "u1".into(),
            course_id: "c1".into(),
            signal,
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let key = WebhookKey::new(b"webhook-secret-material").expect("key");
        let env = envelope(PaymentSignal::PaymentFailed);
        let sig = key.sign(&env).expect("sign");
        key.verify(&env, &sig).expect("valid");
    }

    #[test]
    fn test_signature_binds_every_field() {
        let key = WebhookKey::new(b"webhook-secret-material").expect("key");
        let env = envelope(PaymentSignal::PaymentSucceeded { access_until: None });
        let sig = key.sign(&env).expect("sign");

        let mut other_course = env.clone();
        other_course.course_id = "c2".into();
        assert!(key.verify(&other_course, &sig).is_err());

        let other_signal = envelope(PaymentSignal::Refunded);
        assert!(matches!(
            key.verify(&other_signal, &sig),
            Err(CryptoError::SignatureVerification)
        ));
    }
}
