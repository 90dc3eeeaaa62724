//! Receipt signing key hierarchy.
//!
//! One secret comes in from the environment: the base58 ledger writer
//! keypair. Its 32-byte seed doubles as the HKDF master for the receipt
//! subkeys, so rotating the writer rotates every receipt key with it.
//! Each receipt kind signs under its own derived key and published
//! context string; a signature from one context never verifies under the
//! other.

use crate::canonical::canonical_json;
use crate::error::{BeatsError, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use serde_json::Value;
use sha2::Sha256;

/// HKDF info string for the timestamp receipt key.
pub const TIMESTAMP_CONTEXT: &str = "provenonce:beats:timestamp-receipt:v1";
/// HKDF info string for the work-proof receipt key.
pub const WORK_PROOF_CONTEXT: &str = "provenonce:beats:work-proof:v1";

/// A receipt signing subkey with its published context.
pub struct ReceiptKey {
    key: SigningKey,
    pub context: &'static str,
}

impl ReceiptKey {
    /// Sign the canonical JSON of `payload`; hex signature.
    pub fn sign(&self, payload: &Value) -> String {
        let message = canonical_json(payload);
        hex::encode(self.key.sign(message.as_bytes()).to_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.key.verifying_key().to_bytes())
    }

    pub fn public_key_base58(&self) -> String {
        bs58::encode(self.key.verifying_key().to_bytes()).into_string()
    }
}

/// Verify a receipt signature the way a third party would: canonical
/// JSON of the payload (minus `signature`), hex key, hex signature.
pub fn verify_receipt(public_key_hex: &str, payload: &Value, signature_hex: &str) -> bool {
    let key_bytes: [u8; 32] = match hex::decode(public_key_hex) {
        Ok(b) => match b.try_into() {
            Ok(arr) => arr,
            Err(_) => return false,
        },
        Err(_) => return false,
    };
    let verifying_key = match VerifyingKey::from_bytes(&key_bytes) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let sig_bytes: [u8; 64] = match hex::decode(signature_hex) {
        Ok(b) => match b.try_into() {
            Ok(arr) => arr,
            Err(_) => return false,
        },
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(&sig_bytes);
    let message = canonical_json(payload);
    verifying_key.verify(message.as_bytes(), &signature).is_ok()
}

/// Process-wide key material: the ledger writer key plus the derived
/// receipt subkeys. Immutable after construction.
pub struct Keychain {
    pub writer: SigningKey,
    /// Writer public key, base58 — the ledger address anchors are read from.
    pub writer_address: String,
    pub timestamp: ReceiptKey,
    pub work_proof: ReceiptKey,
}

impl Keychain {
    /// Build the key hierarchy from the base58 secret in
    /// `BEATS_ANCHOR_KEYPAIR`. Accepts the standard 64-byte export
    /// (seed || public key) or a bare 32-byte seed.
    pub fn from_base58_secret(secret: &str) -> Result<Self> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| BeatsError::Signer(format!("keypair is not base58: {}", e)))?;
        let seed: [u8; 32] = match bytes.len() {
            32 | 64 => bytes[..32]
                .try_into()
                .map_err(|_| BeatsError::Signer("seed slice conversion failed".into()))?,
            n => {
                return Err(BeatsError::Signer(format!(
                    "keypair must decode to 32 or 64 bytes, got {}",
                    n
                )))
            }
        };
        Ok(Self::from_master_seed(&seed))
    }

    /// Derive the hierarchy from a 32-byte master seed.
    pub fn from_master_seed(seed: &[u8; 32]) -> Self {
        let writer = SigningKey::from_bytes(seed);
        let writer_address = bs58::encode(writer.verifying_key().to_bytes()).into_string();
        Keychain {
            writer,
            writer_address,
            timestamp: ReceiptKey {
                key: derive_subkey(seed, TIMESTAMP_CONTEXT),
                context: TIMESTAMP_CONTEXT,
            },
            work_proof: ReceiptKey {
                key: derive_subkey(seed, WORK_PROOF_CONTEXT),
                context: WORK_PROOF_CONTEXT,
            },
        }
    }
}

fn derive_subkey(seed: &[u8; 32], info: &str) -> SigningKey {
    let hk = Hkdf::<Sha256>::new(None, seed);
    let mut okm = [0u8; 32];
    // 32 bytes is far under the HKDF output bound; expand cannot fail here
    hk.expand(info.as_bytes(), &mut okm)
        .expect("HKDF expand for 32-byte subkey");
    SigningKey::from_bytes(&okm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_keychain() -> Keychain {
        Keychain::from_master_seed(&[11u8; 32])
    }

    #[test]
    fn test_subkeys_are_separated() {
        let keys = test_keychain();
        assert_ne!(
            keys.timestamp.public_key_hex(),
            keys.work_proof.public_key_hex(),
            "timestamp and work-proof keys must differ"
        );
        assert_ne!(
            keys.timestamp.public_key_hex(),
            hex::encode(keys.writer.verifying_key().to_bytes()),
            "receipt keys must not equal the writer key"
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = Keychain::from_master_seed(&[11u8; 32]);
        let b = Keychain::from_master_seed(&[11u8; 32]);
        assert_eq!(a.timestamp.public_key_hex(), b.timestamp.public_key_hex());
        assert_eq!(a.writer_address, b.writer_address);
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let keys = test_keychain();
        let payload = json!({
            "type": "timestamp",
            "hash": "a".repeat(64),
            "anchor_index": 5,
            "anchor_hash": "b".repeat(64),
            "utc": 1_700_000_000_000i64,
            "tx_signature": "FAKE1",
        });
        let signature = keys.timestamp.sign(&payload);
        assert!(verify_receipt(&keys.timestamp.public_key_hex(), &payload, &signature));
    }

    #[test]
    fn test_verify_rejects_payload_tamper() {
        let keys = test_keychain();
        let payload = json!({"type": "timestamp", "hash": "a".repeat(64), "utc": 1i64});
        let signature = keys.timestamp.sign(&payload);

        let mut tampered = payload.clone();
        tampered["utc"] = json!(2i64);
        assert!(!verify_receipt(&keys.timestamp.public_key_hex(), &tampered, &signature));

        let mut wrong_hash = payload.clone();
        wrong_hash["hash"] = json!("b".repeat(64));
        assert!(!verify_receipt(&keys.timestamp.public_key_hex(), &wrong_hash, &signature));
    }

    #[test]
    fn test_verify_rejects_cross_context_signature() {
        let keys = test_keychain();
        let payload = json!({"type": "work_proof", "beats_computed": 10});
        let signature = keys.work_proof.sign(&payload);
        assert!(verify_receipt(&keys.work_proof.public_key_hex(), &payload, &signature));
        assert!(
            !verify_receipt(&keys.timestamp.public_key_hex(), &payload, &signature),
            "a work-proof signature must not verify under the timestamp key"
        );
    }

    #[test]
    fn test_signature_ignores_field_order() {
        let keys = test_keychain();
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(keys.timestamp.sign(&a), keys.timestamp.sign(&b));
    }

    #[test]
    fn test_keychain_from_base58() {
        let seed = [5u8; 32];
        let expected = Keychain::from_master_seed(&seed);

        // 32-byte form
        let b58_seed = bs58::encode(seed).into_string();
        let from_seed = Keychain::from_base58_secret(&b58_seed).expect("32-byte secret");
        assert_eq!(from_seed.writer_address, expected.writer_address);

        // 64-byte form (seed || public key)
        let mut full = Vec::with_capacity(64);
        full.extend_from_slice(&seed);
        full.extend_from_slice(&expected.writer.verifying_key().to_bytes());
        let b58_full = bs58::encode(full).into_string();
        let from_full = Keychain::from_base58_secret(&b58_full).expect("64-byte secret");
        assert_eq!(from_full.writer_address, expected.writer_address);

        assert!(Keychain::from_base58_secret("tooshort").is_err());
        assert!(Keychain::from_base58_secret("!!!").is_err());
    }
}
