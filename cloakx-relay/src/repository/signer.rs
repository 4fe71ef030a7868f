//! Operator key
//!
//! Ed25519 key the relay signs `complete_job` transactions with. Signatures
//! follow the ledger's scheme: Blake2b-256 over the transaction intent
//! message, serialised as `flag || signature || public key`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signer, SigningKey};

use super::ledger::LedgerError;

type Blake2b256 = Blake2b<U32>;

/// Signature scheme flag for ed25519
const ED25519_FLAG: u8 = 0x00;

/// Intent prefix for transaction data: scope, version, app id
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Operator signing key
pub struct OperatorKey {
    signing_key: SigningKey,
}

impl OperatorKey {
    /// Parses a base64 secret key, either the raw 32 bytes or 33 bytes
    /// prefixed with the ed25519 scheme flag
    pub fn from_base64(encoded: &str) -> Result<Self, LedgerError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| LedgerError::InvalidKey(e.to_string()))?;

        let secret: [u8; 32] = match bytes.as_slice() {
            [ED25519_FLAG, rest @ ..] if rest.len() == 32 => rest
                .try_into()
                .map_err(|_| LedgerError::InvalidKey("bad key length".to_string()))?,
            raw if raw.len() == 32 => raw
                .try_into()
                .map_err(|_| LedgerError::InvalidKey("bad key length".to_string()))?,
            other => {
                return Err(LedgerError::InvalidKey(format!(
                    "expected 32 or 33 bytes, got {}",
                    other.len()
                )));
            }
        };

        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    /// Account address derived from the public key
    pub fn address(&self) -> String {
        let mut hasher = Blake2b256::new();
        hasher.update([ED25519_FLAG]);
        hasher.update(self.signing_key.verifying_key().as_bytes());
        format!("0x{}", hex::encode(hasher.finalize()))
    }

    /// Signs base64 transaction bytes, returning the base64 serialised signature
    pub fn sign_transaction(&self, tx_bytes_b64: &str) -> Result<String, LedgerError> {
        let tx_bytes = BASE64
            .decode(tx_bytes_b64)
            .map_err(|e| LedgerError::Decode(format!("transaction bytes: {}", e)))?;

        let mut hasher = Blake2b256::new();
        hasher.update(TRANSACTION_INTENT);
        hasher.update(&tx_bytes);
        let digest = hasher.finalize();

        let signature = self.signing_key.sign(digest.as_slice());

        let mut serialized = Vec::with_capacity(1 + 64 + 32);
        serialized.push(ED25519_FLAG);
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(self.signing_key.verifying_key().as_bytes());

        Ok(BASE64.encode(serialized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    const SECRET: [u8; 32] = [7u8; 32];

    #[test]
    fn test_accepts_raw_and_flagged_keys() {
        let raw = OperatorKey::from_base64(&BASE64.encode(SECRET)).unwrap();

        let mut flagged = vec![ED25519_FLAG];
        flagged.extend_from_slice(&SECRET);
        let flagged = OperatorKey::from_base64(&BASE64.encode(flagged)).unwrap();

        assert_eq!(raw.address(), flagged.address());
        assert_eq!(raw.address().len(), 66);
        assert!(OperatorKey::from_base64(&BASE64.encode([1u8; 16])).is_err());
        assert!(OperatorKey::from_base64("%%%").is_err());
    }

    #[test]
    fn test_signature_covers_intent_digest() {
        let key = OperatorKey::from_base64(&BASE64.encode(SECRET)).unwrap();
        let tx_bytes = vec![1u8, 2, 3, 4];

        let serialized = BASE64
            .decode(key.sign_transaction(&BASE64.encode(&tx_bytes)).unwrap())
            .unwrap();
        assert_eq!(serialized.len(), 97);
        assert_eq!(serialized[0], ED25519_FLAG);

        let signature = Signature::from_slice(&serialized[1..65]).unwrap();
        let public_key = key.signing_key.verifying_key();
        assert_eq!(&serialized[65..], public_key.as_bytes());

        let mut hasher = Blake2b256::new();
        hasher.update(TRANSACTION_INTENT);
        hasher.update(&tx_bytes);
        assert!(public_key.verify(hasher.finalize().as_slice(), &signature).is_ok());
    }
}
