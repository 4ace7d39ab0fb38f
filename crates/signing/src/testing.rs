//! Deterministic signing keys for tests in dependent crates

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};

/// A fixed Ed25519 key pair that produces signify-encoded output
pub struct TestKeypair {
    key: SigningKey,
    key_id: [u8; 8],
}

impl TestKeypair {
    /// Derive a key pair from a single seed byte
    #[must_use]
    pub fn from_seed(seed: u8) -> Self {
        Self {
            key: SigningKey::from_bytes(&[seed; 32]),
            key_id: [seed; 8],
        }
    }

    /// Base64 public key suitable for `ContentVerifier::from_base64`
    #[must_use]
    pub fn public_key_base64(&self) -> String {
        let mut raw = b"Ed".to_vec();
        raw.extend_from_slice(&self.key_id);
        raw.extend_from_slice(self.key.verifying_key().as_bytes());
        STANDARD.encode(raw)
    }

    /// Single signature line over `message`
    #[must_use]
    pub fn sign_line(&self, message: &[u8]) -> String {
        let mut raw = b"Ed".to_vec();
        raw.extend_from_slice(&self.key_id);
        raw.extend_from_slice(&self.key.sign(message).to_bytes());
        STANDARD.encode(raw)
    }

    /// Complete signature file, comment line included
    #[must_use]
    pub fn signature_file(&self, message: &[u8]) -> String {
        format!(
            "untrusted comment: verify with test.pub\n{}\n",
            self.sign_line(message)
        )
    }
}
