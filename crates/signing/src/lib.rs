#![deny(clippy::pedantic, unsafe_code)]

//! Detached signature verification for repository metadata
//!
//! Keys and signatures use the signify encoding: base64 of a two byte
//! algorithm tag, an eight byte key id and the raw key or signature bytes.
//! A signature file may start with an `untrusted comment:` line which is
//! never part of what gets verified.

use appset_errors::SigningError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "test-utils")]
pub mod testing;

const UNTRUSTED_COMMENT_PREFIX: &str = "untrusted comment";
const KEY_ID_LEN: usize = 8;
const PUBLIC_KEY_LEN: usize = 2 + KEY_ID_LEN + 32;
const SIGNATURE_LEN: usize = 2 + KEY_ID_LEN + 64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Ed25519,
}

impl Algorithm {
    fn from_tag(tag: [u8; 2]) -> Option<Self> {
        match &tag {
            b"Ed" => Some(Self::Ed25519),
            _ => None,
        }
    }
}

/// Eight byte identifier tying a signature to the key that made it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId([u8; KEY_ID_LEN]);

impl KeyId {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// A trusted Ed25519 public key
#[derive(Debug, Clone)]
pub struct PublicKey {
    key_id: KeyId,
    key: VerifyingKey,
}

impl PublicKey {
    /// Decode a base64 signify public key
    ///
    /// # Errors
    /// Returns an error if the encoding, length, algorithm tag or curve point is invalid.
    pub fn from_base64(encoded: &str) -> Result<Self, SigningError> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SigningError::InvalidPublicKey(format!("bad base64: {e}")))?;
        if raw.len() != PUBLIC_KEY_LEN {
            return Err(SigningError::InvalidPublicKey(format!(
                "expected {PUBLIC_KEY_LEN} bytes, got {}",
                raw.len()
            )));
        }

        let (tag, key_id, key_bytes) = split_encoded(&raw);
        if Algorithm::from_tag(tag).is_none() {
            return Err(SigningError::InvalidPublicKey(format!(
                "unsupported algorithm tag {tag:?}"
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(key_bytes);
        let key = VerifyingKey::from_bytes(&key)
            .map_err(|e| SigningError::InvalidPublicKey(e.to_string()))?;

        Ok(Self { key_id, key })
    }

    #[must_use]
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }
}

/// A decoded detached signature
#[derive(Debug, Clone)]
pub struct Signature {
    key_id: KeyId,
    signature: ed25519_dalek::Signature,
}

impl Signature {
    /// Decode a single base64 signature line
    ///
    /// # Errors
    /// Returns an error if the encoding, length or algorithm tag is invalid.
    pub fn decode(line: &str) -> Result<Self, SigningError> {
        let raw = STANDARD
            .decode(line.trim())
            .map_err(|e| SigningError::InvalidSignatureFormat(format!("bad base64: {e}")))?;
        if raw.len() != SIGNATURE_LEN {
            return Err(SigningError::InvalidSignatureFormat(format!(
                "expected {SIGNATURE_LEN} bytes, got {}",
                raw.len()
            )));
        }

        let (tag, key_id, sig_bytes) = split_encoded(&raw);
        if Algorithm::from_tag(tag).is_none() {
            return Err(SigningError::InvalidSignatureFormat(format!(
                "unsupported algorithm tag {tag:?}"
            )));
        }

        let mut sig = [0u8; 64];
        sig.copy_from_slice(sig_bytes);
        Ok(Self {
            key_id,
            signature: ed25519_dalek::Signature::from_bytes(&sig),
        })
    }

    #[must_use]
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }
}

fn split_encoded(raw: &[u8]) -> ([u8; 2], KeyId, &[u8]) {
    let mut tag = [0u8; 2];
    tag.copy_from_slice(&raw[..2]);
    let mut key_id = [0u8; KEY_ID_LEN];
    key_id.copy_from_slice(&raw[2..2 + KEY_ID_LEN]);
    (tag, KeyId(key_id), &raw[2 + KEY_ID_LEN..])
}

/// Return the first line of a signature file that is not a comment.
///
/// # Errors
/// Returns `MissingSignature` if only comments or blank lines are present.
pub fn extract_signature_line(contents: &str) -> Result<&str, SigningError> {
    contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with(UNTRUSTED_COMMENT_PREFIX))
        .ok_or(SigningError::MissingSignature)
}

/// Verifies detached signatures against a single configured key
#[derive(Debug, Clone)]
pub struct ContentVerifier {
    public_key: PublicKey,
}

impl ContentVerifier {
    #[must_use]
    pub fn new(public_key: PublicKey) -> Self {
        Self { public_key }
    }

    /// Build a verifier from a base64 signify public key
    ///
    /// # Errors
    /// Returns an error if the key cannot be decoded.
    pub fn from_base64(encoded: &str) -> Result<Self, SigningError> {
        PublicKey::from_base64(encoded).map(Self::new)
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Check `message` against a signature line, explaining any failure.
    ///
    /// # Errors
    /// Returns an error if the signature is malformed, was made by another
    /// key, or does not match the message.
    pub fn check(&self, message: &[u8], signature_line: &str) -> Result<(), SigningError> {
        let signature = Signature::decode(signature_line)?;

        if signature.key_id != self.public_key.key_id {
            return Err(SigningError::KeyIdMismatch {
                expected: self.public_key.key_id.to_string(),
                actual: signature.key_id.to_string(),
            });
        }

        self.public_key
            .key
            .verify_strict(message, &signature.signature)
            .map_err(|e| SigningError::VerificationFailed {
                reason: e.to_string(),
            })
    }

    /// Whether `signature_line` is a valid signature of `message`.
    ///
    /// Malformed input is reported as `false`, never as a panic.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature_line: &str) -> bool {
        match self.check(message, signature_line) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "signature rejected");
                false
            }
        }
    }
}
