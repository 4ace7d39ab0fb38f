//! Signing error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SigningError {
    #[error("signature verification failed: {reason}")]
    VerificationFailed { reason: String },

    #[error("signature was made with key {actual}, expected {expected}")]
    KeyIdMismatch { expected: String, actual: String },

    #[error("invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("invalid public key format: {0}")]
    InvalidPublicKey(String),

    #[error("signature file contains no signature line")]
    MissingSignature,
}

impl SigningError {
    #[must_use]
    pub fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::VerificationFailed { .. } => "signing.verification_failed",
            Self::KeyIdMismatch { .. } => "signing.key_id_mismatch",
            Self::InvalidSignatureFormat(_) => "signing.invalid_signature",
            Self::InvalidPublicKey(_) => "signing.invalid_public_key",
            Self::MissingSignature => "signing.missing_signature",
        };
        Some(code)
    }
}
