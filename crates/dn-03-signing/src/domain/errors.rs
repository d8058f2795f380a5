//! # Signing Errors
//!
//! Every variant is fatal to the signing attempt that produced it; callers
//! do not retry.

use shared_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur while signing or checking a signature.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SigningError {
    /// The key handle does not resolve to a loaded key
    #[error("Key unavailable: {0}")]
    KeyUnavailable(String),

    /// S is above half the curve order
    #[error("Non-canonical signature (high S value)")]
    NonCanonical,

    /// Wrong length, or R/S outside [1, n-1]
    #[error("Invalid signature format")]
    InvalidFormat,

    /// Secret key bytes are not a valid secp256k1 scalar
    #[error("Invalid secret key")]
    InvalidKey,

    /// v must be 0, 1, 27 or 28
    #[error("Invalid recovery ID: {0}")]
    InvalidRecoveryId(u8),

    /// Public key recovery failed
    #[error("Failed to recover public key")]
    RecoveryFailed,

    /// Signature does not verify against the expected public key
    #[error("Signature verification failed")]
    VerificationFailed,

    /// The underlying signer failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

impl SigningError {
    /// Shared error classification, where one applies.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SigningError::KeyUnavailable(_) => Some(ErrorKind::KeyUnavailable),
            _ => None,
        }
    }
}
