//! # Canonical ECDSA (secp256k1)
//!
//! Low-S normalization and checks. A signature is canonical when
//! `1 <= r < n` and `1 <= s <= n/2`.
//!
//! ## Security Notes
//!
//! - **Malleability**: `(r, s)` and `(r, n - s)` both verify; only the low
//!   half is accepted, so equal inputs give byte-identical signatures
//! - **Constant-Time Comparisons**: scalar range checks use `subtle`
//! - **Recovery parity**: negating S negates the nonce point, so the y-parity
//!   bit of the recovery id flips with it

use super::entities::{Address, CanonicalSignature};
use super::errors::SigningError;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

/// secp256k1 curve order n
/// n = 0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141
const SECP256K1_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// floor(n / 2)
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

// =============================================================================
// CANONICAL FORM
// =============================================================================

/// Bring a k256 signature into canonical form.
///
/// If `s > n/2`, S becomes `n - s` and the recovery parity flips.
pub fn canonicalize(signature: &Signature, recovery_id: RecoveryId) -> CanonicalSignature {
    let sig_bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&sig_bytes[..32]);
    s.copy_from_slice(&sig_bytes[32..]);

    let mut recovery_id = recovery_id.to_byte();
    if !is_low_s(&s) {
        s = invert_s(&s);
        recovery_id ^= 1;
    }

    CanonicalSignature { r, s, recovery_id }
}

/// Whether `signature` is in canonical form.
pub fn is_canonical(signature: &CanonicalSignature) -> bool {
    ensure_canonical(signature).is_ok()
}

/// Reject encodings that are out of range or high-S.
pub fn ensure_canonical(signature: &CanonicalSignature) -> Result<(), SigningError> {
    if !is_valid_scalar(&signature.r) || !is_valid_scalar(&signature.s) {
        return Err(SigningError::InvalidFormat);
    }
    if !is_low_s(&signature.s) {
        return Err(SigningError::NonCanonical);
    }
    if RecoveryId::from_byte(signature.recovery_id).is_none() {
        return Err(SigningError::InvalidRecoveryId(signature.recovery_id));
    }
    Ok(())
}

/// Check that `signature` is canonical, verifies over `digest` under
/// `public_key`, and that its recovery id recovers that same key.
pub fn verify_canonical(
    digest: &[u8; 32],
    signature: &CanonicalSignature,
    public_key: &VerifyingKey,
) -> Result<(), SigningError> {
    ensure_canonical(signature)?;

    let sig = to_k256(signature)?;
    public_key
        .verify_prehash(digest, &sig)
        .map_err(|_| SigningError::VerificationFailed)?;

    let recovered = recover_public_key(digest, signature)?;
    if recovered != *public_key {
        return Err(SigningError::VerificationFailed);
    }

    Ok(())
}

/// Recover the signer's public key.
pub fn recover_public_key(
    digest: &[u8; 32],
    signature: &CanonicalSignature,
) -> Result<VerifyingKey, SigningError> {
    let recovery_id = RecoveryId::from_byte(signature.recovery_id)
        .ok_or(SigningError::InvalidRecoveryId(signature.recovery_id))?;
    let sig = to_k256(signature)?;

    VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|_| SigningError::RecoveryFailed)
}

fn to_k256(signature: &CanonicalSignature) -> Result<Signature, SigningError> {
    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&signature.r);
    sig_bytes[32..].copy_from_slice(&signature.s);

    let parsed = Signature::from_slice(&sig_bytes).map_err(|_| SigningError::InvalidFormat);
    sig_bytes.zeroize();
    parsed
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Keccak256 hash function.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Derive the Ethereum-style address of a public key.
pub fn address_from_pubkey(public_key: &VerifyingKey) -> Address {
    let pubkey_bytes = public_key.to_encoded_point(false);
    let pubkey_slice = pubkey_bytes.as_bytes();

    // Skip the 0x04 prefix
    let hash = keccak256(&pubkey_slice[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// `s <= n/2`, compared in constant time.
fn is_low_s(s: &[u8; 32]) -> bool {
    let mut less = Choice::from(0u8);
    let mut greater = Choice::from(0u8);

    for i in 0..32 {
        let s_byte = s[i];
        let h_byte = SECP256K1_HALF_ORDER[i];

        let not_decided = !(less | greater);
        let byte_less = Choice::from((s_byte < h_byte) as u8);
        let byte_greater = Choice::from((s_byte > h_byte) as u8);

        less |= not_decided & byte_less;
        greater |= not_decided & byte_greater;
    }

    (!greater).into()
}

/// `1 <= scalar < n`, compared in constant time.
fn is_valid_scalar(scalar: &[u8; 32]) -> bool {
    let mut is_zero = Choice::from(1u8);
    for &byte in scalar {
        is_zero &= byte.ct_eq(&0u8);
    }

    let mut less = Choice::from(0u8);
    let mut greater = Choice::from(0u8);

    for i in 0..32 {
        let s_byte = scalar[i];
        let n_byte = SECP256K1_ORDER[i];

        let not_decided = !(less | greater);
        let byte_less = Choice::from((s_byte < n_byte) as u8);
        let byte_greater = Choice::from((s_byte > n_byte) as u8);

        less |= not_decided & byte_less;
        greater |= not_decided & byte_greater;
    }

    (!is_zero & less).into()
}

/// Parse a recovery id from a wire `v` value (0, 1, 27 or 28).
pub(crate) fn parse_recovery_id(v: u8) -> Result<RecoveryId, SigningError> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(SigningError::InvalidRecoveryId(v)),
    };

    RecoveryId::try_from(id).map_err(|_| SigningError::InvalidRecoveryId(v))
}

/// `n - s`
pub fn invert_s(s: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: i32 = 0;

    for i in (0..32).rev() {
        let diff = (SECP256K1_ORDER[i] as i32) - (s[i] as i32) - borrow;
        if diff < 0 {
            result[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            result[i] = diff as u8;
            borrow = 0;
        }
    }

    result
}
