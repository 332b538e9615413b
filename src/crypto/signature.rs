//! Signature checks against sets of trusted keys
//!
//! Signatures are tail-anchored: `s` is always the last 32 bytes and `r`
//! is whatever precedes it, so encoders that strip a leading zero from `r`
//! still verify.

use super::curves::{verify_prehash, CurveType};
use crate::error::{CustodyError, CustodyResult};
use crate::log_debug;
use crate::types::PublicKeySignaturePair;

pub const SIGNATURE_LEN: usize = 64;
pub const UNCOMPRESSED_KEY_LEN: usize = 65;

/// Expand a possibly short r‖s signature to 64 bytes
pub fn normalize_signature(signature: &[u8]) -> CustodyResult<[u8; 64]> {
    if signature.len() <= 32 || signature.len() > SIGNATURE_LEN {
        return Err(CustodyError::malformed_signature(format!(
            "signature must be 33 to 64 bytes, got {}",
            signature.len()
        )));
    }

    let (r, s) = signature.split_at(signature.len() - 32);
    let mut out = [0u8; 64];
    out[32 - r.len()..32].copy_from_slice(r);
    out[32..].copy_from_slice(s);
    Ok(out)
}

/// True when the signature validates against any of the keys.
///
/// Keys that fail to parse count as non-matching.
pub fn verify_signature(
    digest: &[u8; 32],
    signature: &[u8],
    public_keys: &[Vec<u8>],
    curve: CurveType,
) -> CustodyResult<bool> {
    let normalized = normalize_signature(signature)?;

    for key in public_keys {
        match verify_prehash(curve, key, digest, &normalized) {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => {
                log_debug!("signature", "Skipping key during verification", curve = curve, error = e);
            }
        }
    }
    Ok(false)
}

/// Check a signer-returned pair: shape first, then cryptography
pub fn verify_public_key_signature_pair(
    pair: &PublicKeySignaturePair,
    digest: &[u8; 32],
    curve: CurveType,
) -> CustodyResult<()> {
    if pair.public_key.len() != UNCOMPRESSED_KEY_LEN || pair.public_key[0] != 0x04 {
        return Err(CustodyError::malformed_signature(format!(
            "public key must be {} bytes starting with 0x04, got {} bytes",
            UNCOMPRESSED_KEY_LEN,
            pair.public_key.len()
        )));
    }
    if pair.signature.len() != SIGNATURE_LEN {
        return Err(CustodyError::malformed_signature(format!(
            "signature must be {} bytes, got {}",
            SIGNATURE_LEN,
            pair.signature.len()
        )));
    }

    if verify_signature(digest, &pair.signature, std::slice::from_ref(&pair.public_key), curve)? {
        Ok(())
    } else {
        Err(CustodyError::signature_invalid(format!(
            "{} signature does not verify for the returned public key",
            curve
        ))
        .with_details(format!("digest={}", hex::encode(digest))))
    }
}
