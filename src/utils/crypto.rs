//! Hashing and checksum helpers
//!
//! Pure byte-in/byte-out functions shared by the chain encoders,
//! provenance checks and the webhook HMAC contract.

use bitcoin::hashes::{sha256d, Hash};
use blake2::digest::consts::{U28, U32};
use blake2::Blake2b;
use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;
use tiny_keccak::{Hasher, Keccak};

use crate::error::{CustodyError, CustodyResult};

type HmacSha256 = Hmac<Sha256>;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Bitcoin double SHA-256
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256d::Hash::hash(data).to_byte_array()
}

pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// RIPEMD-160(SHA-256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// Keccak256 hash (Ethereum)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// BLAKE2b with a 224-bit output (Cardano key hashes)
pub fn blake2b_224(data: &[u8]) -> [u8; 28] {
    let mut hasher = Blake2b::<U28>::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// BLAKE2b with a 256-bit output (Cardano transaction bodies)
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First 32 bytes of SHA-512 (XRP Ledger signing hash)
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    let full = Sha512::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&full[..32]);
    out
}

/// Decode Base58Check text with the given alphabet, returning the payload
/// without its 4-byte checksum.
pub fn base58check_decode(encoded: &str, alphabet: &bs58::Alphabet) -> CustodyResult<Vec<u8>> {
    let decoded = bs58::decode(encoded).with_alphabet(alphabet).into_vec()?;
    if decoded.len() < 5 {
        return Err(CustodyError::invalid_address(format!(
            "Base58Check payload too short: {} bytes",
            decoded.len()
        )));
    }

    let (payload, checksum) = decoded.split_at(decoded.len() - 4);
    let expected = double_sha256(payload);
    if expected[..4].ct_eq(checksum).unwrap_u8() != 1 {
        return Err(CustodyError::invalid_address("Base58Check checksum mismatch"));
    }

    Ok(payload.to_vec())
}

/// Check a webhook body against the hex HMAC-SHA256 header value.
///
/// The comparison is constant time. Transports call this before handing a
/// payload to the orchestrator.
pub fn verify_webhook_hmac(secret: &[u8], body: &[u8], signature_hex: &str) -> bool {
    let provided = match hex::decode(signature_hex.trim().trim_start_matches("0x")) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    expected.as_slice().ct_eq(&provided).into()
}
