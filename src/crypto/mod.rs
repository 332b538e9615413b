//! Cryptographic primitives for the custody signer
//!
//! This module provides verification-only operations:
//! - Curve abstractions for secp256k1 and secp256r1 (P-256)
//! - Tail-anchored signature checks against sets of trusted keys
//! - Structural and cryptographic checks of signer-returned pairs

pub mod curves;
pub mod signature;

pub use curves::{
    compress_public_key, parse_public_key, CurveError, CurveType, EllipticCurve, Secp256k1Curve,
    Secp256r1Curve,
};
pub use signature::{normalize_signature, verify_public_key_signature_pair, verify_signature};
