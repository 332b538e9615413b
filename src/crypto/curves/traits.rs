//! Elliptic Curve Traits
//!
//! Defines the common interface for the verification curves.

use super::{CurveError, CurveType};

/// Verification-side operations shared by secp256k1 and P-256
pub trait EllipticCurve {
    const CURVE: CurveType;

    /// Parse a SEC1 public key and return its uncompressed 65-byte form
    fn parse_public_key(public_key: &[u8]) -> Result<[u8; 65], CurveError>;

    /// Compressed 33-byte SEC1 form
    fn compress_public_key(public_key: &[u8]) -> Result<[u8; 33], CurveError>;

    /// Verify an r‖s signature over a 32-byte digest without hashing it again
    fn verify_prehash(
        public_key: &[u8],
        digest: &[u8; 32],
        signature: &[u8; 64],
    ) -> Result<bool, CurveError>;
}
