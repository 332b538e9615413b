//! Multi-Curve Signature Verification
//!
//! The custody protocol uses two curves:
//!
//! - `secp256k1`: Bitcoin inputs, Ethereum transactions and messages
//! - `secp256r1` (P-256/NIST): custody provenance keys and HSM delegate signers
//!
//! Both implement [`EllipticCurve`]; the free functions here dispatch on
//! [`CurveType`] so request variants can carry the curve as data.

pub mod secp256k1;
pub mod secp256r1;
pub mod traits;

pub use secp256k1::Secp256k1Curve;
pub use secp256r1::Secp256r1Curve;
pub use traits::*;

use serde::{Deserialize, Serialize};

// MARK: - Curve Type Enum

/// Supported elliptic curve types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveType {
    #[serde(rename = "secp256k1")]
    Secp256k1,
    #[serde(rename = "p256", alias = "secp256r1")]
    Secp256r1,
}

impl CurveType {
    /// Get the curve name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Self::Secp256k1 => "secp256k1",
            Self::Secp256r1 => "p256",
        }
    }

    /// Parse curve type from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "secp256k1" => Some(Self::Secp256k1),
            "secp256r1" | "p256" | "prime256v1" => Some(Self::Secp256r1),
            _ => None,
        }
    }
}

impl std::fmt::Display for CurveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// MARK: - Curve Errors

/// Errors that can occur during curve operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CurveError {
    InvalidPublicKey(String),
    InvalidSignature(String),
}

impl std::fmt::Display for CurveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPublicKey(s) => write!(f, "Invalid public key: {}", s),
            Self::InvalidSignature(s) => write!(f, "Invalid signature: {}", s),
        }
    }
}

impl std::error::Error for CurveError {}

impl From<CurveError> for crate::error::CustodyError {
    fn from(e: CurveError) -> Self {
        match e {
            CurveError::InvalidPublicKey(_) => crate::error::CustodyError::invalid_input(e.to_string()),
            CurveError::InvalidSignature(_) => {
                crate::error::CustodyError::malformed_signature(e.to_string())
            }
        }
    }
}

// MARK: - Unified Interface

/// Uncompressed 65-byte form of a public key on the given curve
pub fn parse_public_key(curve: CurveType, public_key: &[u8]) -> Result<[u8; 65], CurveError> {
    match curve {
        CurveType::Secp256k1 => Secp256k1Curve::parse_public_key(public_key),
        CurveType::Secp256r1 => Secp256r1Curve::parse_public_key(public_key),
    }
}

/// Compressed 33-byte form of a public key on the given curve
pub fn compress_public_key(curve: CurveType, public_key: &[u8]) -> Result<[u8; 33], CurveError> {
    match curve {
        CurveType::Secp256k1 => Secp256k1Curve::compress_public_key(public_key),
        CurveType::Secp256r1 => Secp256r1Curve::compress_public_key(public_key),
    }
}

/// Verify a fixed-width signature over a prehashed digest
pub fn verify_prehash(
    curve: CurveType,
    public_key: &[u8],
    digest: &[u8; 32],
    signature: &[u8; 64],
) -> Result<bool, CurveError> {
    match curve {
        CurveType::Secp256k1 => Secp256k1Curve::verify_prehash(public_key, digest, signature),
        CurveType::Secp256r1 => Secp256r1Curve::verify_prehash(public_key, digest, signature),
    }
}

// MARK: - Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_type_names() {
        assert_eq!(CurveType::Secp256k1.name(), "secp256k1");
        assert_eq!(CurveType::Secp256r1.to_string(), "p256");
        assert_eq!(Secp256r1Curve::CURVE, CurveType::Secp256r1);
    }

    #[test]
    fn test_curve_type_from_str() {
        assert_eq!(CurveType::from_str("secp256k1"), Some(CurveType::Secp256k1));
        assert_eq!(CurveType::from_str("P256"), Some(CurveType::Secp256r1));
        assert_eq!(CurveType::from_str("ed25519"), None);
    }

    #[test]
    fn test_curve_type_serde() {
        assert_eq!(serde_json::to_string(&CurveType::Secp256r1).unwrap(), "\"p256\"");
        let parsed: CurveType = serde_json::from_str("\"secp256r1\"").unwrap();
        assert_eq!(parsed, CurveType::Secp256r1);
    }
}
