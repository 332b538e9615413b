//! secp256k1 Curve Implementation
//!
//! Used by: Bitcoin inputs, Ethereum transactions and messages.
//!
//! Signatures are normalized to low-S before verification, since signers
//! are free to return either form.

use super::{CurveError, CurveType, EllipticCurve};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1};

/// secp256k1 curve implementation
pub struct Secp256k1Curve;

impl EllipticCurve for Secp256k1Curve {
    const CURVE: CurveType = CurveType::Secp256k1;

    fn parse_public_key(public_key: &[u8]) -> Result<[u8; 65], CurveError> {
        let pk = PublicKey::from_slice(public_key)
            .map_err(|e| CurveError::InvalidPublicKey(e.to_string()))?;
        Ok(pk.serialize_uncompressed())
    }

    fn compress_public_key(public_key: &[u8]) -> Result<[u8; 33], CurveError> {
        let pk = PublicKey::from_slice(public_key)
            .map_err(|e| CurveError::InvalidPublicKey(e.to_string()))?;
        Ok(pk.serialize())
    }

    fn verify_prehash(
        public_key: &[u8],
        digest: &[u8; 32],
        signature: &[u8; 64],
    ) -> Result<bool, CurveError> {
        let secp = Secp256k1::verification_only();
        let pk = PublicKey::from_slice(public_key)
            .map_err(|e| CurveError::InvalidPublicKey(e.to_string()))?;

        let mut sig = Signature::from_compact(signature)
            .map_err(|e| CurveError::InvalidSignature(e.to_string()))?;
        sig.normalize_s();

        let msg = Message::from_digest(*digest);
        Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
    }
}
