//! Secp256r1 (P-256/NIST) Curve Implementation
//!
//! Used by: custody-service provenance keys and the HSM-backed delegate
//! signers for Ripple, Cardano, Solana and policy requests.

use super::{CurveError, CurveType, EllipticCurve};
use p256::{
    ecdsa::{signature::hazmat::PrehashVerifier, Signature, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey,
};

/// Secp256r1 (P-256) curve implementation
pub struct Secp256r1Curve;

impl Secp256r1Curve {
    fn parse_p256_public_key(public_key: &[u8]) -> Result<PublicKey, CurveError> {
        match public_key.len() {
            33 | 65 => PublicKey::from_sec1_bytes(public_key)
                .map_err(|e| CurveError::InvalidPublicKey(format!("Invalid P-256 point: {:?}", e))),
            _ => Err(CurveError::InvalidPublicKey(format!(
                "Public key must be 33 or 65 bytes, got {}",
                public_key.len()
            ))),
        }
    }
}

impl EllipticCurve for Secp256r1Curve {
    const CURVE: CurveType = CurveType::Secp256r1;

    fn parse_public_key(public_key: &[u8]) -> Result<[u8; 65], CurveError> {
        let pk = Self::parse_p256_public_key(public_key)?;
        let encoded = pk.to_encoded_point(false);

        let mut out = [0u8; 65];
        out.copy_from_slice(encoded.as_bytes());
        Ok(out)
    }

    fn compress_public_key(public_key: &[u8]) -> Result<[u8; 33], CurveError> {
        let pk = Self::parse_p256_public_key(public_key)?;
        let encoded = pk.to_encoded_point(true);

        let mut out = [0u8; 33];
        out.copy_from_slice(encoded.as_bytes());
        Ok(out)
    }

    fn verify_prehash(
        public_key: &[u8],
        digest: &[u8; 32],
        signature: &[u8; 64],
    ) -> Result<bool, CurveError> {
        let verifying_key = VerifyingKey::from(Self::parse_p256_public_key(public_key)?);

        let sig = Signature::from_slice(signature)
            .map_err(|e| CurveError::InvalidSignature(format!("Invalid signature: {:?}", e)))?;

        Ok(verifying_key.verify_prehash(digest, &sig).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::{signature::hazmat::PrehashSigner, SigningKey};

    const CUSTODY_PUBLIC_KEY: &str = "04d65a93977caa3d1b081852ff57a79e465f1660577304baead505dd3a48589cf3\
                                      50185e895372df6221ea3a137557e473fddb6755f05bd507c3c533fce9c91285";

    #[test]
    fn test_p256_key_from_secret_matches_fixture() {
        let signing_key = SigningKey::from_slice(&[0x22; 32]).unwrap();
        let encoded = signing_key.verifying_key().to_encoded_point(false);
        assert_eq!(hex::encode(encoded.as_bytes()), CUSTODY_PUBLIC_KEY);
    }

    #[test]
    fn test_p256_verify_prehash() {
        let signing_key = SigningKey::from_slice(&[0x22; 32]).unwrap();
        let digest = [0x5au8; 32];
        let sig: Signature = signing_key.sign_prehash(&digest).unwrap();
        let raw: [u8; 64] = sig.to_bytes().as_slice().try_into().unwrap();

        let pk = hex::decode(CUSTODY_PUBLIC_KEY).unwrap();
        assert!(Secp256r1Curve::verify_prehash(&pk, &digest, &raw).unwrap());
        assert!(!Secp256r1Curve::verify_prehash(&pk, &[0x5b; 32], &raw).unwrap());

        let compressed = Secp256r1Curve::compress_public_key(&pk).unwrap();
        assert!(Secp256r1Curve::verify_prehash(&compressed, &digest, &raw).unwrap());
    }

    #[test]
    fn test_p256_rejects_bad_key() {
        let mut pk = hex::decode(CUSTODY_PUBLIC_KEY).unwrap();
        pk[64] ^= 0x01;
        assert!(Secp256r1Curve::parse_public_key(&pk).is_err());
        assert!(Secp256r1Curve::parse_public_key(&pk[..64]).is_err());
    }
}
