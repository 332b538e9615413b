//! Provenance Verification
//!
//! The custody service signs a DER statement for every public key it issues
//! and for every recoverer schedule it installs. Both are checked here by
//! DER-encoding the claimed values, hashing with SHA-256 and verifying the
//! service's P-256 signature against the trusted keys.

pub mod address;

pub use address::{
    change_address, verify_change_output, verify_created_address, CreatedAddressPayload,
};

use crate::codec::{encode_recoverer_schedules, EcdsaSignature, ProvenanceRecord, Schedule};
use crate::crypto::signature::SIGNATURE_LEN;
use crate::crypto::{verify_signature, CurveType};
use crate::error::{CustodyError, CustodyResult, ErrorCode};
use crate::serde_bytes::hex_bytes_option;
use crate::utils::sha256;
use crate::{log_debug, log_warn};
use serde::{Deserialize, Serialize};

/// Provenance attached to a Bitcoin input or change output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyProvenanceData {
    /// Present on outputs; inputs carry their key alongside
    #[serde(default, with = "hex_bytes_option", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<Vec<u8>>,
    pub path: Vec<u32>,
    #[serde(default, with = "hex_bytes_option")]
    pub signature: Option<Vec<u8>>,
}

/// Verify that the custody service issued `public_key` for `wallet_id` at `path`.
///
/// A missing signature is reported as `ProvenanceMissing`; a signature that
/// does not verify against any trusted key as `ProvenanceInvalid`.
pub fn verify_provenance(
    wallet_id: &str,
    path: &[u32],
    public_key: &[u8],
    signature: Option<&[u8]>,
    trusted_keys: &[Vec<u8>],
) -> CustodyResult<()> {
    let signature = signature.ok_or_else(|| {
        CustodyError::provenance_missing(format!(
            "public key for wallet '{}' carries no provenance signature",
            wallet_id
        ))
    })?;

    let record = ProvenanceRecord {
        wallet_id: wallet_id.to_string(),
        path: path.to_vec(),
        public_key: public_key.to_vec(),
    };
    let digest = sha256(&record.to_der());
    let raw_signature = provenance_signature_bytes(signature)?;

    if verify_signature(&digest, &raw_signature, trusted_keys, CurveType::Secp256r1)? {
        log_debug!("provenance", "Public key provenance verified", public_key = hex::encode(public_key));
        Ok(())
    } else {
        log_warn!("provenance", "Public key provenance rejected", public_key = hex::encode(public_key));
        Err(CustodyError::provenance_invalid(format!(
            "public key for wallet '{}' was not issued by a trusted custody key",
            wallet_id
        ))
        .with_details(format!("public_key={}", hex::encode(public_key))))
    }
}

/// Verify the service's signature over a standalone recoverer-schedule structure
pub fn verify_recoverer_schedules(
    schedules: &[Schedule],
    signature: &[u8],
    trusted_keys: &[Vec<u8>],
) -> CustodyResult<()> {
    if trusted_keys.is_empty() {
        return Err(CustodyError::new(
            ErrorCode::RecovererScheduleInvalid,
            "no trusted recoverer keys configured",
        ));
    }

    let digest = sha256(&encode_recoverer_schedules(schedules));
    let raw_signature = provenance_signature_bytes(signature)?;

    if verify_signature(&digest, &raw_signature, trusted_keys, CurveType::Secp256r1)? {
        Ok(())
    } else {
        log_warn!("provenance", "Recoverer schedule signature rejected", digest = hex::encode(digest));
        Err(CustodyError::new(
            ErrorCode::RecovererScheduleInvalid,
            "recoverer schedules were not signed by a trusted recoverer key",
        ))
    }
}

/// Provenance signatures arrive either as r‖s or as a DER `Signature`
fn provenance_signature_bytes(signature: &[u8]) -> CustodyResult<Vec<u8>> {
    if signature.len() != SIGNATURE_LEN && signature.first() == Some(&0x30) {
        let raw = EcdsaSignature::from_der(signature)?.to_raw()?;
        return Ok(raw.to_vec());
    }
    Ok(signature.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Clause;
    use p256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};

    const E2E_PUBLIC_KEY: &str = "044f355bdcb7cc0af728ef3cceb9615d90684bb5b2ca5f859ab0f0b704075871aa385b6b1b8ead809ca67454d9683fcf2ba03456d6fe2c4abe2b07f0fbdbb2f1c1";
    const PATH: [u32; 5] = [0x8000002c, 0x80000000, 0x80000000, 0, 0];

    fn key(byte: u8) -> SigningKey {
        SigningKey::from_slice(&[byte; 32]).unwrap()
    }

    fn public(signing_key: &SigningKey) -> Vec<u8> {
        signing_key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
    }

    fn sign(signing_key: &SigningKey, data: &[u8]) -> Signature {
        signing_key.sign_prehash(&sha256(data)).unwrap()
    }

    fn record_der() -> Vec<u8> {
        ProvenanceRecord {
            wallet_id: "sub-wallet-1".into(),
            path: PATH.to_vec(),
            public_key: hex::decode(E2E_PUBLIC_KEY).unwrap(),
        }
        .to_der()
    }

    #[test]
    fn test_record_encoding() {
        assert!(hex::encode(record_der()).starts_with("306e0c0c7375622d77616c6c65742d31301b"));
    }

    #[test]
    fn test_verify_provenance_raw_and_der() {
        let custody = key(0x22);
        let trusted = vec![public(&key(0x55)), public(&custody)];
        let public_key = hex::decode(E2E_PUBLIC_KEY).unwrap();
        let signature = sign(&custody, &record_der());

        let raw = signature.to_bytes().to_vec();
        verify_provenance("sub-wallet-1", &PATH, &public_key, Some(&raw), &trusted).unwrap();

        let der = signature.to_der().as_bytes().to_vec();
        verify_provenance("sub-wallet-1", &PATH, &public_key, Some(&der), &trusted).unwrap();
    }

    #[test]
    fn test_provenance_failures_are_distinct() {
        let custody = key(0x22);
        let trusted = vec![public(&custody)];
        let public_key = hex::decode(E2E_PUBLIC_KEY).unwrap();
        let raw = sign(&custody, &record_der()).to_bytes().to_vec();

        let err = verify_provenance("sub-wallet-1", &PATH, &public_key, None, &trusted).unwrap_err();
        assert_eq!(err.code, ErrorCode::ProvenanceMissing);

        let err = verify_provenance("sub-wallet-2", &PATH, &public_key, Some(&raw), &trusted)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProvenanceInvalid);

        let mut other_path = PATH;
        other_path[4] = 1;
        let err = verify_provenance("sub-wallet-1", &other_path, &public_key, Some(&raw), &trusted)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProvenanceInvalid);

        let err = verify_provenance("sub-wallet-1", &PATH, &public_key, Some(&raw[..10]), &trusted)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedSignature);
    }

    #[test]
    fn test_verify_recoverer_schedules() {
        let recoverer = key(0x44);
        let schedules: Vec<Schedule> = vec![vec![Clause {
            quorum_count: 1,
            keys: vec![[vec![0x04], vec![0x33; 64]].concat()],
        }]];
        let der = encode_recoverer_schedules(&schedules);
        assert!(hex::encode(&der).starts_with("304c304a3048020101"));

        let signature = sign(&recoverer, &der).to_bytes().to_vec();
        verify_recoverer_schedules(&schedules, &signature, &[public(&recoverer)]).unwrap();

        let err = verify_recoverer_schedules(&schedules, &signature, &[public(&key(0x22))])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RecovererScheduleInvalid);

        let mut tampered = schedules.clone();
        tampered[0][0].quorum_count = 2;
        let err = verify_recoverer_schedules(&tampered, &signature, &[public(&recoverer)])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RecovererScheduleInvalid);

        let err = verify_recoverer_schedules(&schedules, &signature, &[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::RecovererScheduleInvalid);
    }

    #[test]
    fn test_provenance_data_wire_shape() {
        let json = r#"{ "path": [2147483692, 0], "signature": "0xabcd" }"#;
        let data: PublicKeyProvenanceData = serde_json::from_str(json).unwrap();
        assert_eq!(data.path, vec![0x8000002c, 0]);
        assert_eq!(data.signature, Some(vec![0xab, 0xcd]));
        assert!(data.public_key.is_none());

        let unsigned: PublicKeyProvenanceData = serde_json::from_str(r#"{ "path": [] }"#).unwrap();
        assert!(unsigned.signature.is_none());
    }
}
