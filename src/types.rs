//! Shared types for the custody signer
//!
//! All data structures that cross module boundaries are defined here
//! for consistent serialization with the custody service.

use serde::{Deserialize, Serialize};

use crate::codec::{DerError, Schedule, TxDigestPath};
use crate::error::CustodyResult;
use crate::serde_bytes::{hex_bytes, hex_bytes_option};
use crate::utils::{sha256, strip_hex_prefix};

// =============================================================================
// Derivation Paths
// =============================================================================

/// Five-element hardened derivation path, hex strings on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HdWalletPath(Vec<String>);

impl HdWalletPath {
    pub const LEN: usize = 5;

    pub fn new(elements: [u32; Self::LEN]) -> Self {
        Self(elements.iter().map(|e| format!("{:x}", e)).collect())
    }

    /// Wire form as received
    pub fn as_strings(&self) -> &[String] {
        &self.0
    }

    /// Integer form used inside the DER record
    pub fn elements(&self) -> Result<[u32; Self::LEN], DerError> {
        if self.0.len() != Self::LEN {
            return Err(DerError::Encode(format!(
                "hdWalletPath must have {} elements, got {}",
                Self::LEN,
                self.0.len()
            )));
        }

        let mut out = [0u32; Self::LEN];
        for (slot, element) in out.iter_mut().zip(&self.0) {
            *slot = u32::from_str_radix(strip_hex_prefix(element.trim()), 16).map_err(|e| {
                DerError::Encode(format!("path element '{}' is not an integer: {}", element, e))
            })?;
        }
        Ok(out)
    }
}

// =============================================================================
// Sign Digest
// =============================================================================

/// What the external signer receives: the DER record and its SHA-256
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignDigest {
    #[serde(with = "hex_bytes")]
    sign_data: Vec<u8>,
    #[serde(with = "hex_bytes")]
    sha_sign_data: [u8; 32],
}

impl SignDigest {
    /// Build from a chain digest, its derivation path and an optional algorithm tag
    pub fn new(digest: &[u8], path: &HdWalletPath, algorithm: Option<&[u8]>) -> CustodyResult<Self> {
        let record = TxDigestPath {
            digest: digest.to_vec(),
            path: path.elements()?.to_vec(),
            algo: algorithm.map(<[u8]>::to_vec),
        };
        let sign_data = record.to_der();
        let sha_sign_data = sha256(&sign_data);
        Ok(Self { sign_data, sha_sign_data })
    }

    pub fn sign_data(&self) -> &[u8] {
        &self.sign_data
    }

    pub fn sha_sign_data(&self) -> &[u8; 32] {
        &self.sha_sign_data
    }
}

// =============================================================================
// Signer Output
// =============================================================================

/// Uncompressed public key and r‖s signature returned by a signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeySignaturePair {
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    pub public_key_signature_pairs: Vec<PublicKeySignaturePair>,
}

/// Outbound payload, one sign request per delegate entry in entry order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureSubmission {
    pub request_id: String,
    pub sign_requests: Vec<SignRequest>,
}

// =============================================================================
// Delegate Sign Data
// =============================================================================

/// The service's claim about what will be signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnverifiedMessageData {
    #[serde(alias = "digest", with = "hex_bytes")]
    pub message: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub sign_data: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub sha_sign_data: Vec<u8>,
}

/// One required signature slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateSignData {
    pub hd_wallet_path: HdWalletPath,
    #[serde(default, with = "hex_bytes_option", skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<Vec<u8>>,
    #[serde(alias = "unverifiedDigestData")]
    pub unverified_message_data: UnverifiedMessageData,
}

// =============================================================================
// Caller Expectations
// =============================================================================

/// Values the caller expects a request to carry; absent fields are not checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationExpectations {
    pub sub_wallet_id: Option<String>,
    pub expected_from: Option<String>,
    pub expected_to: Option<String>,
    pub expected_amount: Option<String>,
    pub expected_delegate_schedules: Option<Vec<Schedule>>,
}

impl ValidationExpectations {
    pub fn for_sub_wallet(sub_wallet_id: impl Into<String>) -> Self {
        Self {
            sub_wallet_id: Some(sub_wallet_id.into()),
            ..Default::default()
        }
    }

    pub fn with_recipient(mut self, to: impl Into<String>, amount: impl Into<String>) -> Self {
        self.expected_to = Some(to.into());
        self.expected_amount = Some(amount.into());
        self
    }

    pub fn with_sender(mut self, from: impl Into<String>) -> Self {
        self.expected_from = Some(from.into());
        self
    }

    pub fn with_delegate_schedules(mut self, schedules: Vec<Schedule>) -> Self {
        self.expected_delegate_schedules = Some(schedules);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const BIP143_DIGEST: &str = "64f3b0f4dd2bb3aa1ce8566d220cc74dda9df97d8490cc81d89d735c92e59fb6";

    fn path() -> HdWalletPath {
        HdWalletPath::new([0x8000002c, 0x80000000, 0x80000000, 0, 0])
    }

    #[test]
    fn test_sign_digest_vector() {
        let digest = hex::decode(BIP143_DIGEST).unwrap();
        let sign_digest = SignDigest::new(&digest, &path(), None).unwrap();
        assert_eq!(
            hex::encode(sign_digest.sha_sign_data()),
            "c823982424dfcbc1f71377afb05a020962632e75764f0a90e01e23b0822e9952"
        );
        assert_eq!(sign_digest.sign_data().len(), 0x41);
    }

    #[test]
    fn test_sign_digest_is_pure() {
        let digest = hex::decode(BIP143_DIGEST).unwrap();
        let a = SignDigest::new(&digest, &path(), Some(&[0x01])).unwrap();
        let b = SignDigest::new(&digest, &path(), Some(&[0x01])).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, SignDigest::new(&digest, &path(), None).unwrap());
    }

    #[test]
    fn test_path_must_have_five_integers() {
        let short: HdWalletPath = serde_json::from_str(r#"["8000002c","0"]"#).unwrap();
        let err = SignDigest::new(&[0u8; 32], &short, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::DerEncode);

        let bad: HdWalletPath = serde_json::from_str(r#"["8000002c","0","0","0","zz"]"#).unwrap();
        let err = SignDigest::new(&[0u8; 32], &bad, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::DerEncode);
    }

    #[test]
    fn test_delegate_sign_data_aliases() {
        let json = r#"{
            "hdWalletPath": ["8000002c","80000000","80000000","0","0"],
            "algorithm": "0x01",
            "unverifiedDigestData": { "digest": "aa", "signData": "bb", "shaSignData": "cc" }
        }"#;
        let data: DelegateSignData = serde_json::from_str(json).unwrap();
        assert_eq!(data.algorithm, Some(vec![0x01]));
        assert_eq!(data.unverified_message_data.message, vec![0xaa]);
        assert_eq!(data.hd_wallet_path.elements().unwrap()[0], 0x8000002c);
    }

    #[test]
    fn test_submission_wire_shape() {
        let submission = SignatureSubmission {
            request_id: "req-1".into(),
            sign_requests: vec![SignRequest {
                public_key_signature_pairs: vec![PublicKeySignaturePair {
                    public_key: vec![0x04],
                    signature: vec![0x01, 0x02],
                }],
            }],
        };
        let json = serde_json::to_string(&submission).unwrap();
        assert_eq!(
            json,
            r#"{"requestId":"req-1","signRequests":[{"publicKeySignaturePairs":[{"publicKey":"04","signature":"0102"}]}]}"#
        );
    }
}
