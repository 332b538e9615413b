//! Shared fixtures for integration tests: software signers, a recording
//! custody client and helpers that fill in honest service claims.

#![allow(dead_code)]

use async_trait::async_trait;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use custody_signer::codec::{ProvenanceRecord, TxDigestPath};
use custody_signer::crypto::CurveType;
use custody_signer::utils::sha256;
use custody_signer::{
    BitcoinNetwork, CustodyClient, CustodyError, CustodyResult, MessageType, PublicKeySignaturePair,
    SignCallback, SignContext, SignDigest, SignableRequest, SignatureSubmission, TrustProfile,
};
use p256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SUB_WALLET_ID: &str = "sub-wallet-1";
pub const E2E_PUBLIC_KEY: &str = "044f355bdcb7cc0af728ef3cceb9615d90684bb5b2ca5f859ab0f0b704075871aa385b6b1b8ead809ca67454d9683fcf2ba03456d6fe2c4abe2b07f0fbdbb2f1c1";
pub const E2E_SIGHASH: &str = "34aa46735926a7d5f17db4096d52735149149cb57c241a2fcae2499d373a8636";
pub const CHANGE_ADDRESS: &str = "2NEp346GsvyPAu3X9oKGjrzLXc8vw8CqG7T";
pub const RECIPIENT: &str = "mubWcLfrzKdYcgPbNQYT1Zdmpy5xw7gibF";

pub fn p256_key(byte: u8) -> SigningKey {
    SigningKey::from_slice(&[byte; 32]).unwrap()
}

pub fn p256_public(byte: u8) -> Vec<u8> {
    p256_key(byte).verifying_key().to_encoded_point(false).as_bytes().to_vec()
}

pub fn secp_public(byte: u8) -> Vec<u8> {
    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&[byte; 32]).unwrap();
    PublicKey::from_secret_key(&secp, &secret).serialize_uncompressed().to_vec()
}

/// Custody key 0x22, recoverer key 0x44, testnet
pub fn trust() -> Arc<TrustProfile> {
    Arc::new(
        TrustProfile::new(vec![p256_public(0x22)], vec![p256_public(0x44)], BitcoinNetwork::Testnet)
            .unwrap(),
    )
}

/// Provenance signature by the custody key over `(wallet, path, public_key)`
pub fn provenance_signature(wallet_id: &str, path: &[u32], public_key: &[u8]) -> String {
    let record = ProvenanceRecord {
        wallet_id: wallet_id.to_string(),
        path: path.to_vec(),
        public_key: public_key.to_vec(),
    };
    let signature: Signature = p256_key(0x22).sign_prehash(&sha256(&record.to_der())).unwrap();
    hex::encode(signature.to_bytes())
}

/// Replace every entry's `unverifiedMessageData` with what an honest service
/// would send for this payload
pub fn with_honest_claims(
    message_type: MessageType,
    mut data: serde_json::Value,
    network: BitcoinNetwork,
) -> serde_json::Value {
    let request = SignableRequest::from_message(message_type, data.clone(), network).unwrap();
    for (index, delegate) in request.delegate_sign_data().iter().enumerate() {
        let digest = request.expected_digest(index).unwrap();
        let sign_digest =
            SignDigest::new(&digest, &delegate.hd_wallet_path, delegate.algorithm.as_deref())
                .unwrap();
        data["delegateSignData"][index]["unverifiedMessageData"] = serde_json::json!({
            "message": hex::encode(&digest),
            "signData": hex::encode(sign_digest.sign_data()),
            "shaSignData": hex::encode(sign_digest.sha_sign_data()),
        });
    }
    data
}

pub fn envelope(message_type: MessageType, data: serde_json::Value) -> String {
    serde_json::json!({ "type": message_type.as_str(), "data": data }).to_string()
}

// =============================================================================
// Software signer
// =============================================================================

/// Signs with a fixed software key. secp256k1 signs the chain digest inside
/// the sign data; P-256 signs `shaSignData`.
pub struct SoftwareSigner {
    curve: CurveType,
    secret: [u8; 32],
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
    /// Delay per call, longest first, so concurrent completions arrive reversed
    stagger_ms: u64,
}

impl SoftwareSigner {
    pub fn secp256k1() -> Self {
        Self::new(CurveType::Secp256k1, [0x11; 32])
    }

    pub fn p256() -> Self {
        Self::new(CurveType::Secp256r1, [0x33; 32])
    }

    fn new(curve: CurveType, secret: [u8; 32]) -> Self {
        Self {
            curve,
            secret,
            calls: AtomicUsize::new(0),
            fail_on_call: None,
            stagger_ms: 0,
        }
    }

    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn staggered(mut self, ms: u64) -> Self {
        self.stagger_ms = ms;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn sign_now(&self, sign_digest: &SignDigest) -> PublicKeySignaturePair {
        match self.curve {
            CurveType::Secp256k1 => {
                let secp = Secp256k1::new();
                let secret = SecretKey::from_slice(&self.secret).unwrap();
                let record = TxDigestPath::from_der(sign_digest.sign_data()).unwrap();
                let message = Message::from_digest_slice(&record.digest).unwrap();
                PublicKeySignaturePair {
                    public_key: PublicKey::from_secret_key(&secp, &secret)
                        .serialize_uncompressed()
                        .to_vec(),
                    signature: secp.sign_ecdsa(&message, &secret).serialize_compact().to_vec(),
                }
            }
            CurveType::Secp256r1 => {
                let key = SigningKey::from_slice(&self.secret).unwrap();
                let signature: Signature = key.sign_prehash(sign_digest.sha_sign_data()).unwrap();
                PublicKeySignaturePair {
                    public_key: key.verifying_key().to_encoded_point(false).as_bytes().to_vec(),
                    signature: signature.to_bytes().to_vec(),
                }
            }
        }
    }
}

#[async_trait]
impl SignCallback for SoftwareSigner {
    async fn sign(
        &self,
        sign_digest: &SignDigest,
        _context: &SignContext,
    ) -> CustodyResult<PublicKeySignaturePair> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stagger_ms > 0 {
            let remaining = 4usize.saturating_sub(call) as u64;
            tokio::time::sleep(Duration::from_millis(self.stagger_ms * remaining)).await;
        }
        if self.fail_on_call == Some(call) {
            return Err(CustodyError::internal("hsm unavailable"));
        }
        Ok(self.sign_now(sign_digest))
    }
}

// =============================================================================
// Custody client
// =============================================================================

#[derive(Default)]
pub struct RecordingClient {
    answer_with: Option<String>,
    submissions: Mutex<Vec<SignatureSubmission>>,
}

impl RecordingClient {
    /// Answers every submission with `id` instead of the submitted request id
    pub fn answering(id: &str) -> Self {
        Self {
            answer_with: Some(id.to_string()),
            ..Default::default()
        }
    }

    pub fn submissions(&self) -> Vec<SignatureSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl CustodyClient for RecordingClient {
    async fn submit_signatures(&self, submission: &SignatureSubmission) -> CustodyResult<String> {
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(self
            .answer_with
            .clone()
            .unwrap_or_else(|| submission.request_id.clone()))
    }
}
