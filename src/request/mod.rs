//! Signable Requests
//!
//! One variant per chain or operation. Each variant owns the untrusted
//! fields it was built from, reconstructs its digests on demand (memoized)
//! and validates itself against trust material and caller expectations.
//! Dispatch is by `match` so every variant handles every stage.

pub mod bitcoin;
pub mod cardano;
pub mod ethereum;
pub mod message;
pub mod policy;
pub mod ripple;
pub mod solana;

pub use self::bitcoin::BitcoinTransactionRequest;
pub use cardano::CardanoTransactionRequest;
pub use ethereum::EthereumTransactionRequest;
pub use message::EthereumMessageRequest;
pub use policy::PolicyChangeRequest;
pub use ripple::RipplePaymentRequest;
pub use solana::SolanaTransactionRequest;

use crate::config::{BitcoinNetwork, TrustProfile};
use crate::crypto::CurveType;
use crate::error::{CustodyError, CustodyResult, ErrorCode};
use crate::types::{DelegateSignData, SignDigest, ValidationExpectations};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

// =============================================================================
// Message Types
// =============================================================================

/// Payload tag on webhooks and creation responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    BitcoinTransactionCreated,
    EthereumTransactionCreated,
    EthereumMessageSignRequestCreated,
    PolicyChangeRequestCreated,
    RippleTransactionCreated,
    CardanoTransactionCreated,
    SolanaTransactionCreated,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BitcoinTransactionCreated => "BITCOIN_TRANSACTION_CREATED",
            Self::EthereumTransactionCreated => "ETHEREUM_TRANSACTION_CREATED",
            Self::EthereumMessageSignRequestCreated => "ETHEREUM_MESSAGE_SIGN_REQUEST_CREATED",
            Self::PolicyChangeRequestCreated => "POLICY_CHANGE_REQUEST_CREATED",
            Self::RippleTransactionCreated => "RIPPLE_TRANSACTION_CREATED",
            Self::CardanoTransactionCreated => "CARDANO_TRANSACTION_CREATED",
            Self::SolanaTransactionCreated => "SOLANA_TRANSACTION_CREATED",
        }
    }
}

impl FromStr for MessageType {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BITCOIN_TRANSACTION_CREATED" => Ok(Self::BitcoinTransactionCreated),
            "ETHEREUM_TRANSACTION_CREATED" => Ok(Self::EthereumTransactionCreated),
            "ETHEREUM_MESSAGE_SIGN_REQUEST_CREATED" => Ok(Self::EthereumMessageSignRequestCreated),
            "POLICY_CHANGE_REQUEST_CREATED" => Ok(Self::PolicyChangeRequestCreated),
            "RIPPLE_TRANSACTION_CREATED" => Ok(Self::RippleTransactionCreated),
            "CARDANO_TRANSACTION_CREATED" => Ok(Self::CardanoTransactionCreated),
            "SOLANA_TRANSACTION_CREATED" => Ok(Self::SolanaTransactionCreated),
            other => Err(CustodyError::new(
                ErrorCode::UnsupportedMessageType,
                format!("Unsupported message type: {}", other),
            )),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Stage of a request; `Rejected` is terminal and records where it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Constructed,
    Validated,
    Signing { completed: usize, total: usize },
    Signed,
    Submitted,
    Rejected(RequestStage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStage {
    Construction,
    Validation,
    Signing,
    Submission,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constructed => write!(f, "constructed"),
            Self::Validated => write!(f, "validated"),
            Self::Signing { completed, total } => write!(f, "signing({}/{})", completed, total),
            Self::Signed => write!(f, "signed"),
            Self::Submitted => write!(f, "submitted"),
            Self::Rejected(stage) => write!(f, "rejected({:?})", stage),
        }
    }
}

/// Forward-only state machine for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLifecycle {
    state: RequestState,
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self { state: RequestState::Constructed }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RequestState::Submitted | RequestState::Rejected(_))
    }

    pub fn mark_validated(&mut self) -> CustodyResult<()> {
        self.advance(RequestState::Validated)
    }

    pub fn begin_signing(&mut self, total: usize) -> CustodyResult<()> {
        self.advance(RequestState::Signing { completed: 0, total })
    }

    /// Count one verified signature
    pub fn record_signature(&mut self) -> CustodyResult<()> {
        match self.state {
            RequestState::Signing { completed, total } if completed < total => self.advance(
                RequestState::Signing { completed: completed + 1, total },
            ),
            _ => Err(self.invalid_transition("record a signature")),
        }
    }

    pub fn mark_signed(&mut self) -> CustodyResult<()> {
        self.advance(RequestState::Signed)
    }

    pub fn mark_submitted(&mut self) -> CustodyResult<()> {
        self.advance(RequestState::Submitted)
    }

    /// Move to the terminal rejected state from whatever stage is current
    pub fn reject(&mut self) -> CustodyResult<()> {
        let stage = match self.state {
            RequestState::Constructed => RequestStage::Construction,
            RequestState::Validated => RequestStage::Validation,
            RequestState::Signing { .. } => RequestStage::Signing,
            RequestState::Signed => RequestStage::Submission,
            RequestState::Submitted | RequestState::Rejected(_) => {
                return Err(self.invalid_transition("reject"))
            }
        };
        self.state = RequestState::Rejected(stage);
        Ok(())
    }

    fn advance(&mut self, next: RequestState) -> CustodyResult<()> {
        let allowed = match (self.state, next) {
            (RequestState::Constructed, RequestState::Validated) => true,
            (RequestState::Validated, RequestState::Signing { completed: 0, .. }) => true,
            (
                RequestState::Signing { completed, total },
                RequestState::Signing { completed: next_completed, total: next_total },
            ) => next_total == total && next_completed == completed + 1,
            (RequestState::Signing { completed, total }, RequestState::Signed) => completed == total,
            (RequestState::Signed, RequestState::Submitted) => true,
            _ => false,
        };

        if allowed {
            self.state = next;
            Ok(())
        } else {
            Err(self.invalid_transition(&next.to_string()))
        }
    }

    fn invalid_transition(&self, target: &str) -> CustodyError {
        CustodyError::internal(format!(
            "request cannot move from {} to {}",
            self.state, target
        ))
    }
}

// =============================================================================
// Signable Request
// =============================================================================

/// Any request the custody service can ask us to sign
#[derive(Debug, Clone)]
pub enum SignableRequest {
    Bitcoin(BitcoinTransactionRequest),
    Ethereum(EthereumTransactionRequest),
    Ripple(RipplePaymentRequest),
    Cardano(CardanoTransactionRequest),
    Solana(SolanaTransactionRequest),
    EthereumMessage(EthereumMessageRequest),
    Policy(PolicyChangeRequest),
}

impl SignableRequest {
    /// Build the variant matching `message_type` from its JSON payload
    pub fn from_message(
        message_type: MessageType,
        data: serde_json::Value,
        network: BitcoinNetwork,
    ) -> CustodyResult<Self> {
        let request = match message_type {
            MessageType::BitcoinTransactionCreated => {
                Self::Bitcoin(BitcoinTransactionRequest::from_value(data, network)?)
            }
            MessageType::EthereumTransactionCreated => {
                Self::Ethereum(EthereumTransactionRequest::from_value(data)?)
            }
            MessageType::EthereumMessageSignRequestCreated => {
                Self::EthereumMessage(EthereumMessageRequest::from_value(data)?)
            }
            MessageType::PolicyChangeRequestCreated => {
                Self::Policy(PolicyChangeRequest::from_value(data)?)
            }
            MessageType::RippleTransactionCreated => {
                Self::Ripple(RipplePaymentRequest::from_value(data)?)
            }
            MessageType::CardanoTransactionCreated => {
                Self::Cardano(CardanoTransactionRequest::from_value(data)?)
            }
            MessageType::SolanaTransactionCreated => {
                Self::Solana(SolanaTransactionRequest::from_value(data)?)
            }
        };
        Ok(request)
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Bitcoin(r) => r.id(),
            Self::Ethereum(r) => r.id(),
            Self::Ripple(r) => r.id(),
            Self::Cardano(r) => r.id(),
            Self::Solana(r) => r.id(),
            Self::EthereumMessage(r) => r.id(),
            Self::Policy(r) => r.id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bitcoin(_) => "bitcoin",
            Self::Ethereum(_) => "ethereum",
            Self::Ripple(_) => "ripple",
            Self::Cardano(_) => "cardano",
            Self::Solana(_) => "solana",
            Self::EthereumMessage(_) => "ethereum_message",
            Self::Policy(_) => "policy",
        }
    }

    pub fn delegate_sign_data(&self) -> &[DelegateSignData] {
        match self {
            Self::Bitcoin(r) => r.delegate_sign_data(),
            Self::Ethereum(r) => r.delegate_sign_data(),
            Self::Ripple(r) => r.delegate_sign_data(),
            Self::Cardano(r) => r.delegate_sign_data(),
            Self::Solana(r) => r.delegate_sign_data(),
            Self::EthereumMessage(r) => r.delegate_sign_data(),
            Self::Policy(r) => r.delegate_sign_data(),
        }
    }

    /// Curve the signer's key lives on
    pub fn curve(&self) -> CurveType {
        match self {
            Self::Bitcoin(_) | Self::Ethereum(_) | Self::EthereumMessage(_) => CurveType::Secp256k1,
            Self::Ripple(_) | Self::Cardano(_) | Self::Solana(_) | Self::Policy(_) => {
                CurveType::Secp256r1
            }
        }
    }

    /// Reconstructed chain digest for the delegate entry at `index`
    pub fn expected_digest(&self, index: usize) -> CustodyResult<Vec<u8>> {
        match self {
            Self::Bitcoin(r) => Ok(r.sighash(index)?.to_vec()),
            Self::Ethereum(r) => Ok(r.digest().to_vec()),
            Self::Ripple(r) => Ok(r.digest()?.to_vec()),
            Self::Cardano(r) => Ok(r.digest()?.to_vec()),
            Self::Solana(r) => Ok(r.message_bytes()?.to_vec()),
            Self::EthereumMessage(r) => Ok(r.digest()?.to_vec()),
            Self::Policy(r) => Ok(r.digest().to_vec()),
        }
    }

    /// The 32 bytes a returned signature must verify over.
    ///
    /// secp256k1 signers sign the chain digest directly; P-256 signers sign
    /// the SHA-256 of the DER sign data.
    pub fn verification_message(
        &self,
        digest: &[u8],
        sign_digest: &SignDigest,
    ) -> CustodyResult<[u8; 32]> {
        match self.curve() {
            CurveType::Secp256k1 => digest.try_into().map_err(|_| {
                CustodyError::internal(format!(
                    "{} digest must be 32 bytes, got {}",
                    self.kind(),
                    digest.len()
                ))
            }),
            CurveType::Secp256r1 => Ok(*sign_digest.sha_sign_data()),
        }
    }

    /// Public key the signer must answer with, when the request pins one
    pub fn expected_signer_key(&self, index: usize) -> Option<Vec<u8>> {
        match self {
            Self::Bitcoin(r) => r.input_public_key(index),
            _ => None,
        }
    }

    /// Schema, provenance and expectation checks. Runs before any signing.
    pub fn validate(
        &self,
        trust: &TrustProfile,
        expectations: &ValidationExpectations,
    ) -> CustodyResult<()> {
        match self {
            Self::Bitcoin(r) => r.validate(trust, expectations),
            Self::Ethereum(r) => r.validate(expectations),
            Self::Ripple(r) => r.validate(expectations),
            Self::Cardano(r) => r.validate(expectations),
            Self::Solana(r) => r.validate(expectations),
            Self::EthereumMessage(r) => r.validate(),
            Self::Policy(r) => r.validate(trust, expectations),
        }
    }
}

/// Fill a memo cell on first use; failures are not cached
pub(crate) fn memoized<T>(
    cell: &OnceLock<T>,
    compute: impl FnOnce() -> CustodyResult<T>,
) -> CustodyResult<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = compute()?;
    Ok(cell.get_or_init(|| value))
}

/// Delegate entries must be present and, where the chain fixes it, match
/// the number of signatures the transaction needs
pub(crate) fn check_delegate_count(
    delegate_sign_data: &[DelegateSignData],
    required: Option<usize>,
) -> CustodyResult<()> {
    if delegate_sign_data.is_empty() {
        return Err(CustodyError::missing_field("delegateSignData"));
    }
    if let Some(required) = required {
        if delegate_sign_data.len() != required {
            return Err(CustodyError::invalid_input(format!(
                "expected {} delegateSignData entries, got {}",
                required,
                delegate_sign_data.len()
            )));
        }
    }
    Ok(())
}
