//! Unified error types for the custody signer
//!
//! Every public operation returns [`CustodyResult`]. Module-level error
//! enums convert into [`CustodyError`] so callers always see one shape,
//! and [`ErrorCode::kind`] tells them which stage failed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all custody operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl CustodyError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Which stage of the request this error belongs to
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(ErrorCode::MissingField, format!("Missing required field: {}", field))
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    pub fn unsupported_type(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedType, msg)
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::EncodingError, msg)
    }

    /// Locally reconstructed bytes differ from what the service claimed
    pub fn mismatch(code: ErrorCode, what: &str, expected: &[u8], actual: &[u8]) -> Self {
        Self::new(code, format!("{} does not match the reconstructed value", what)).with_details(
            format!("expected={} actual={}", hex::encode(expected), hex::encode(actual)),
        )
    }

    pub fn expectation_mismatch(field: &str, expected: &str, actual: &str) -> Self {
        Self::new(
            ErrorCode::ExpectationMismatch,
            format!("{} does not match the caller expectation", field),
        )
        .with_details(format!("expected={} actual={}", expected, actual))
    }

    pub fn provenance_missing(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProvenanceMissing, msg)
    }

    pub fn provenance_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProvenanceInvalid, msg)
    }

    pub fn signer_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SignerFailed, msg)
    }

    pub fn malformed_signature(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedSignature, msg)
    }

    pub fn signature_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SignatureInvalid, msg)
    }

    pub fn submission_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SubmissionFailed, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }
}

impl fmt::Display for CustodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for CustodyError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Schema errors
    InvalidInput,
    MissingField,
    InvalidAddress,
    UnsupportedType,
    UnsupportedMessageType,
    JsonError,
    HexError,
    InvalidTransaction,

    // Codec errors
    DerDecode,
    DerEncode,
    EncodingError,

    // Integrity errors
    DigestMismatch,
    SignDataMismatch,
    ShaSignDataMismatch,
    ExpectationMismatch,

    // Provenance errors
    ProvenanceMissing,
    ProvenanceInvalid,
    ChangeAddressMismatch,
    RecovererScheduleInvalid,

    // Signer errors
    SignerFailed,
    MalformedSignature,
    SignatureInvalid,
    SignerKeyMismatch,

    // Submission errors
    SubmissionIdMismatch,
    SubmissionFailed,

    // Internal
    Internal,
    ConfigError,
}

impl ErrorCode {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput
            | Self::MissingField
            | Self::InvalidAddress
            | Self::UnsupportedType
            | Self::UnsupportedMessageType
            | Self::JsonError
            | Self::HexError
            | Self::InvalidTransaction => ErrorKind::Schema,
            Self::DerDecode | Self::DerEncode | Self::EncodingError => ErrorKind::Codec,
            Self::DigestMismatch
            | Self::SignDataMismatch
            | Self::ShaSignDataMismatch
            | Self::ExpectationMismatch => ErrorKind::Integrity,
            Self::ProvenanceMissing
            | Self::ProvenanceInvalid
            | Self::ChangeAddressMismatch
            | Self::RecovererScheduleInvalid => ErrorKind::Provenance,
            Self::SignerFailed
            | Self::MalformedSignature
            | Self::SignatureInvalid
            | Self::SignerKeyMismatch => ErrorKind::Signer,
            Self::SubmissionIdMismatch | Self::SubmissionFailed => ErrorKind::Submission,
            Self::Internal | Self::ConfigError => ErrorKind::Internal,
        }
    }
}

/// The stage a failure belongs to. Each kind implies a different remediation:
/// fix the input, treat the request as compromised, or retry signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Schema,
    Codec,
    Integrity,
    Provenance,
    Signer,
    Submission,
    Internal,
}

/// Result type alias for custody operations
pub type CustodyResult<T> = Result<T, CustodyError>;

// Conversions from common error types

impl From<serde_json::Error> for CustodyError {
    fn from(e: serde_json::Error) -> Self {
        CustodyError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for CustodyError {
    fn from(e: hex::FromHexError) -> Self {
        CustodyError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<bitcoin::address::ParseError> for CustodyError {
    fn from(e: bitcoin::address::ParseError) -> Self {
        CustodyError::new(ErrorCode::InvalidAddress, format!("Bitcoin address error: {}", e))
    }
}

impl From<bitcoin::secp256k1::Error> for CustodyError {
    fn from(e: bitcoin::secp256k1::Error) -> Self {
        CustodyError::new(ErrorCode::InvalidInput, format!("Secp256k1 error: {}", e))
    }
}

impl From<bech32::Error> for CustodyError {
    fn from(e: bech32::Error) -> Self {
        CustodyError::new(ErrorCode::InvalidAddress, format!("Bech32 error: {}", e))
    }
}

impl From<bs58::decode::Error> for CustodyError {
    fn from(e: bs58::decode::Error) -> Self {
        CustodyError::new(ErrorCode::InvalidAddress, format!("Base58 error: {}", e))
    }
}

impl From<tokio::task::JoinError> for CustodyError {
    fn from(e: tokio::task::JoinError) -> Self {
        CustodyError::new(ErrorCode::Internal, format!("Signing task failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = CustodyError::mismatch(ErrorCode::DigestMismatch, "digest", &[0xaa], &[0xbb]);

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("digest_mismatch"));
        assert!(json.contains("expected=aa actual=bb"));
    }

    #[test]
    fn test_kinds_are_distinct_per_stage() {
        assert_eq!(ErrorCode::JsonError.kind(), ErrorKind::Schema);
        assert_eq!(ErrorCode::DerDecode.kind(), ErrorKind::Codec);
        assert_eq!(ErrorCode::ShaSignDataMismatch.kind(), ErrorKind::Integrity);
        assert_eq!(ErrorCode::ChangeAddressMismatch.kind(), ErrorKind::Provenance);
        assert_eq!(ErrorCode::SignatureInvalid.kind(), ErrorKind::Signer);
        assert_eq!(ErrorCode::SubmissionIdMismatch.kind(), ErrorKind::Submission);
    }

    #[test]
    fn test_display_includes_details() {
        let err = CustodyError::missing_field("transaction.inputs").with_details("at index 0");
        assert_eq!(
            err.to_string(),
            "[MissingField] Missing required field: transaction.inputs (at index 0)"
        );
    }
}
