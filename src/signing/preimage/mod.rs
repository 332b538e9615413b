//! Pre-Image Hash Generation
//!
//! Rebuilds the exact bytes each chain signs. Every function here is pure:
//! identical inputs always produce identical output.

pub mod bitcoin;
pub mod cardano;
pub mod ethereum;
pub mod message;
pub mod ripple;
pub mod solana;

use crate::error::{CustodyError, ErrorCode};

/// Error types for pre-image operations
#[derive(Debug, thiserror::Error)]
pub enum PreImageError {
    #[error("Invalid transaction format: {0}")]
    InvalidTransaction(String),

    #[error("Unsupported transaction type: {0}")]
    UnsupportedType(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid input index: {0}")]
    InvalidInputIndex(usize),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

pub type PreImageResult<T> = Result<T, PreImageError>;

impl From<PreImageError> for CustodyError {
    fn from(e: PreImageError) -> Self {
        let code = match e {
            PreImageError::InvalidTransaction(_) | PreImageError::InvalidInputIndex(_) => {
                ErrorCode::InvalidTransaction
            }
            PreImageError::UnsupportedType(_) => ErrorCode::UnsupportedType,
            PreImageError::MissingField(_) => ErrorCode::MissingField,
            PreImageError::InvalidAddress(_) => ErrorCode::InvalidAddress,
            PreImageError::EncodingError(_) => ErrorCode::EncodingError,
        };
        CustodyError::new(code, e.to_string())
    }
}

// Re-export chain-specific functions
pub use self::bitcoin::{get_bitcoin_sighashes, UnsignedBitcoinTransaction};
pub use cardano::{get_cardano_body_hash, CardanoTransactionBody};
pub use ethereum::{get_ethereum_signing_hash, LegacyTransaction};
pub use message::{personal_sign_hash, typed_data_hash};
pub use ripple::{get_ripple_signing_hash, RipplePayment};
pub use solana::{get_solana_message_bytes, SolanaMessage};
