//! Ripple payment requests
//!
//! Only XRP-denominated `Payment` transactions are accepted. Every delegate
//! entry signs SHA-256 of the DER sign data wrapping the SHA-512-half digest.

use super::{check_delegate_count, memoized};
use crate::error::{CustodyError, CustodyResult};
use crate::serde_bytes::hex_bytes_option;
use crate::signing::preimage::{get_ripple_signing_hash, RipplePayment};
use crate::types::{DelegateSignData, ValidationExpectations};
use crate::utils::{base58check_decode, from_json_value, parse_decimal_u64};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const PAYMENT: &str = "Payment";
const ACCOUNT_ID_VERSION: u8 = 0x00;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RipplePaymentPayload {
    pub transaction_type: String,
    pub account: String,
    pub destination: String,
    /// Drops, decimal
    pub amount: String,
    /// Drops, decimal
    pub fee: String,
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ledger_sequence: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_tag: Option<u32>,
    #[serde(default, with = "hex_bytes_option", skip_serializing_if = "Option::is_none")]
    pub signing_pub_key: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RipplePaymentRequestPayload {
    pub id: String,
    pub transaction: RipplePaymentPayload,
    pub delegate_sign_data: Vec<DelegateSignData>,
}

#[derive(Debug, Clone)]
pub struct RipplePaymentRequest {
    payload: RipplePaymentRequestPayload,
    payment: RipplePayment,
    digest: OnceLock<[u8; 32]>,
}

impl RipplePaymentRequest {
    /// Rejects non-Payment types and malformed addresses before any digest work
    pub fn new(payload: RipplePaymentRequestPayload) -> CustodyResult<Self> {
        let tx = &payload.transaction;
        if tx.transaction_type != PAYMENT {
            return Err(CustodyError::unsupported_type(format!(
                "Ripple transaction type '{}' is not supported",
                tx.transaction_type
            )));
        }
        check_delegate_count(&payload.delegate_sign_data, None)?;

        let payment = RipplePayment {
            account: decode_account_id(&tx.account)?,
            destination: decode_account_id(&tx.destination)?,
            amount: parse_decimal_u64(&tx.amount, "amount")?,
            fee: parse_decimal_u64(&tx.fee, "fee")?,
            sequence: tx.sequence,
            flags: tx.flags,
            destination_tag: tx.destination_tag,
            last_ledger_sequence: tx.last_ledger_sequence,
            signing_pub_key: tx.signing_pub_key.clone(),
        };

        Ok(Self {
            payload,
            payment,
            digest: OnceLock::new(),
        })
    }

    pub fn from_value(data: serde_json::Value) -> CustodyResult<Self> {
        Self::new(from_json_value(data)?)
    }

    pub fn id(&self) -> &str {
        &self.payload.id
    }

    pub fn payment(&self) -> &RipplePayment {
        &self.payment
    }

    pub fn delegate_sign_data(&self) -> &[DelegateSignData] {
        &self.payload.delegate_sign_data
    }

    pub fn digest(&self) -> CustodyResult<[u8; 32]> {
        memoized(&self.digest, || Ok(get_ripple_signing_hash(&self.payment)?)).copied()
    }

    pub fn validate(&self, expectations: &ValidationExpectations) -> CustodyResult<()> {
        // Amounts beyond the XRP supply fail here rather than at signing time
        self.digest()?;

        let tx = &self.payload.transaction;
        if let Some(expected_to) = &expectations.expected_to {
            if expected_to != &tx.destination {
                return Err(CustodyError::expectation_mismatch(
                    "destination",
                    expected_to,
                    &tx.destination,
                ));
            }
        }
        if let Some(expected_amount) = &expectations.expected_amount {
            if parse_decimal_u64(expected_amount, "expectedAmount")? != self.payment.amount {
                return Err(CustodyError::expectation_mismatch(
                    "amount",
                    expected_amount,
                    &tx.amount,
                ));
            }
        }
        Ok(())
    }
}

/// 20-byte account id from a classic `r...` address
pub fn decode_account_id(address: &str) -> CustodyResult<[u8; 20]> {
    let payload = base58check_decode(address, bs58::Alphabet::RIPPLE)?;
    match payload.split_first() {
        Some((&ACCOUNT_ID_VERSION, id)) if id.len() == 20 => {
            let mut out = [0u8; 20];
            out.copy_from_slice(id);
            Ok(out)
        }
        _ => Err(CustodyError::invalid_address(format!(
            "'{}' is not a classic Ripple address",
            address
        ))),
    }
}
