//! Ethereum transaction requests
//!
//! Legacy (type 0) transactions with EIP-155 replay protection. Every
//! delegate entry signs the same keccak digest.

use super::check_delegate_count;
use crate::error::{CustodyError, CustodyResult};
use crate::signing::preimage::{get_ethereum_signing_hash, LegacyTransaction};
use crate::types::{DelegateSignData, ValidationExpectations};
use crate::utils::{from_json_value, parse_decimal_bytes, parse_hex_bytes, strip_hex_prefix};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const TRANSFER_FROM_SELECTOR: &str = "23b872dd";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthereumTransactionPayload {
    pub from_address: String,
    pub to: String,
    /// Wei, decimal
    pub value: String,
    /// Wei, decimal
    pub gas_price: String,
    pub gas_limit: String,
    pub nonce: u64,
    pub chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// `ETHEREUM_TRANSACTION_CREATED` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthereumTransactionRequestPayload {
    pub id: String,
    pub transaction: EthereumTransactionPayload,
    pub delegate_sign_data: Vec<DelegateSignData>,
}

/// Sender, recipient and amount a transaction actually moves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub from: String,
    pub to: String,
    /// Minimal big-endian magnitude
    pub amount: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EthereumTransactionRequest {
    payload: EthereumTransactionRequestPayload,
    transaction: LegacyTransaction,
    digest: OnceLock<[u8; 32]>,
}

impl EthereumTransactionRequest {
    pub fn new(payload: EthereumTransactionRequestPayload) -> CustodyResult<Self> {
        check_delegate_count(&payload.delegate_sign_data, None)?;
        let tx = &payload.transaction;

        parse_address(&tx.from_address, "fromAddress")?;
        let data = match tx.data.as_deref() {
            Some(data) if !strip_hex_prefix(data).is_empty() => parse_hex_bytes(data)?,
            _ => Vec::new(),
        };

        let transaction = LegacyTransaction {
            nonce: tx.nonce,
            gas_price: parse_decimal_bytes(&tx.gas_price)?,
            gas_limit: parse_decimal_bytes(&tx.gas_limit)?,
            to: parse_address(&tx.to, "to")?,
            value: parse_decimal_bytes(&tx.value)?,
            data,
            chain_id: tx.chain_id,
        };

        Ok(Self {
            payload,
            transaction,
            digest: OnceLock::new(),
        })
    }

    pub fn from_value(data: serde_json::Value) -> CustodyResult<Self> {
        Self::new(from_json_value(data)?)
    }

    pub fn id(&self) -> &str {
        &self.payload.id
    }

    pub fn transaction(&self) -> &LegacyTransaction {
        &self.transaction
    }

    pub fn delegate_sign_data(&self) -> &[DelegateSignData] {
        &self.payload.delegate_sign_data
    }

    pub fn digest(&self) -> [u8; 32] {
        *self.digest.get_or_init(|| get_ethereum_signing_hash(&self.transaction))
    }

    /// What the transaction moves. `transferFrom` call data is decoded in
    /// place of the top-level fields.
    pub fn transfer_summary(&self) -> CustodyResult<TransferSummary> {
        if self.transaction.data.is_empty() {
            return Ok(TransferSummary {
                from: normalize_address(&self.payload.transaction.from_address),
                to: normalize_address(&self.payload.transaction.to),
                amount: self.transaction.value.clone(),
            });
        }

        let data = format!("0x{}", hex::encode(&self.transaction.data));
        if data.len() < 202 || &data[2..10] != TRANSFER_FROM_SELECTOR {
            return Err(CustodyError::unsupported_type(
                "call data is not an ERC-20 transferFrom; transfer cannot be verified",
            ));
        }

        let amount = parse_hex_bytes(&data[138..202])?;
        let first_nonzero = amount.iter().position(|&b| b != 0).unwrap_or(amount.len());
        Ok(TransferSummary {
            from: format!("0x{}", &data[34..74]),
            to: format!("0x{}", &data[98..138]),
            amount: amount[first_nonzero..].to_vec(),
        })
    }

    /// Compare the caller's expected sender, recipient and amount
    pub fn validate(&self, expectations: &ValidationExpectations) -> CustodyResult<()> {
        let checks_requested = expectations.expected_from.is_some()
            || expectations.expected_to.is_some()
            || expectations.expected_amount.is_some();
        if !checks_requested {
            return Ok(());
        }

        let summary = self.transfer_summary()?;

        if let Some(expected_from) = &expectations.expected_from {
            if normalize_address(expected_from) != summary.from {
                return Err(CustodyError::expectation_mismatch("sender", expected_from, &summary.from));
            }
        }
        if let Some(expected_to) = &expectations.expected_to {
            if normalize_address(expected_to) != summary.to {
                return Err(CustodyError::expectation_mismatch("recipient", expected_to, &summary.to));
            }
        }
        if let Some(expected_amount) = &expectations.expected_amount {
            if parse_decimal_bytes(expected_amount)? != summary.amount {
                return Err(CustodyError::expectation_mismatch(
                    "amount",
                    expected_amount,
                    &format!("0x{}", hex::encode(&summary.amount)),
                ));
            }
        }
        Ok(())
    }
}

fn parse_address(address: &str, field: &str) -> CustodyResult<[u8; 20]> {
    let bytes = hex::decode(strip_hex_prefix(address.trim()))
        .map_err(|e| CustodyError::invalid_address(format!("{} '{}': {}", field, address, e)))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        CustodyError::invalid_address(format!("{} must be 20 bytes, got {}", field, len))
    })
}

fn normalize_address(address: &str) -> String {
    format!("0x{}", strip_hex_prefix(address.trim()).to_lowercase())
}
