//! Solana transaction requests
//!
//! The signed bytes are the serialized message itself, so the "digest"
//! carried in the sign data is the full message.

use super::{check_delegate_count, memoized};
use crate::error::{CustodyError, CustodyResult, ErrorCode};
use crate::signing::preimage::solana::{
    AddressTableLookup, CompiledInstruction, MessageHeader, Pubkey, SolanaVersion,
};
use crate::signing::preimage::{get_solana_message_bytes, SolanaMessage};
use crate::types::{DelegateSignData, ValidationExpectations};
use crate::utils::{from_json_value, parse_decimal_u64, parse_hex_bytes};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const SYSTEM_PROGRAM_ID: Pubkey = [0u8; 32];
const SYSTEM_TRANSFER_TAG: [u8; 4] = [2, 0, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolanaTransactionType {
    Payment,
    TokenTransfer,
    Stake,
    Unstake,
    WithdrawStake,
}

/// `"legacy"` or a numeric version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SolanaVersionPayload {
    Label(String),
    Number(u8),
}

impl SolanaVersionPayload {
    fn resolve(&self) -> CustodyResult<SolanaVersion> {
        match self {
            Self::Label(label) if label == "legacy" => Ok(SolanaVersion::Legacy),
            Self::Number(0) => Ok(SolanaVersion::V0),
            other => Err(CustodyError::unsupported_type(format!(
                "Solana message version {:?} is not supported",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeaderPayload {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionPayload {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    /// Hex
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressTableLookupPayload {
    pub account_key: String,
    pub writable_indexes: Vec<u8>,
    pub readonly_indexes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaMessagePayload {
    /// Legacy when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<SolanaVersionPayload>,
    pub header: MessageHeaderPayload,
    /// Base58
    pub account_keys: Vec<String>,
    pub recent_blockhash: String,
    pub instructions: Vec<InstructionPayload>,
    #[serde(default)]
    pub address_table_lookups: Vec<AddressTableLookupPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaTransactionRequestPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub transaction_type: SolanaTransactionType,
    pub message: SolanaMessagePayload,
    pub delegate_sign_data: Vec<DelegateSignData>,
}

/// A System Program transfer found in the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTransfer {
    pub from: String,
    pub to: String,
    pub lamports: u64,
}

#[derive(Debug, Clone)]
pub struct SolanaTransactionRequest {
    payload: SolanaTransactionRequestPayload,
    message: SolanaMessage,
    message_bytes: OnceLock<Vec<u8>>,
}

impl SolanaTransactionRequest {
    pub fn new(payload: SolanaTransactionRequestPayload) -> CustodyResult<Self> {
        check_delegate_count(&payload.delegate_sign_data, None)?;
        let raw = &payload.message;

        let message = SolanaMessage {
            version: match &raw.version {
                Some(version) => version.resolve()?,
                None => SolanaVersion::Legacy,
            },
            header: MessageHeader {
                num_required_signatures: raw.header.num_required_signatures,
                num_readonly_signed_accounts: raw.header.num_readonly_signed_accounts,
                num_readonly_unsigned_accounts: raw.header.num_readonly_unsigned_accounts,
            },
            account_keys: raw
                .account_keys
                .iter()
                .map(|key| decode_pubkey(key))
                .collect::<CustodyResult<_>>()?,
            recent_blockhash: decode_pubkey(&raw.recent_blockhash)?,
            instructions: raw
                .instructions
                .iter()
                .map(|ix| {
                    Ok(CompiledInstruction {
                        program_id_index: ix.program_id_index,
                        accounts: ix.accounts.clone(),
                        data: parse_hex_bytes(&ix.data)?,
                    })
                })
                .collect::<CustodyResult<_>>()?,
            address_table_lookups: raw
                .address_table_lookups
                .iter()
                .map(|lookup| {
                    Ok(AddressTableLookup {
                        account_key: decode_pubkey(&lookup.account_key)?,
                        writable_indexes: lookup.writable_indexes.clone(),
                        readonly_indexes: lookup.readonly_indexes.clone(),
                    })
                })
                .collect::<CustodyResult<_>>()?,
        };

        Ok(Self {
            payload,
            message,
            message_bytes: OnceLock::new(),
        })
    }

    pub fn from_value(data: serde_json::Value) -> CustodyResult<Self> {
        Self::new(from_json_value(data)?)
    }

    pub fn id(&self) -> &str {
        &self.payload.id
    }

    pub fn transaction_type(&self) -> SolanaTransactionType {
        self.payload.transaction_type
    }

    pub fn message(&self) -> &SolanaMessage {
        &self.message
    }

    pub fn delegate_sign_data(&self) -> &[DelegateSignData] {
        &self.payload.delegate_sign_data
    }

    pub fn message_bytes(&self) -> CustodyResult<&[u8]> {
        memoized(&self.message_bytes, || Ok(get_solana_message_bytes(&self.message)?))
            .map(Vec::as_slice)
    }

    /// First System Program transfer, if any
    pub fn system_transfer(&self) -> Option<SystemTransfer> {
        self.message.instructions.iter().find_map(|ix| {
            let program = self.message.account_keys.get(usize::from(ix.program_id_index))?;
            if *program != SYSTEM_PROGRAM_ID
                || ix.data.len() != 12
                || ix.data[..4] != SYSTEM_TRANSFER_TAG
            {
                return None;
            }
            let key_at = |slot: usize| {
                let index = usize::from(*ix.accounts.get(slot)?);
                self.message.account_keys.get(index)
            };
            let mut lamports = [0u8; 8];
            lamports.copy_from_slice(&ix.data[4..]);
            Some(SystemTransfer {
                from: bs58::encode(key_at(0)?).into_string(),
                to: bs58::encode(key_at(1)?).into_string(),
                lamports: u64::from_le_bytes(lamports),
            })
        })
    }

    pub fn validate(&self, expectations: &ValidationExpectations) -> CustodyResult<()> {
        self.message_bytes()?;

        let checks_requested = expectations.expected_from.is_some()
            || expectations.expected_to.is_some()
            || expectations.expected_amount.is_some();
        if !checks_requested {
            return Ok(());
        }

        if self.transaction_type() != SolanaTransactionType::Payment {
            return Err(CustodyError::unsupported_type(format!(
                "{:?} transactions cannot be checked against expectations",
                self.transaction_type()
            )));
        }
        let transfer = self.system_transfer().ok_or_else(|| {
            CustodyError::new(
                ErrorCode::InvalidTransaction,
                "payment message carries no System Program transfer",
            )
        })?;

        if let Some(expected_from) = &expectations.expected_from {
            if expected_from != &transfer.from {
                return Err(CustodyError::expectation_mismatch("sender", expected_from, &transfer.from));
            }
        }
        if let Some(expected_to) = &expectations.expected_to {
            if expected_to != &transfer.to {
                return Err(CustodyError::expectation_mismatch("recipient", expected_to, &transfer.to));
            }
        }
        if let Some(expected_amount) = &expectations.expected_amount {
            if parse_decimal_u64(expected_amount, "expectedAmount")? != transfer.lamports {
                return Err(CustodyError::expectation_mismatch(
                    "amount",
                    expected_amount,
                    &transfer.lamports.to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn decode_pubkey(encoded: &str) -> CustodyResult<Pubkey> {
    let bytes = bs58::decode(encoded).into_vec()?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        CustodyError::invalid_address(format!("'{}' decodes to {} bytes, expected 32", encoded, len))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FROM: &str = "4wBqpZM9xaSheZzJSMawUKKwhdpChKbZ5eu5ky4Vigw";
    const TO: &str = "3ELeRTTg5W5hAYaEFznzFV1jknNFkjHqS8ytwvQEQP1Z";

    const LEGACY_HEX: &str = "010001030102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20\
                              2122232425262728292a2b2c2d2e2f303132333435363738393a3b3c3d3e3f40\
                              0000000000000000000000000000000000000000000000000000000000000000\
                              395bf727f9aac5e80911591073fcf9c826f428804131ca089beba3869421749a\
                              01020200010c02000000404b4c0000000000";

    fn request_json(version: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": "sol-req-1",
            "type": "PAYMENT",
            "message": {
                "version": version,
                "header": {
                    "numRequiredSignatures": 1,
                    "numReadonlySignedAccounts": 0,
                    "numReadonlyUnsignedAccounts": 1
                },
                "accountKeys": [FROM, TO, "11111111111111111111111111111111"],
                "recentBlockhash": "4ruaGCyaofHWGxPFXFVjuEJCdfBGZ2wCtEx6LzdzVqtV",
                "instructions": [{
                    "programIdIndex": 2,
                    "accounts": [0, 1],
                    "data": "02000000404b4c0000000000"
                }]
            },
            "delegateSignData": [{
                "hdWalletPath": ["8000002c", "800001f5", "80000000", "0", "0"],
                "unverifiedMessageData": { "message": "", "signData": "", "shaSignData": "" }
            }]
        })
    }

    #[test]
    fn test_legacy_message_bytes() {
        let request = SolanaTransactionRequest::from_value(request_json(serde_json::json!("legacy"))).unwrap();
        assert_eq!(hex::encode(request.message_bytes().unwrap()), LEGACY_HEX);
    }

    #[test]
    fn test_v0_message_bytes() {
        let mut json = request_json(serde_json::json!(0));
        json["message"]["addressTableLookups"] = serde_json::json!([{
            "accountKey": "EumTX84v7edNLNPh32zoaN779cU4bGzWqrGjoA3vah7m",
            "writableIndexes": [3],
            "readonlyIndexes": []
        }]);
        let request = SolanaTransactionRequest::from_value(json).unwrap();
        assert_eq!(
            hex::encode(request.message_bytes().unwrap()),
            format!(
                "80{}01ceac666aa4a77ab17ad8dbd7dc40f730d5dff8f2c070228471e4e27703652d20010300",
                LEGACY_HEX
            )
        );
    }

    #[test]
    fn test_missing_version_is_legacy() {
        let mut json = request_json(serde_json::json!("legacy"));
        json["message"].as_object_mut().unwrap().remove("version");
        let request = SolanaTransactionRequest::from_value(json).unwrap();
        assert_eq!(hex::encode(request.message_bytes().unwrap()), LEGACY_HEX);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let err = SolanaTransactionRequest::from_value(request_json(serde_json::json!(1))).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedType);
    }

    #[test]
    fn test_system_transfer_expectations() {
        let request = SolanaTransactionRequest::from_value(request_json(serde_json::json!("legacy"))).unwrap();
        let transfer = request.system_transfer().unwrap();
        assert_eq!(transfer.lamports, 5_000_000);

        let expectations = ValidationExpectations::default()
            .with_sender(FROM)
            .with_recipient(TO, "5000000");
        request.validate(&expectations).unwrap();

        let err = request
            .validate(&ValidationExpectations::default().with_recipient(FROM, "5000000"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ExpectationMismatch);
    }

    #[test]
    fn test_lamports_tamper_detected() {
        let mut json = request_json(serde_json::json!("legacy"));
        json["message"]["instructions"][0]["data"] = serde_json::json!("02000000414b4c0000000000");
        let request = SolanaTransactionRequest::from_value(json).unwrap();
        assert_ne!(hex::encode(request.message_bytes().unwrap()), LEGACY_HEX);
        let err = request
            .validate(&ValidationExpectations::default().with_recipient(TO, "5000000"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ExpectationMismatch);
    }

    #[test]
    fn test_non_payment_expectations_unsupported() {
        let mut json = request_json(serde_json::json!("legacy"));
        json["type"] = serde_json::json!("STAKE");
        let request = SolanaTransactionRequest::from_value(json).unwrap();
        request.validate(&ValidationExpectations::default()).unwrap();
        let err = request
            .validate(&ValidationExpectations::default().with_sender(FROM))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedType);
    }

    #[test]
    fn test_bad_account_key_rejected() {
        let mut json = request_json(serde_json::json!("legacy"));
        json["message"]["accountKeys"][1] = serde_json::json!("3ELeRTTg5W5hAY");
        let err = SolanaTransactionRequest::from_value(json).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAddress);
    }
}
