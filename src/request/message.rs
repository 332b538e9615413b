//! Ethereum message sign requests: `personal_sign` and EIP-712 typed data

use super::{check_delegate_count, memoized};
use crate::eip712::{TypedData, TypedDataVersion, DOMAIN_TYPE};
use crate::error::{CustodyError, CustodyResult, ErrorCode};
use crate::signing::preimage::{personal_sign_hash, typed_data_hash};
use crate::types::DelegateSignData;
use crate::utils::from_json_value;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EthereumMessageType {
    PersonalSign,
    SignTypedData,
}

impl FromStr for EthereumMessageType {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERSONAL_SIGN" => Ok(Self::PersonalSign),
            "SIGN_TYPED_DATA" => Ok(Self::SignTypedData),
            other => Err(CustodyError::new(
                ErrorCode::UnsupportedMessageType,
                format!("Unsupported Ethereum message type: {}", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthereumMessageRequestPayload {
    pub id: String,
    /// `PERSONAL_SIGN` or `SIGN_TYPED_DATA`
    #[serde(rename = "type")]
    pub message_type: String,
    /// Typed-data encoding rules; V4 when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<TypedDataVersion>,
    /// Text or 0x-hex for personal sign, a JSON document for typed data
    pub message: String,
    pub delegate_sign_data: Vec<DelegateSignData>,
}

#[derive(Debug, Clone)]
pub struct EthereumMessageRequest {
    payload: EthereumMessageRequestPayload,
    message_type: EthereumMessageType,
    digest: OnceLock<[u8; 32]>,
}

impl EthereumMessageRequest {
    pub fn new(payload: EthereumMessageRequestPayload) -> CustodyResult<Self> {
        let message_type = payload.message_type.parse()?;
        check_delegate_count(&payload.delegate_sign_data, None)?;
        Ok(Self {
            payload,
            message_type,
            digest: OnceLock::new(),
        })
    }

    pub fn from_value(data: serde_json::Value) -> CustodyResult<Self> {
        Self::new(from_json_value(data)?)
    }

    pub fn id(&self) -> &str {
        &self.payload.id
    }

    pub fn message_type(&self) -> EthereumMessageType {
        self.message_type
    }

    pub fn version(&self) -> TypedDataVersion {
        self.payload.version.unwrap_or_default()
    }

    pub fn delegate_sign_data(&self) -> &[DelegateSignData] {
        &self.payload.delegate_sign_data
    }

    pub fn digest(&self) -> CustodyResult<[u8; 32]> {
        memoized(&self.digest, || match self.message_type {
            EthereumMessageType::PersonalSign => Ok(personal_sign_hash(&self.payload.message)),
            EthereumMessageType::SignTypedData => {
                typed_data_hash(&self.payload.message, self.version())
            }
        })
        .copied()
    }

    /// Typed data must carry a domain, a message and the types both refer to
    pub fn validate(&self) -> CustodyResult<()> {
        if self.message_type == EthereumMessageType::SignTypedData {
            let typed_data = TypedData::from_json(&self.payload.message)?;
            if !typed_data.domain.is_object() {
                return Err(CustodyError::missing_field("domain"));
            }
            if !typed_data.message.is_object() {
                return Err(CustodyError::missing_field("message"));
            }
            if !typed_data.types.contains_key(DOMAIN_TYPE) {
                return Err(CustodyError::missing_field(format!("types.{}", DOMAIN_TYPE)));
            }
            typed_data.validate()?;
        }
        self.digest()?;
        Ok(())
    }
}
