//! Cardano transaction requests
//!
//! Payment, stake, unstake and withdrawal share one body encoding. The
//! declared type only decides which optional body keys are populated.

use super::{check_delegate_count, memoized};
use crate::error::{CustodyError, CustodyResult};
use crate::signing::preimage::cardano::{
    decode_bech32, decode_pool_id, network_id, reward_address, stake_key_hash, CardanoInput,
    CardanoOutput, Certificate,
};
use crate::signing::preimage::{get_cardano_body_hash, CardanoTransactionBody};
use crate::types::{DelegateSignData, ValidationExpectations};
use crate::utils::{from_json_value, parse_decimal_u64, parse_hex_array, parse_hex_bytes};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardanoTransactionType {
    Payment,
    Stake,
    Unstake,
    Withdrawal,
}

impl fmt::Display for CardanoTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Payment => "PAYMENT",
            Self::Stake => "STAKE",
            Self::Unstake => "UNSTAKE",
            Self::Withdrawal => "WITHDRAWAL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardanoInputPayload {
    pub tx_id: String,
    pub index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardanoOutputPayload {
    /// Bech32 `addr...`
    pub address: String,
    /// Lovelace, decimal
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardanoTransactionPayload {
    pub inputs: Vec<CardanoInputPayload>,
    pub outputs: Vec<CardanoOutputPayload>,
    pub fee: String,
    pub ttl: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawal_amount: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardanoTransactionRequestPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub transaction_type: CardanoTransactionType,
    pub transaction: CardanoTransactionPayload,
    pub delegate_sign_data: Vec<DelegateSignData>,
}

#[derive(Debug, Clone)]
pub struct CardanoTransactionRequest {
    payload: CardanoTransactionRequestPayload,
    body: CardanoTransactionBody,
    digest: OnceLock<[u8; 32]>,
}

impl CardanoTransactionRequest {
    pub fn new(payload: CardanoTransactionRequestPayload) -> CustodyResult<Self> {
        check_delegate_count(&payload.delegate_sign_data, None)?;
        let tx = &payload.transaction;

        let inputs = tx
            .inputs
            .iter()
            .map(|input| {
                Ok(CardanoInput {
                    tx_id: parse_hex_array::<32>(&input.tx_id, "txId")?,
                    index: input.index,
                })
            })
            .collect::<CustodyResult<Vec<_>>>()?;
        let outputs = tx
            .outputs
            .iter()
            .map(|output| {
                Ok(CardanoOutput {
                    address: decode_bech32(&output.address, "addr")?,
                    amount: parse_decimal_u64(&output.amount, "amount")?,
                })
            })
            .collect::<CustodyResult<Vec<_>>>()?;

        let mut body = CardanoTransactionBody {
            inputs,
            outputs,
            fee: parse_decimal_u64(&tx.fee, "fee")?,
            ttl: tx.ttl,
            ..Default::default()
        };
        populate_staking(&mut body, payload.transaction_type, tx)?;

        Ok(Self {
            payload,
            body,
            digest: OnceLock::new(),
        })
    }

    pub fn from_value(data: serde_json::Value) -> CustodyResult<Self> {
        Self::new(from_json_value(data)?)
    }

    pub fn id(&self) -> &str {
        &self.payload.id
    }

    pub fn transaction_type(&self) -> CardanoTransactionType {
        self.payload.transaction_type
    }

    pub fn body(&self) -> &CardanoTransactionBody {
        &self.body
    }

    pub fn delegate_sign_data(&self) -> &[DelegateSignData] {
        &self.payload.delegate_sign_data
    }

    pub fn digest(&self) -> CustodyResult<[u8; 32]> {
        memoized(&self.digest, || Ok(get_cardano_body_hash(&self.body)?)).copied()
    }

    /// Recipient and amount are read from the first output
    pub fn validate(&self, expectations: &ValidationExpectations) -> CustodyResult<()> {
        let first = self.payload.transaction.outputs.first();
        if first.is_none()
            && (expectations.expected_to.is_some() || expectations.expected_amount.is_some())
        {
            return Err(CustodyError::missing_field("transaction.outputs"));
        }
        self.digest()?;

        let Some(first) = first else {
            return Ok(());
        };
        if let Some(expected_to) = &expectations.expected_to {
            if !expected_to.eq_ignore_ascii_case(&first.address) {
                return Err(CustodyError::expectation_mismatch(
                    "recipient",
                    expected_to,
                    &first.address,
                ));
            }
        }
        if let Some(expected_amount) = &expectations.expected_amount {
            if parse_decimal_u64(expected_amount, "expectedAmount")? != self.body.outputs[0].amount {
                return Err(CustodyError::expectation_mismatch(
                    "amount",
                    expected_amount,
                    &first.amount,
                ));
            }
        }
        Ok(())
    }
}

fn populate_staking(
    body: &mut CardanoTransactionBody,
    transaction_type: CardanoTransactionType,
    tx: &CardanoTransactionPayload,
) -> CustodyResult<()> {
    let stake_hash = || -> CustodyResult<[u8; 28]> {
        let key = tx
            .stake_public_key
            .as_deref()
            .ok_or_else(|| CustodyError::missing_field("stakePublicKey"))?;
        Ok(stake_key_hash(&parse_hex_bytes(key)?))
    };

    match transaction_type {
        CardanoTransactionType::Payment => {}
        CardanoTransactionType::Stake => {
            let pool_id = tx
                .pool_id
                .as_deref()
                .ok_or_else(|| CustodyError::missing_field("poolId"))?;
            let key_hash = stake_hash()?;
            body.certificates = vec![
                Certificate::StakeRegistration { stake_key_hash: key_hash },
                Certificate::StakeDelegation {
                    stake_key_hash: key_hash,
                    pool_key_hash: decode_pool_id(pool_id)?,
                },
            ];
        }
        CardanoTransactionType::Unstake => {
            body.certificates = vec![Certificate::StakeDeregistration {
                stake_key_hash: stake_hash()?,
            }];
        }
        CardanoTransactionType::Withdrawal => {
            let amount = tx
                .withdrawal_amount
                .as_deref()
                .ok_or_else(|| CustodyError::missing_field("withdrawalAmount"))?;
            let network = body
                .outputs
                .first()
                .ok_or_else(|| CustodyError::invalid_input("withdrawal needs an output to derive the network"))
                .and_then(|output| Ok(network_id(&output.address)?))?;
            body.withdrawals = vec![(
                reward_address(network, &stake_hash()?),
                parse_decimal_u64(amount, "withdrawalAmount")?,
            )];
        }
    }
    Ok(())
}
