//! Bitcoin transaction requests
//!
//! One delegate entry per input, each signing that input's BIP-143 sighash.
//! Validation proves every input key and every change-output key came from
//! the custody service before anything is signed.

use super::{check_delegate_count, memoized};
use crate::config::{BitcoinNetwork, TrustProfile};
use crate::crypto::{compress_public_key, parse_public_key, CurveType};
use crate::error::{CustodyError, CustodyResult};
use crate::log_debug;
use crate::provenance::{verify_change_output, verify_provenance, PublicKeyProvenanceData};
use crate::serde_bytes::hex_bytes;
use crate::signing::preimage::bitcoin::{serialize_unsigned, txid, BitcoinInput, BitcoinOutput};
use crate::signing::preimage::{get_bitcoin_sighashes, UnsignedBitcoinTransaction};
use crate::types::{DelegateSignData, ValidationExpectations};
use crate::utils::{from_json_value, parse_decimal_u64, parse_hex_array};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

const DEFAULT_SEQUENCE: u32 = 0xffff_ffff;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinInputPayload {
    /// Previous transaction id, display order
    pub tx_id: String,
    pub output_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    pub value: u64,
    /// Uncompressed secp256k1 key controlling the spent output
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_provenance_data: Option<PublicKeyProvenanceData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinOutputPayload {
    pub address: String,
    pub value: u64,
    /// Present on change outputs only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_provenance_data: Option<PublicKeyProvenanceData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinTransactionPayload {
    pub version: i32,
    #[serde(default)]
    pub lock_time: u32,
    pub inputs: Vec<BitcoinInputPayload>,
    pub outputs: Vec<BitcoinOutputPayload>,
}

/// `BITCOIN_TRANSACTION_CREATED` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinTransactionRequestPayload {
    pub id: String,
    pub transaction: BitcoinTransactionPayload,
    pub delegate_sign_data: Vec<DelegateSignData>,
}

#[derive(Debug, Clone)]
pub struct BitcoinTransactionRequest {
    payload: BitcoinTransactionRequestPayload,
    network: BitcoinNetwork,
    transaction: UnsignedBitcoinTransaction,
    sighashes: OnceLock<Vec<[u8; 32]>>,
}

impl BitcoinTransactionRequest {
    /// Schema-check the payload and build the unsigned transaction
    pub fn new(
        payload: BitcoinTransactionRequestPayload,
        network: BitcoinNetwork,
    ) -> CustodyResult<Self> {
        let tx = &payload.transaction;
        if tx.inputs.is_empty() {
            return Err(CustodyError::missing_field("transaction.inputs"));
        }
        if tx.outputs.is_empty() {
            return Err(CustodyError::missing_field("transaction.outputs"));
        }
        check_delegate_count(&payload.delegate_sign_data, Some(tx.inputs.len()))?;

        let inputs = tx
            .inputs
            .iter()
            .map(|input| {
                Ok(BitcoinInput {
                    txid: parse_hex_array::<32>(&input.tx_id, "txId")?,
                    vout: input.output_index,
                    sequence: input.sequence.unwrap_or(DEFAULT_SEQUENCE),
                    value: input.value,
                    public_key: compress_public_key(CurveType::Secp256k1, &input.public_key)?,
                })
            })
            .collect::<CustodyResult<Vec<_>>>()?;

        let outputs = tx
            .outputs
            .iter()
            .map(|output| {
                Ok(BitcoinOutput {
                    value: output.value,
                    script_pubkey: address_script(&output.address, network)?,
                })
            })
            .collect::<CustodyResult<Vec<_>>>()?;

        let transaction = UnsignedBitcoinTransaction {
            version: tx.version,
            inputs,
            outputs,
            locktime: tx.lock_time,
        };

        Ok(Self {
            payload,
            network,
            transaction,
            sighashes: OnceLock::new(),
        })
    }

    pub fn from_value(data: serde_json::Value, network: BitcoinNetwork) -> CustodyResult<Self> {
        Self::new(from_json_value(data)?, network)
    }

    pub fn id(&self) -> &str {
        &self.payload.id
    }

    pub fn payload(&self) -> &BitcoinTransactionRequestPayload {
        &self.payload
    }

    pub fn network(&self) -> BitcoinNetwork {
        self.network
    }

    pub fn transaction(&self) -> &UnsignedBitcoinTransaction {
        &self.transaction
    }

    pub fn delegate_sign_data(&self) -> &[DelegateSignData] {
        &self.payload.delegate_sign_data
    }

    /// Sighashes for all inputs, in input order
    pub fn sighashes(&self) -> CustodyResult<&[[u8; 32]]> {
        let hashes = memoized(&self.sighashes, || Ok(get_bitcoin_sighashes(&self.transaction)?))?;
        Ok(hashes.as_slice())
    }

    pub fn sighash(&self, index: usize) -> CustodyResult<[u8; 32]> {
        self.sighashes()?.get(index).copied().ok_or_else(|| {
            CustodyError::invalid_input(format!("no input for delegate entry {}", index))
        })
    }

    /// Unsigned raw transaction, hex
    pub fn raw_transaction_hex(&self) -> String {
        hex::encode(serialize_unsigned(&self.transaction))
    }

    pub fn txid_hex(&self) -> String {
        hex::encode(txid(&self.transaction))
    }

    /// Uncompressed key the signer must answer with for input `index`
    pub fn input_public_key(&self, index: usize) -> Option<Vec<u8>> {
        let input = self.payload.transaction.inputs.get(index)?;
        parse_public_key(CurveType::Secp256k1, &input.public_key)
            .ok()
            .map(|key| key.to_vec())
    }

    /// Provenance of every input and change output, then the caller's
    /// expected recipient against the first output
    pub fn validate(
        &self,
        trust: &TrustProfile,
        expectations: &ValidationExpectations,
    ) -> CustodyResult<()> {
        let sub_wallet_id = expectations
            .sub_wallet_id
            .as_deref()
            .ok_or_else(|| CustodyError::missing_field("subWalletId"))?;
        let trusted = trust.custody_keys();

        for (i, input) in self.payload.transaction.inputs.iter().enumerate() {
            let provenance = input.public_key_provenance_data.as_ref().ok_or_else(|| {
                CustodyError::provenance_missing(format!("input {} has no publicKeyProvenanceData", i))
            })?;
            verify_provenance(
                sub_wallet_id,
                &provenance.path,
                &input.public_key,
                provenance.signature.as_deref(),
                trusted,
            )?;
        }

        for (i, output) in self.payload.transaction.outputs.iter().enumerate() {
            let Some(provenance) = &output.public_key_provenance_data else {
                continue;
            };
            let public_key = provenance.public_key.as_deref().ok_or_else(|| {
                CustodyError::provenance_missing(format!("change output {} has no publicKey", i))
            })?;
            verify_provenance(
                sub_wallet_id,
                &provenance.path,
                public_key,
                provenance.signature.as_deref(),
                trusted,
            )?;
            verify_change_output(public_key, &output.address, self.network)?;
            log_debug!("request", "Change output verified", index = i, address = &output.address);
        }

        self.check_recipient(expectations)
    }

    fn check_recipient(&self, expectations: &ValidationExpectations) -> CustodyResult<()> {
        let Some(first) = self.payload.transaction.outputs.first() else {
            return Err(CustodyError::missing_field("transaction.outputs"));
        };

        if let Some(expected_to) = &expectations.expected_to {
            if expected_to != &first.address {
                return Err(CustodyError::expectation_mismatch(
                    "recipient address",
                    expected_to,
                    &first.address,
                ));
            }
        }
        if let Some(expected_amount) = &expectations.expected_amount {
            let expected = parse_decimal_u64(expected_amount, "expectedAmount")?;
            if expected != first.value {
                return Err(CustodyError::expectation_mismatch(
                    "recipient amount",
                    expected_amount,
                    &first.value.to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Output script for an address on the configured network
fn address_script(address: &str, network: BitcoinNetwork) -> CustodyResult<Vec<u8>> {
    let address = bitcoin::Address::from_str(address)?.require_network(network.to_network())?;
    Ok(address.script_pubkey().to_bytes())
}
