//! Ethereum Pre-Image Hashing
//!
//! The custody service only proposes legacy (type 0) transactions, signed
//! with EIP-155 replay protection.

use crate::utils::keccak256;
use serde::{Deserialize, Serialize};

/// Unsigned legacy Ethereum transaction
///
/// Big integers are held as big-endian magnitudes; leading zero bytes are
/// stripped at encoding time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: Vec<u8>,
    pub gas_limit: Vec<u8>,
    pub to: [u8; 20],
    pub value: Vec<u8>,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

/// keccak256(rlp([nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]))
pub fn get_ethereum_signing_hash(tx: &LegacyTransaction) -> [u8; 32] {
    keccak256(&encode_for_signing(tx))
}

/// EIP-155 signing payload
pub fn encode_for_signing(tx: &LegacyTransaction) -> Vec<u8> {
    rlp_encode_list(&[
        rlp_encode_u64(tx.nonce),
        rlp_encode_uint(&tx.gas_price),
        rlp_encode_uint(&tx.gas_limit),
        rlp_encode_bytes(&tx.to),
        rlp_encode_uint(&tx.value),
        rlp_encode_bytes(&tx.data),
        rlp_encode_u64(tx.chain_id),
        rlp_encode_bytes(&[]),
        rlp_encode_bytes(&[]),
    ])
}

fn rlp_encode_u64(val: u64) -> Vec<u8> {
    rlp_encode_uint(&val.to_be_bytes())
}

/// Canonical RLP integer: no leading zeros, zero is the empty string
fn rlp_encode_uint(magnitude: &[u8]) -> Vec<u8> {
    let leading_zeros = magnitude.iter().take_while(|&&b| b == 0).count();
    rlp_encode_bytes(&magnitude[leading_zeros..])
}

fn rlp_encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return data.to_vec();
    }

    if data.len() < 56 {
        let mut result = vec![0x80 + data.len() as u8];
        result.extend_from_slice(data);
        result
    } else {
        let len_bytes = encode_length(data.len());
        let mut result = vec![0xb7 + len_bytes.len() as u8];
        result.extend_from_slice(&len_bytes);
        result.extend_from_slice(data);
        result
    }
}

fn rlp_encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.concat();

    if payload.len() < 56 {
        let mut result = vec![0xc0 + payload.len() as u8];
        result.extend_from_slice(&payload);
        result
    } else {
        let len_bytes = encode_length(payload.len());
        let mut result = vec![0xf7 + len_bytes.len() as u8];
        result.extend_from_slice(&len_bytes);
        result.extend_from_slice(&payload);
        result
    }
}

fn encode_length(len: usize) -> Vec<u8> {
    let bytes = len.to_be_bytes();
    let leading_zeros = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[leading_zeros..].to_vec()
}
