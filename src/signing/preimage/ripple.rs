//! Ripple (XRP Ledger) Pre-Image Hashing
//!
//! Single-signing serialization of a Payment: the `STX\0` prefix followed by
//! fields in canonical (type code, field code) order. The digest is the
//! first half of SHA-512.

use super::{PreImageError, PreImageResult};
use crate::utils::sha512_half;
use serde::{Deserialize, Serialize};

const SIGNING_PREFIX: [u8; 4] = [0x53, 0x54, 0x58, 0x00];
const PAYMENT_TRANSACTION_TYPE: u16 = 0;

/// Largest XRP amount expressible in drops
pub const MAX_DROPS: u64 = 100_000_000_000_000_000;

const NATIVE_AMOUNT_FLAG: u64 = 0x4000_0000_0000_0000;

// Field headers: high nibble type code, low nibble field code
const FIELD_TRANSACTION_TYPE: &[u8] = &[0x12];
const FIELD_FLAGS: &[u8] = &[0x22];
const FIELD_SEQUENCE: &[u8] = &[0x24];
const FIELD_DESTINATION_TAG: &[u8] = &[0x2e];
const FIELD_LAST_LEDGER_SEQUENCE: &[u8] = &[0x20, 0x1b];
const FIELD_AMOUNT: &[u8] = &[0x61];
const FIELD_FEE: &[u8] = &[0x68];
const FIELD_SIGNING_PUB_KEY: &[u8] = &[0x73];
const FIELD_ACCOUNT: &[u8] = &[0x81];
const FIELD_DESTINATION: &[u8] = &[0x83];

/// XRP-denominated Payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RipplePayment {
    pub account: [u8; 20],
    pub destination: [u8; 20],
    /// Drops
    pub amount: u64,
    /// Drops
    pub fee: u64,
    pub sequence: u32,
    pub flags: Option<u32>,
    pub destination_tag: Option<u32>,
    pub last_ledger_sequence: Option<u32>,
    pub signing_pub_key: Option<Vec<u8>>,
}

/// SHA-512-half of the signing serialization
pub fn get_ripple_signing_hash(payment: &RipplePayment) -> PreImageResult<[u8; 32]> {
    Ok(sha512_half(&encode_for_signing(payment)?))
}

pub fn encode_for_signing(payment: &RipplePayment) -> PreImageResult<Vec<u8>> {
    let mut out = Vec::with_capacity(160);
    out.extend_from_slice(&SIGNING_PREFIX);

    out.extend_from_slice(FIELD_TRANSACTION_TYPE);
    out.extend_from_slice(&PAYMENT_TRANSACTION_TYPE.to_be_bytes());

    if let Some(flags) = payment.flags {
        out.extend_from_slice(FIELD_FLAGS);
        out.extend_from_slice(&flags.to_be_bytes());
    }

    out.extend_from_slice(FIELD_SEQUENCE);
    out.extend_from_slice(&payment.sequence.to_be_bytes());

    if let Some(tag) = payment.destination_tag {
        out.extend_from_slice(FIELD_DESTINATION_TAG);
        out.extend_from_slice(&tag.to_be_bytes());
    }

    if let Some(lls) = payment.last_ledger_sequence {
        out.extend_from_slice(FIELD_LAST_LEDGER_SEQUENCE);
        out.extend_from_slice(&lls.to_be_bytes());
    }

    out.extend_from_slice(FIELD_AMOUNT);
    out.extend_from_slice(&native_amount(payment.amount, "amount")?);

    out.extend_from_slice(FIELD_FEE);
    out.extend_from_slice(&native_amount(payment.fee, "fee")?);

    if let Some(key) = &payment.signing_pub_key {
        out.extend_from_slice(FIELD_SIGNING_PUB_KEY);
        write_vl_length(&mut out, key.len())?;
        out.extend_from_slice(key);
    }

    out.extend_from_slice(FIELD_ACCOUNT);
    out.push(20);
    out.extend_from_slice(&payment.account);

    out.extend_from_slice(FIELD_DESTINATION);
    out.push(20);
    out.extend_from_slice(&payment.destination);

    Ok(out)
}

fn native_amount(drops: u64, field: &str) -> PreImageResult<[u8; 8]> {
    if drops > MAX_DROPS {
        return Err(PreImageError::InvalidTransaction(format!(
            "{} of {} drops exceeds the XRP supply",
            field, drops
        )));
    }
    Ok((NATIVE_AMOUNT_FLAG | drops).to_be_bytes())
}

/// Variable-length prefix for blob fields
fn write_vl_length(out: &mut Vec<u8>, len: usize) -> PreImageResult<()> {
    match len {
        0..=192 => out.push(len as u8),
        193..=12_480 => {
            let rest = len - 193;
            out.push(193 + (rest >> 8) as u8);
            out.push((rest & 0xff) as u8);
        }
        _ => {
            return Err(PreImageError::EncodingError(format!(
                "blob of {} bytes is too long",
                len
            )))
        }
    }
    Ok(())
}
