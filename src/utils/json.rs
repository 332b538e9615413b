//! JSON and numeric parsing utilities
//!
//! Untrusted payload fields pass through these helpers so that malformed
//! input always surfaces as a schema error.

use crate::error::{CustodyError, CustodyResult, ErrorCode};
use serde::de::DeserializeOwned;

/// Parse a JSON string into a type
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> CustodyResult<T> {
    serde_json::from_str(json_str).map_err(|e| {
        CustodyError::new(ErrorCode::JsonError, format!("JSON parse error: {}", e))
    })
}

/// Deserialize an already-parsed JSON value into a type
pub fn from_json_value<T: DeserializeOwned>(value: serde_json::Value) -> CustodyResult<T> {
    serde_json::from_value(value).map_err(|e| {
        CustodyError::new(ErrorCode::JsonError, format!("Payload does not match schema: {}", e))
    })
}

pub fn strip_hex_prefix(hex_str: &str) -> &str {
    hex_str
        .strip_prefix("0x")
        .or_else(|| hex_str.strip_prefix("0X"))
        .unwrap_or(hex_str)
}

/// Parse hex string (optional 0x prefix) to bytes
pub fn parse_hex_bytes(hex_str: &str) -> CustodyResult<Vec<u8>> {
    hex::decode(strip_hex_prefix(hex_str.trim())).map_err(|e| {
        CustodyError::new(ErrorCode::HexError, format!("Invalid hex '{}': {}", hex_str, e))
    })
}

/// Parse hex string into a fixed-size array
pub fn parse_hex_array<const N: usize>(hex_str: &str, field: &str) -> CustodyResult<[u8; N]> {
    let bytes = parse_hex_bytes(hex_str)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        CustodyError::invalid_input(format!("{} must be {} bytes, got {}", field, N, len))
    })
}

/// Parse hex string to u32 (HD path elements)
pub fn parse_hex_u32(hex_str: &str) -> CustodyResult<u32> {
    let cleaned = strip_hex_prefix(hex_str.trim());
    u32::from_str_radix(cleaned, 16).map_err(|e| {
        CustodyError::invalid_input(format!("Invalid hex u32 '{}': {}", hex_str, e))
    })
}

/// Parse an unsigned decimal string of any size into minimal big-endian bytes.
///
/// Zero encodes as an empty vector, matching RLP canonical integers.
pub fn parse_decimal_bytes(decimal: &str) -> CustodyResult<Vec<u8>> {
    let trimmed = decimal.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CustodyError::invalid_input(format!(
            "Invalid decimal integer '{}'",
            decimal
        )));
    }

    let mut value: Vec<u8> = Vec::new();
    for digit in trimmed.bytes().map(|b| b - b'0') {
        let mut carry = digit as u32;
        for byte in value.iter_mut().rev() {
            let acc = (*byte as u32) * 10 + carry;
            *byte = (acc & 0xff) as u8;
            carry = acc >> 8;
        }
        while carry > 0 {
            value.insert(0, (carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let first_nonzero = value.iter().position(|&b| b != 0).unwrap_or(value.len());
    Ok(value.split_off(first_nonzero))
}

/// Parse an unsigned decimal string that must fit in a u64
pub fn parse_decimal_u64(decimal: &str, field: &str) -> CustodyResult<u64> {
    decimal.trim().parse::<u64>().map_err(|e| {
        CustodyError::invalid_input(format!("{} must be an unsigned integer: {}", field, e))
    })
}
