//! Ethereum message digests: `personal_sign` and EIP-712 typed data

use crate::eip712::{hash_typed_data, TypedData, TypedDataVersion};
use crate::error::CustodyResult;
use crate::utils::keccak256;

const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Bytes a `personal_sign` message stands for: 0x-hex is decoded, anything
/// else is taken as UTF-8 text
pub fn personal_message_bytes(message: &str) -> Vec<u8> {
    if let Some(hex_part) = message.strip_prefix("0x") {
        if let Ok(bytes) = hex::decode(hex_part) {
            return bytes;
        }
    }
    message.as_bytes().to_vec()
}

/// keccak256("\x19Ethereum Signed Message:\n" ‖ len ‖ message)
pub fn personal_sign_hash(message: &str) -> [u8; 32] {
    let bytes = personal_message_bytes(message);
    let mut data = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + bytes.len());
    data.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    data.extend_from_slice(bytes.len().to_string().as_bytes());
    data.extend_from_slice(&bytes);
    keccak256(&data)
}

/// EIP-712 digest of a JSON typed-data payload
pub fn typed_data_hash(json: &str, version: TypedDataVersion) -> CustodyResult<[u8; 32]> {
    let typed_data = TypedData::from_json(json)?;
    Ok(hash_typed_data(&typed_data, version)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_personal_sign_hello_world() {
        assert_eq!(
            hex::encode(personal_sign_hash("Hello World")),
            "a1de988600a42c4b4ab089b619297c17d53cffae5d5120d82d8a92d0bb3b78f2"
        );
    }

    #[test]
    fn test_personal_sign_hex_message() {
        let hex_message = format!("0x{}", hex::encode("Hello World"));
        assert_eq!(personal_sign_hash(&hex_message), personal_sign_hash("Hello World"));
        // Not valid hex: hashed as text
        assert_eq!(personal_message_bytes("0xzz"), b"0xzz".to_vec());
    }

    #[test]
    fn test_typed_data_bad_json() {
        let err = typed_data_hash("{not json", TypedDataVersion::V4).unwrap_err();
        assert_eq!(err.code, ErrorCode::JsonError);
    }
}
