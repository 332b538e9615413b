//! EIP-712 Hashing
//!
//! Computes struct hashes and the final `\x19\x01` signing digest.

use super::encoder::{encode_data, TypeMap};
use super::types::*;
use crate::utils::keccak256;

/// hashStruct(s) = keccak256(encodeData(s))
pub fn hash_struct(
    type_name: &str,
    data: &serde_json::Value,
    types: &TypeMap,
    version: TypedDataVersion,
) -> Result<[u8; 32], Eip712Error> {
    let encoded = encode_data(type_name, data, types, version)?;
    Ok(keccak256(&encoded))
}

/// Hash of the domain using the payload's own `EIP712Domain` definition
pub fn domain_separator(
    typed_data: &TypedData,
    version: TypedDataVersion,
) -> Result<[u8; 32], Eip712Error> {
    hash_struct(DOMAIN_TYPE, &typed_data.domain, &typed_data.types, version)
}

/// Final digest: keccak256("\x19\x01" ‖ domainSeparator ‖ hashStruct(message))
///
/// When the primary type is the domain itself the message hash is omitted.
pub fn hash_typed_data(
    typed_data: &TypedData,
    version: TypedDataVersion,
) -> Result<[u8; 32], Eip712Error> {
    typed_data.validate()?;

    let mut data = Vec::with_capacity(66);
    data.extend_from_slice(&[0x19, 0x01]);
    data.extend_from_slice(&domain_separator(typed_data, version)?);

    if typed_data.primary_type != DOMAIN_TYPE {
        data.extend_from_slice(&hash_struct(
            &typed_data.primary_type,
            &typed_data.message,
            &typed_data.types,
            version,
        )?);
    }

    Ok(keccak256(&data))
}
