//! EIP-712 Type Definitions
//!
//! Core data structures for EIP-712 typed data hashing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CustodyError, ErrorCode};

/// Name of the mandatory domain type
pub const DOMAIN_TYPE: &str = "EIP712Domain";

/// A field in a struct type definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypedDataField {
    /// The name of the field
    pub name: String,
    /// The type of the field (e.g., "address", "uint256", "bytes32", "Person[]")
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Encoding rules, as named by `eth_signTypedData_v3` / `_v4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TypedDataVersion {
    V3,
    #[default]
    V4,
}

/// Complete EIP-712 typed data structure
///
/// The domain is kept as raw JSON and hashed with the `EIP712Domain` type
/// the payload itself declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    /// Type definitions (struct name -> fields)
    pub types: HashMap<String, Vec<TypedDataField>>,

    /// The name of the primary type being signed
    pub primary_type: String,

    /// The EIP-712 domain
    pub domain: serde_json::Value,

    /// The actual message data to sign
    pub message: serde_json::Value,
}

impl TypedData {
    /// Parse typed data from a JSON string
    pub fn from_json(json: &str) -> Result<Self, Eip712Error> {
        serde_json::from_str(json).map_err(|e| Eip712Error::InvalidJson(e.to_string()))
    }

    /// Validate the typed data structure
    pub fn validate(&self) -> Result<(), Eip712Error> {
        if !self.types.contains_key(DOMAIN_TYPE) {
            return Err(Eip712Error::MissingField(format!("types.{}", DOMAIN_TYPE)));
        }

        // Check that primary type exists in types
        if !self.types.contains_key(&self.primary_type) {
            return Err(Eip712Error::InvalidPrimaryType(self.primary_type.clone()));
        }

        // Validate all type references
        for fields in self.types.values() {
            for field in fields {
                self.validate_type(&field.type_name)?;
            }
        }

        Ok(())
    }

    /// Check if a type is valid (either a built-in type or defined in types)
    fn validate_type(&self, type_name: &str) -> Result<(), Eip712Error> {
        // Handle arrays
        let base_type = if type_name.ends_with(']') {
            let bracket_pos = type_name
                .find('[')
                .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;
            &type_name[..bracket_pos]
        } else {
            type_name
        };

        if is_atomic_type(base_type) || is_dynamic_type(base_type) {
            return Ok(());
        }

        if self.types.contains_key(base_type) {
            return Ok(());
        }

        Err(Eip712Error::InvalidType(type_name.to_string()))
    }
}

/// Errors that can occur during EIP-712 operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum Eip712Error {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Invalid primary type: {0}")]
    InvalidPrimaryType(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid value for type {type_name}: {value}")]
    InvalidValue { type_name: String, value: String },

    #[error("Not supported by V3 encoding: {0}")]
    UnsupportedInV3(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl From<Eip712Error> for CustodyError {
    fn from(e: Eip712Error) -> Self {
        let code = match e {
            Eip712Error::InvalidJson(_) => ErrorCode::JsonError,
            Eip712Error::MissingField(_) => ErrorCode::MissingField,
            Eip712Error::InvalidAddress(_) => ErrorCode::InvalidAddress,
            Eip712Error::InvalidType(_)
            | Eip712Error::InvalidPrimaryType(_)
            | Eip712Error::InvalidValue { .. }
            | Eip712Error::UnsupportedInV3(_) => ErrorCode::InvalidInput,
            Eip712Error::EncodingError(_) => ErrorCode::EncodingError,
        };
        CustodyError::new(code, format!("EIP-712: {}", e))
    }
}

/// Check if a type is an atomic (fixed-size) type
pub fn is_atomic_type(type_name: &str) -> bool {
    if type_name == "address" || type_name == "bool" {
        return true;
    }

    // uintN and intN
    let bits = type_name
        .strip_prefix("uint")
        .or_else(|| type_name.strip_prefix("int"));
    if let Some(bits) = bits {
        if let Ok(n) = bits.parse::<u32>() {
            return n > 0 && n <= 256 && n % 8 == 0;
        }
        return false;
    }

    // bytesN (fixed-size bytes)
    if let Some(size) = type_name.strip_prefix("bytes") {
        if let Ok(n) = size.parse::<u32>() {
            return n > 0 && n <= 32;
        }
    }

    false
}

/// Check if a type is a dynamic type
pub fn is_dynamic_type(type_name: &str) -> bool {
    type_name == "bytes" || type_name == "string"
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_atomic_types() {
        assert!(is_atomic_type("address"));
        assert!(is_atomic_type("bool"));
        assert!(is_atomic_type("uint256"));
        assert!(is_atomic_type("uint8"));
        assert!(is_atomic_type("int256"));
        assert!(is_atomic_type("bytes32"));
        assert!(is_atomic_type("bytes1"));

        assert!(!is_atomic_type("string"));
        assert!(!is_atomic_type("bytes"));
        assert!(!is_atomic_type("uint"));
        assert!(!is_atomic_type("uint257"));
        assert!(!is_atomic_type("bytes33"));
    }

    #[test]
    fn test_dynamic_types() {
        assert!(is_dynamic_type("bytes"));
        assert!(is_dynamic_type("string"));

        assert!(!is_dynamic_type("bytes32"));
        assert!(!is_dynamic_type("address"));
    }

    #[test]
    fn test_version_default_and_serde() {
        assert_eq!(TypedDataVersion::default(), TypedDataVersion::V4);
        let v: TypedDataVersion = serde_json::from_str("\"V3\"").unwrap();
        assert_eq!(v, TypedDataVersion::V3);
    }

    #[test]
    fn test_validate_requires_domain_type() {
        let typed = TypedData::from_json(
            r#"{"types":{"Mail":[{"name":"contents","type":"string"}]},
                "primaryType":"Mail","domain":{},"message":{"contents":"hi"}}"#,
        )
        .unwrap();
        assert!(matches!(typed.validate(), Err(Eip712Error::MissingField(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_types() {
        let typed = TypedData::from_json(
            r#"{"types":{"EIP712Domain":[],"Mail":[{"name":"to","type":"Ghost"}]},
                "primaryType":"Mail","domain":{},"message":{}}"#,
        )
        .unwrap();
        assert!(matches!(typed.validate(), Err(Eip712Error::InvalidType(_))));
    }
}
