//! EIP-712 Type Encoding
//!
//! Implements `encodeType` and `encodeData` under both the V3 and V4 rule
//! sets. The two differ in how absent values and arrays are treated, so
//! each has its own field encoder.

use super::types::*;
use crate::utils::{keccak256, parse_decimal_bytes};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

pub type TypeMap = HashMap<String, Vec<TypedDataField>>;

/// Encode a type string for a struct type
/// Format: "TypeName(type1 name1,type2 name2,...)"
pub fn encode_type(type_name: &str, types: &TypeMap) -> Result<String, Eip712Error> {
    let fields = types
        .get(type_name)
        .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;

    // Primary type first, then dependencies alphabetically
    let mut result = format_type_string(type_name, fields);

    let mut sorted_deps: Vec<_> = find_type_dependencies(type_name, types)
        .into_iter()
        .filter(|dep| dep != type_name)
        .collect();
    sorted_deps.sort();

    for dep in sorted_deps {
        if let Some(dep_fields) = types.get(&dep) {
            result.push_str(&format_type_string(&dep, dep_fields));
        }
    }

    Ok(result)
}

fn format_type_string(type_name: &str, fields: &[TypedDataField]) -> String {
    let field_strs: Vec<String> = fields
        .iter()
        .map(|f| format!("{} {}", f.type_name, f.name))
        .collect();

    format!("{}({})", type_name, field_strs.join(","))
}

/// Find all struct types reachable from `type_name`, itself included
pub fn find_type_dependencies(type_name: &str, types: &TypeMap) -> HashSet<String> {
    let mut dependencies = HashSet::new();
    let mut to_visit = vec![type_name.to_string()];

    while let Some(current) = to_visit.pop() {
        if dependencies.contains(&current) {
            continue;
        }

        if let Some(fields) = types.get(&current) {
            dependencies.insert(current.clone());

            for field in fields {
                let base_type = get_base_type(&field.type_name);
                if types.contains_key(base_type) && !dependencies.contains(base_type) {
                    to_visit.push(base_type.to_string());
                }
            }
        }
    }

    dependencies
}

/// Get the base type from a potentially array type
/// e.g., "Person[]" -> "Person", "uint256[10]" -> "uint256"
pub fn get_base_type(type_name: &str) -> &str {
    match type_name.find('[') {
        Some(bracket_pos) => &type_name[..bracket_pos],
        None => type_name,
    }
}

/// typeHash = keccak256(encodeType(typeOf(s)))
pub fn type_hash(type_name: &str, types: &TypeMap) -> Result<[u8; 32], Eip712Error> {
    let encoded = encode_type(type_name, types)?;
    Ok(keccak256(encoded.as_bytes()))
}

/// `encodeData`: the type hash followed by one 32-byte word per encoded field
pub fn encode_data(
    type_name: &str,
    data: &Value,
    types: &TypeMap,
    version: TypedDataVersion,
) -> Result<Vec<u8>, Eip712Error> {
    let fields = types
        .get(type_name)
        .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;
    let obj = as_object(type_name, data)?;

    let mut encoded = type_hash(type_name, types)?.to_vec();

    for field in fields {
        let value = obj.get(&field.name);
        let word = match version {
            TypedDataVersion::V3 => encode_field_v3(field, value, types)?,
            TypedDataVersion::V4 => encode_field_v4(&field.name, &field.type_name, value, types)?,
        };
        if let Some(word) = word {
            encoded.extend_from_slice(&word);
        }
    }

    Ok(encoded)
}

fn as_object<'a>(type_name: &str, data: &'a Value) -> Result<&'a Map<String, Value>, Eip712Error> {
    data.as_object().ok_or_else(|| Eip712Error::InvalidValue {
        type_name: type_name.to_string(),
        value: data.to_string(),
    })
}

/// V3 rules: undefined fields are skipped, struct fields must be present
/// and non-null, arrays are rejected.
fn encode_field_v3(
    field: &TypedDataField,
    value: Option<&Value>,
    types: &TypeMap,
) -> Result<Option<[u8; 32]>, Eip712Error> {
    let Some(value) = value else {
        return Ok(None);
    };
    let type_name = field.type_name.as_str();

    if types.contains_key(type_name) {
        if value.is_null() {
            return Err(Eip712Error::UnsupportedInV3(format!(
                "null value for struct field '{}'",
                field.name
            )));
        }
        let inner = encode_data(type_name, value, types, TypedDataVersion::V3)?;
        return Ok(Some(keccak256(&inner)));
    }

    if is_dynamic_type(type_name) {
        if value.is_null() {
            return Ok(None);
        }
        return Ok(Some(keccak256(&dynamic_bytes(type_name, value)?)));
    }

    if type_name.ends_with(']') {
        return Err(Eip712Error::UnsupportedInV3(format!(
            "array field '{}' of type {}",
            field.name, type_name
        )));
    }

    encode_atomic(type_name, value).map(Some)
}

/// V4 rules: absent struct values hash to zero, arrays are supported,
/// any other undefined field is an error.
fn encode_field_v4(
    field_name: &str,
    type_name: &str,
    value: Option<&Value>,
    types: &TypeMap,
) -> Result<Option<[u8; 32]>, Eip712Error> {
    if types.contains_key(type_name) {
        return match value {
            None | Some(Value::Null) => Ok(Some([0u8; 32])),
            Some(v) => {
                let inner = encode_data(type_name, v, types, TypedDataVersion::V4)?;
                Ok(Some(keccak256(&inner)))
            }
        };
    }

    let value = value.ok_or_else(|| {
        Eip712Error::MissingField(format!("{} of type {}", field_name, type_name))
    })?;

    if is_dynamic_type(type_name) {
        if value.is_null() {
            return Ok(None);
        }
        return Ok(Some(keccak256(&dynamic_bytes(type_name, value)?)));
    }

    if type_name.ends_with(']') {
        let bracket_pos = type_name
            .rfind('[')
            .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;
        let element_type = &type_name[..bracket_pos];
        let items = value.as_array().ok_or_else(|| Eip712Error::InvalidValue {
            type_name: type_name.to_string(),
            value: value.to_string(),
        })?;

        let mut concatenated = Vec::with_capacity(items.len() * 32);
        for item in items {
            if let Some(word) = encode_field_v4(field_name, element_type, Some(item), types)? {
                concatenated.extend_from_slice(&word);
            }
        }
        return Ok(Some(keccak256(&concatenated)));
    }

    encode_atomic(type_name, value).map(Some)
}

/// Raw bytes of a `string` or `bytes` value before hashing.
///
/// `bytes` accepts 0x-prefixed hex and falls back to the UTF-8 text.
fn dynamic_bytes(type_name: &str, value: &Value) -> Result<Vec<u8>, Eip712Error> {
    let s = value.as_str().ok_or_else(|| Eip712Error::InvalidValue {
        type_name: type_name.to_string(),
        value: value.to_string(),
    })?;

    if type_name == "bytes" {
        if let Some(hex_part) = s.strip_prefix("0x") {
            return hex::decode(hex_part)
                .map_err(|e| Eip712Error::EncodingError(format!("invalid hex: {}", e)));
        }
    }
    Ok(s.as_bytes().to_vec())
}

/// Encode an atomic (fixed-size) value as one 32-byte word
pub fn encode_atomic(type_name: &str, value: &Value) -> Result<[u8; 32], Eip712Error> {
    let invalid = || Eip712Error::InvalidValue {
        type_name: type_name.to_string(),
        value: value.to_string(),
    };
    let mut result = [0u8; 32];

    // address - 20 bytes, left-padded to 32
    if type_name == "address" {
        let addr = value.as_str().ok_or_else(invalid)?;
        result[12..].copy_from_slice(&parse_address(addr)?);
        return Ok(result);
    }

    if type_name == "bool" {
        let b = match value {
            Value::Bool(b) => *b,
            Value::String(s) if s == "true" => true,
            Value::String(s) if s == "false" => false,
            _ => return Err(invalid()),
        };
        result[31] = u8::from(b);
        return Ok(result);
    }

    if let Some(bits) = type_name.strip_prefix("uint") {
        let bits: usize = bits.parse().map_err(|_| Eip712Error::InvalidType(type_name.to_string()))?;
        let (negative, magnitude) = parse_integer(type_name, value)?;
        if negative && !magnitude.is_empty() {
            return Err(invalid());
        }
        if magnitude.len() * 8 > bits {
            return Err(invalid());
        }
        result[32 - magnitude.len()..].copy_from_slice(&magnitude);
        return Ok(result);
    }

    if let Some(bits) = type_name.strip_prefix("int") {
        let bits: usize = bits.parse().map_err(|_| Eip712Error::InvalidType(type_name.to_string()))?;
        let (negative, magnitude) = parse_integer(type_name, value)?;
        if magnitude.len() * 8 > bits {
            return Err(invalid());
        }
        result[32 - magnitude.len()..].copy_from_slice(&magnitude);
        if negative {
            twos_complement(&mut result);
        }
        return Ok(result);
    }

    // bytesN (fixed-size bytes, right-padded)
    if let Some(size) = type_name.strip_prefix("bytes") {
        let size: usize = size.parse().map_err(|_| Eip712Error::InvalidType(type_name.to_string()))?;
        let hex_str = value.as_str().ok_or_else(invalid)?;
        let bytes = parse_hex(hex_str)?;
        if bytes.len() > size {
            return Err(Eip712Error::InvalidValue {
                type_name: type_name.to_string(),
                value: format!("bytes too long: {} > {}", bytes.len(), size),
            });
        }
        result[..bytes.len()].copy_from_slice(&bytes);
        return Ok(result);
    }

    Err(Eip712Error::InvalidType(type_name.to_string()))
}

/// Parse an Ethereum address
fn parse_address(addr: &str) -> Result<[u8; 20], Eip712Error> {
    let addr = addr.strip_prefix("0x").unwrap_or(addr);

    if addr.len() != 40 {
        return Err(Eip712Error::InvalidAddress(format!(
            "invalid length: expected 40 hex chars, got {}",
            addr.len()
        )));
    }

    let bytes = hex::decode(addr)
        .map_err(|e| Eip712Error::InvalidAddress(format!("invalid hex: {}", e)))?;

    let mut result = [0u8; 20];
    result.copy_from_slice(&bytes);
    Ok(result)
}

/// Sign and minimal big-endian magnitude of an integer value.
///
/// Accepts JSON numbers, decimal strings and 0x-prefixed hex strings, each
/// optionally negative.
fn parse_integer(type_name: &str, value: &Value) -> Result<(bool, Vec<u8>), Eip712Error> {
    let invalid = || Eip712Error::InvalidValue {
        type_name: type_name.to_string(),
        value: value.to_string(),
    };

    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(invalid()),
    };

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };

    let mut magnitude = if let Some(hex_digits) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        let padded = if hex_digits.len() % 2 == 1 {
            format!("0{}", hex_digits)
        } else {
            hex_digits.to_string()
        };
        hex::decode(padded).map_err(|_| invalid())?
    } else {
        parse_decimal_bytes(digits).map_err(|_| invalid())?
    };

    let first_nonzero = magnitude.iter().position(|&b| b != 0).unwrap_or(magnitude.len());
    magnitude.drain(..first_nonzero);

    if magnitude.len() > 32 {
        return Err(invalid());
    }
    Ok((negative && !magnitude.is_empty(), magnitude))
}

fn twos_complement(word: &mut [u8; 32]) {
    for byte in word.iter_mut() {
        *byte = !*byte;
    }
    for byte in word.iter_mut().rev() {
        let (sum, overflow) = byte.overflowing_add(1);
        *byte = sum;
        if !overflow {
            break;
        }
    }
}

/// Parse a hex string (with or without 0x prefix)
fn parse_hex(s: &str) -> Result<Vec<u8>, Eip712Error> {
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    hex::decode(s).map_err(|e| Eip712Error::EncodingError(format!("invalid hex: {}", e)))
}
