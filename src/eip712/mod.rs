//! EIP-712 Typed Data Hashing
//!
//! Reconstructs the digest a wallet would sign for `eth_signTypedData_v3`
//! and `eth_signTypedData_v4` payloads.
//!
//! # Reference
//! - <https://eips.ethereum.org/EIPS/eip-712>
//!
//! # Example
//! ```rust,ignore
//! use custody_signer::eip712::{hash_typed_data, TypedData, TypedDataVersion};
//!
//! let typed_data = TypedData::from_json(json_string)?;
//! let digest = hash_typed_data(&typed_data, TypedDataVersion::V4)?;
//! ```

pub mod encoder;
pub mod hasher;
pub mod types;

pub use encoder::{encode_data, encode_type, type_hash, TypeMap};
pub use hasher::*;
pub use types::*;
