//! Binary codecs
//!
//! Strict DER for the custody schemas.

pub mod asn1;
pub mod der;

pub use asn1::{
    decode_recoverer_schedules, encode_recoverer_schedules, Clause, EcdsaSignature,
    PolicyTemplate, ProvenanceRecord, Schedule, SubjectPublicKeyInfo, TxDigestPath,
};
pub use der::DerError;
