//! Fixed DER schemas used by the custody protocol
//!
//! ```text
//! Signature            ::= SEQUENCE { r INTEGER, s INTEGER }
//! SubjectPublicKeyInfo ::= SEQUENCE { SEQUENCE { OID, OID }, BIT STRING }
//! ProvenanceRecord     ::= SEQUENCE { walletId UTF8String, path SEQUENCE OF INTEGER, publicKey OCTET STRING }
//! Clause               ::= SEQUENCE { quorumCount INTEGER, keys SEQUENCE OF OCTET STRING }
//! Schedule             ::= SEQUENCE OF Clause
//! PolicyTemplate       ::= SEQUENCE { expiryTimestamp INTEGER, delegateSchedules SEQUENCE OF Schedule,
//!                                     recovererSchedules SEQUENCE OF Schedule }
//! RecovererSchedules   ::= SEQUENCE OF Schedule
//! TxDigestPath         ::= SEQUENCE { digest OCTET STRING, path SEQUENCE OF INTEGER [, algo OCTET STRING] }
//! ```

use serde::{Deserialize, Serialize};

use super::der::{
    encode_bit_string, encode_integer_sequence, encode_octet_string, encode_oid, encode_sequence,
    encode_u64, encode_unsigned_integer, encode_utf8_string, DerError, DerReader, DerResult,
};
use crate::crypto::curves::CurveType;
use crate::serde_bytes::hex_bytes_list;

/// id-ecPublicKey (1.2.840.10045.2.1)
const OID_EC_PUBLIC_KEY: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
/// prime256v1 (1.2.840.10045.3.1.7)
const OID_PRIME256V1: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
/// secp256k1 (1.3.132.0.10)
const OID_SECP256K1: &[u8] = &[0x2b, 0x81, 0x04, 0x00, 0x0a];

/// ECDSA signature as two big-endian magnitudes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

impl EcdsaSignature {
    pub fn from_raw(raw: &[u8; 64]) -> Self {
        Self {
            r: raw[..32].to_vec(),
            s: raw[32..].to_vec(),
        }
    }

    pub fn to_der(&self) -> Vec<u8> {
        encode_sequence(&[encode_unsigned_integer(&self.r), encode_unsigned_integer(&self.s)])
    }

    pub fn from_der(data: &[u8]) -> DerResult<Self> {
        let mut outer = DerReader::new(data);
        let mut seq = outer.read_sequence()?;
        outer.finish()?;

        let r = seq.read_unsigned_integer()?.to_vec();
        let s = seq.read_unsigned_integer()?.to_vec();
        seq.finish()?;
        Ok(Self { r, s })
    }

    /// Fixed-width r‖s form
    pub fn to_raw(&self) -> DerResult<[u8; 64]> {
        let mut out = [0u8; 64];
        for (component, slot) in [(&self.r, 0usize), (&self.s, 32usize)] {
            let trimmed: &[u8] = {
                let start = component.iter().position(|&b| b != 0).unwrap_or(component.len());
                &component[start..]
            };
            if trimmed.len() > 32 {
                return Err(DerError::Decode(format!(
                    "signature component of {} bytes exceeds 32",
                    trimmed.len()
                )));
            }
            let offset = slot + 32 - trimmed.len();
            out[offset..slot + 32].copy_from_slice(trimmed);
        }
        Ok(out)
    }
}

/// Elliptic-curve SubjectPublicKeyInfo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPublicKeyInfo {
    pub curve: CurveType,
    pub public_key: Vec<u8>,
}

impl SubjectPublicKeyInfo {
    pub fn to_der(&self) -> Vec<u8> {
        let parameters = match self.curve {
            CurveType::Secp256k1 => OID_SECP256K1,
            CurveType::Secp256r1 => OID_PRIME256V1,
        };
        let algorithm = encode_sequence(&[encode_oid(OID_EC_PUBLIC_KEY), encode_oid(parameters)]);
        encode_sequence(&[algorithm, encode_bit_string(&self.public_key)])
    }

    pub fn from_der(data: &[u8]) -> DerResult<Self> {
        let mut outer = DerReader::new(data);
        let mut seq = outer.read_sequence()?;
        outer.finish()?;

        let mut algorithm = seq.read_sequence()?;
        let algorithm_oid = algorithm.read_oid()?;
        if algorithm_oid != OID_EC_PUBLIC_KEY {
            return Err(DerError::Decode(format!(
                "unsupported key algorithm OID {}",
                hex::encode(algorithm_oid)
            )));
        }
        let parameters = algorithm.read_oid()?;
        algorithm.finish()?;

        let curve = if parameters == OID_PRIME256V1 {
            CurveType::Secp256r1
        } else if parameters == OID_SECP256K1 {
            CurveType::Secp256k1
        } else {
            return Err(DerError::Decode(format!(
                "unsupported curve OID {}",
                hex::encode(parameters)
            )));
        };

        let public_key = seq.read_bit_string()?.to_vec();
        seq.finish()?;
        Ok(Self { curve, public_key })
    }
}

/// Statement signed by the custody service for every key it issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceRecord {
    pub wallet_id: String,
    pub path: Vec<u32>,
    pub public_key: Vec<u8>,
}

impl ProvenanceRecord {
    pub fn to_der(&self) -> Vec<u8> {
        encode_sequence(&[
            encode_utf8_string(&self.wallet_id),
            encode_integer_sequence(&self.path),
            encode_octet_string(&self.public_key),
        ])
    }

    pub fn from_der(data: &[u8]) -> DerResult<Self> {
        let mut outer = DerReader::new(data);
        let mut seq = outer.read_sequence()?;
        outer.finish()?;

        let wallet_id = seq.read_utf8_string()?.to_string();
        let path = seq.read_integer_sequence()?;
        let public_key = seq.read_octet_string()?.to_vec();
        seq.finish()?;
        Ok(Self { wallet_id, path, public_key })
    }
}

/// A quorum of keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    pub quorum_count: u32,
    #[serde(with = "hex_bytes_list")]
    pub keys: Vec<Vec<u8>>,
}

/// Alternative clauses, any of which satisfies the schedule
pub type Schedule = Vec<Clause>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTemplate {
    pub expiry_timestamp: u64,
    pub delegate_schedules: Vec<Schedule>,
    pub recoverer_schedules: Vec<Schedule>,
}

impl PolicyTemplate {
    pub fn to_der(&self) -> Vec<u8> {
        encode_sequence(&[
            encode_u64(self.expiry_timestamp),
            encode_schedules(&self.delegate_schedules),
            encode_schedules(&self.recoverer_schedules),
        ])
    }

    pub fn from_der(data: &[u8]) -> DerResult<Self> {
        let mut outer = DerReader::new(data);
        let mut seq = outer.read_sequence()?;
        outer.finish()?;

        let expiry_timestamp = seq.read_u64()?;
        let delegate_schedules = read_schedules(&mut seq)?;
        let recoverer_schedules = read_schedules(&mut seq)?;
        seq.finish()?;

        Ok(Self {
            expiry_timestamp,
            delegate_schedules,
            recoverer_schedules,
        })
    }
}

/// Encode the standalone recoverer-schedule structure
pub fn encode_recoverer_schedules(schedules: &[Schedule]) -> Vec<u8> {
    encode_schedules(schedules)
}

pub fn decode_recoverer_schedules(data: &[u8]) -> DerResult<Vec<Schedule>> {
    let mut outer = DerReader::new(data);
    let schedules = read_schedules(&mut outer)?;
    outer.finish()?;
    Ok(schedules)
}

fn encode_clause(clause: &Clause) -> Vec<u8> {
    let keys: Vec<Vec<u8>> = clause.keys.iter().map(|k| encode_octet_string(k)).collect();
    encode_sequence(&[encode_u64(clause.quorum_count as u64), encode_sequence(&keys)])
}

fn encode_schedules(schedules: &[Schedule]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = schedules
        .iter()
        .map(|schedule| {
            let clauses: Vec<Vec<u8>> = schedule.iter().map(encode_clause).collect();
            encode_sequence(&clauses)
        })
        .collect();
    encode_sequence(&encoded)
}

fn read_clause(reader: &mut DerReader<'_>) -> DerResult<Clause> {
    let mut seq = reader.read_sequence()?;
    let quorum_count = seq.read_u32()?;

    let mut keys_seq = seq.read_sequence()?;
    let mut keys = Vec::new();
    while !keys_seq.is_empty() {
        keys.push(keys_seq.read_octet_string()?.to_vec());
    }
    seq.finish()?;

    Ok(Clause { quorum_count, keys })
}

fn read_schedules(reader: &mut DerReader<'_>) -> DerResult<Vec<Schedule>> {
    let mut outer = reader.read_sequence()?;
    let mut schedules = Vec::new();
    while !outer.is_empty() {
        let mut schedule_seq = outer.read_sequence()?;
        let mut schedule = Vec::new();
        while !schedule_seq.is_empty() {
            schedule.push(read_clause(&mut schedule_seq)?);
        }
        schedules.push(schedule);
    }
    Ok(schedules)
}

/// The record a signer receives: chain digest plus derivation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxDigestPath {
    pub digest: Vec<u8>,
    pub path: Vec<u32>,
    pub algo: Option<Vec<u8>>,
}

impl TxDigestPath {
    pub fn to_der(&self) -> Vec<u8> {
        let mut elements = vec![
            encode_octet_string(&self.digest),
            encode_integer_sequence(&self.path),
        ];
        if let Some(algo) = &self.algo {
            elements.push(encode_octet_string(algo));
        }
        encode_sequence(&elements)
    }

    pub fn from_der(data: &[u8]) -> DerResult<Self> {
        let mut outer = DerReader::new(data);
        let mut seq = outer.read_sequence()?;
        outer.finish()?;

        let digest = seq.read_octet_string()?.to_vec();
        let path = seq.read_integer_sequence()?;
        let algo = if seq.is_empty() {
            None
        } else {
            Some(seq.read_octet_string()?.to_vec())
        };
        seq.finish()?;

        Ok(Self { digest, path, algo })
    }
}
