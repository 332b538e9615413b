//! Solana Pre-Image Serialization
//!
//! Solana signs the serialized message itself, not a hash of it. Messages
//! arrive already compiled (header, account keys, index-based instructions)
//! in either the legacy or the v0 layout.

use super::{PreImageError, PreImageResult};
use serde::{Deserialize, Serialize};

/// Solana public key (32 bytes)
pub type Pubkey = [u8; 32];

const V0_PREFIX: u8 = 0x80;

/// Solana message version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolanaVersion {
    /// Legacy message (no version prefix)
    #[default]
    Legacy,
    /// Versioned message v0 (with address lookup tables)
    V0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

/// Instruction with accounts referenced by index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// Address lookup table reference for v0 messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressTableLookup {
    pub account_key: Pubkey,
    pub writable_indexes: Vec<u8>,
    pub readonly_indexes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaMessage {
    pub version: SolanaVersion,
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
    /// Only serialized for v0
    pub address_table_lookups: Vec<AddressTableLookup>,
}

impl SolanaMessage {
    /// Number of addressable accounts, lookup-table entries included
    fn addressable_accounts(&self) -> usize {
        let looked_up: usize = match self.version {
            SolanaVersion::Legacy => 0,
            SolanaVersion::V0 => self
                .address_table_lookups
                .iter()
                .map(|l| l.writable_indexes.len() + l.readonly_indexes.len())
                .sum(),
        };
        self.account_keys.len() + looked_up
    }

    fn validate(&self) -> PreImageResult<()> {
        if self.account_keys.is_empty() {
            return Err(PreImageError::MissingField("accountKeys".to_string()));
        }
        if self.header.num_required_signatures as usize > self.account_keys.len() {
            return Err(PreImageError::InvalidTransaction(format!(
                "{} required signatures but only {} account keys",
                self.header.num_required_signatures,
                self.account_keys.len()
            )));
        }
        if self.version == SolanaVersion::Legacy && !self.address_table_lookups.is_empty() {
            return Err(PreImageError::InvalidTransaction(
                "address table lookups require a v0 message".to_string(),
            ));
        }

        let addressable = self.addressable_accounts();
        for (i, ix) in self.instructions.iter().enumerate() {
            let out_of_range = std::iter::once(&ix.program_id_index)
                .chain(ix.accounts.iter())
                .any(|&index| index as usize >= addressable);
            if out_of_range {
                return Err(PreImageError::InvalidTransaction(format!(
                    "instruction {} references an account index beyond {}",
                    i, addressable
                )));
            }
        }
        Ok(())
    }
}

/// Serialized message bytes; these are what the signer signs
pub fn get_solana_message_bytes(message: &SolanaMessage) -> PreImageResult<Vec<u8>> {
    message.validate()?;

    let mut out = Vec::new();
    if message.version == SolanaVersion::V0 {
        out.push(V0_PREFIX);
    }

    // Message header (3 bytes)
    out.push(message.header.num_required_signatures);
    out.push(message.header.num_readonly_signed_accounts);
    out.push(message.header.num_readonly_unsigned_accounts);

    write_compact_u16(message.account_keys.len(), &mut out)?;
    for key in &message.account_keys {
        out.extend_from_slice(key);
    }

    out.extend_from_slice(&message.recent_blockhash);

    write_compact_u16(message.instructions.len(), &mut out)?;
    for ix in &message.instructions {
        out.push(ix.program_id_index);
        write_compact_u16(ix.accounts.len(), &mut out)?;
        out.extend_from_slice(&ix.accounts);
        write_compact_u16(ix.data.len(), &mut out)?;
        out.extend_from_slice(&ix.data);
    }

    if message.version == SolanaVersion::V0 {
        write_compact_u16(message.address_table_lookups.len(), &mut out)?;
        for lookup in &message.address_table_lookups {
            out.extend_from_slice(&lookup.account_key);
            write_compact_u16(lookup.writable_indexes.len(), &mut out)?;
            out.extend_from_slice(&lookup.writable_indexes);
            write_compact_u16(lookup.readonly_indexes.len(), &mut out)?;
            out.extend_from_slice(&lookup.readonly_indexes);
        }
    }

    Ok(out)
}

/// Write compact-u16 encoding (Solana's variable-length integer)
fn write_compact_u16(value: usize, buf: &mut Vec<u8>) -> PreImageResult<()> {
    let value = u16::try_from(value).map_err(|_| {
        PreImageError::EncodingError(format!("length {} exceeds compact-u16 range", value))
    })?;

    if value < 0x80 {
        buf.push(value as u8);
    } else if value < 0x4000 {
        buf.push((value & 0x7f) as u8 | 0x80);
        buf.push((value >> 7) as u8);
    } else {
        buf.push((value & 0x7f) as u8 | 0x80);
        buf.push(((value >> 7) & 0x7f) as u8 | 0x80);
        buf.push((value >> 14) as u8);
    }
    Ok(())
}
