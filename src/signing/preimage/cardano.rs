//! Cardano Pre-Image Hashing
//!
//! The signed digest is blake2b-256 of the canonical CBOR transaction body
//! map `{0: inputs, 1: outputs, 2: fee, 3: ttl, 4?: certificates, 5?: withdrawals}`.
//! Keys are written in ascending order and withdrawal reward addresses are
//! sorted, so the encoding is canonical.

use super::{PreImageError, PreImageResult};
use crate::utils::{blake2b_224, blake2b_256};
use bech32::FromBase32;
use cbor_event::se::{Serialize, Serializer};
use cbor_event::Len;
use std::io::Write;

const KEY_INPUTS: u64 = 0;
const KEY_OUTPUTS: u64 = 1;
const KEY_FEE: u64 = 2;
const KEY_TTL: u64 = 3;
const KEY_CERTIFICATES: u64 = 4;
const KEY_WITHDRAWALS: u64 = 5;

const CERT_STAKE_REGISTRATION: u64 = 0;
const CERT_STAKE_DEREGISTRATION: u64 = 1;
const CERT_STAKE_DELEGATION: u64 = 2;

/// Credential kind tag for a key hash
const CREDENTIAL_KEY_HASH: u64 = 0;

/// Header nibble of a reward (stake) address backed by a key hash
const REWARD_ADDRESS_HEADER: u8 = 0xe0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardanoInput {
    pub tx_id: [u8; 32],
    pub index: u64,
}

impl Serialize for CardanoInput {
    fn serialize<'se, W: Write>(
        &self,
        serializer: &'se mut Serializer<W>,
    ) -> cbor_event::Result<&'se mut Serializer<W>> {
        serializer.write_array(Len::Len(2))?;
        serializer.write_bytes(self.tx_id)?;
        serializer.write_unsigned_integer(self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardanoOutput {
    /// Raw address bytes (bech32-decoded)
    pub address: Vec<u8>,
    /// Lovelace
    pub amount: u64,
}

impl Serialize for CardanoOutput {
    fn serialize<'se, W: Write>(
        &self,
        serializer: &'se mut Serializer<W>,
    ) -> cbor_event::Result<&'se mut Serializer<W>> {
        serializer.write_array(Len::Len(2))?;
        serializer.write_bytes(&self.address)?;
        serializer.write_unsigned_integer(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Certificate {
    StakeRegistration { stake_key_hash: [u8; 28] },
    StakeDeregistration { stake_key_hash: [u8; 28] },
    StakeDelegation { stake_key_hash: [u8; 28], pool_key_hash: [u8; 28] },
}

fn write_credential<'se, W: Write>(
    serializer: &'se mut Serializer<W>,
    hash: &[u8; 28],
) -> cbor_event::Result<&'se mut Serializer<W>> {
    serializer.write_array(Len::Len(2))?;
    serializer.write_unsigned_integer(CREDENTIAL_KEY_HASH)?;
    serializer.write_bytes(hash)
}

impl Serialize for Certificate {
    fn serialize<'se, W: Write>(
        &self,
        serializer: &'se mut Serializer<W>,
    ) -> cbor_event::Result<&'se mut Serializer<W>> {
        match self {
            Certificate::StakeRegistration { stake_key_hash } => {
                serializer.write_array(Len::Len(2))?;
                serializer.write_unsigned_integer(CERT_STAKE_REGISTRATION)?;
                write_credential(serializer, stake_key_hash)
            }
            Certificate::StakeDeregistration { stake_key_hash } => {
                serializer.write_array(Len::Len(2))?;
                serializer.write_unsigned_integer(CERT_STAKE_DEREGISTRATION)?;
                write_credential(serializer, stake_key_hash)
            }
            Certificate::StakeDelegation { stake_key_hash, pool_key_hash } => {
                serializer.write_array(Len::Len(3))?;
                serializer.write_unsigned_integer(CERT_STAKE_DELEGATION)?;
                write_credential(serializer, stake_key_hash)?;
                serializer.write_bytes(pool_key_hash)
            }
        }
    }
}

/// Transaction body. Empty `certificates` / `withdrawals` are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardanoTransactionBody {
    pub inputs: Vec<CardanoInput>,
    pub outputs: Vec<CardanoOutput>,
    pub fee: u64,
    pub ttl: u64,
    pub certificates: Vec<Certificate>,
    /// Reward address bytes → lovelace
    pub withdrawals: Vec<(Vec<u8>, u64)>,
}

impl CardanoTransactionBody {
    pub fn to_cbor(&self) -> PreImageResult<Vec<u8>> {
        let mut serializer = Serializer::new_vec();
        self.serialize(&mut serializer)
            .map_err(|e| PreImageError::EncodingError(format!("Cardano body CBOR: {}", e)))?;
        Ok(serializer.finalize())
    }
}

impl Serialize for CardanoTransactionBody {
    fn serialize<'se, W: Write>(
        &self,
        serializer: &'se mut Serializer<W>,
    ) -> cbor_event::Result<&'se mut Serializer<W>> {
        let optional = [!self.certificates.is_empty(), !self.withdrawals.is_empty()];
        let entries = 4 + optional.iter().filter(|present| **present).count() as u64;
        serializer.write_map(Len::Len(entries))?;

        serializer.write_unsigned_integer(KEY_INPUTS)?;
        serializer.write_array(Len::Len(self.inputs.len() as u64))?;
        for input in &self.inputs {
            input.serialize(serializer)?;
        }

        serializer.write_unsigned_integer(KEY_OUTPUTS)?;
        serializer.write_array(Len::Len(self.outputs.len() as u64))?;
        for output in &self.outputs {
            output.serialize(serializer)?;
        }

        serializer.write_unsigned_integer(KEY_FEE)?;
        serializer.write_unsigned_integer(self.fee)?;
        serializer.write_unsigned_integer(KEY_TTL)?;
        serializer.write_unsigned_integer(self.ttl)?;

        if !self.certificates.is_empty() {
            serializer.write_unsigned_integer(KEY_CERTIFICATES)?;
            serializer.write_array(Len::Len(self.certificates.len() as u64))?;
            for certificate in &self.certificates {
                certificate.serialize(serializer)?;
            }
        }

        if !self.withdrawals.is_empty() {
            // Canonical map order: shorter key first, then bytewise
            let mut withdrawals: Vec<&(Vec<u8>, u64)> = self.withdrawals.iter().collect();
            withdrawals.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

            serializer.write_unsigned_integer(KEY_WITHDRAWALS)?;
            serializer.write_map(Len::Len(withdrawals.len() as u64))?;
            for (address, amount) in withdrawals {
                serializer.write_bytes(address)?;
                serializer.write_unsigned_integer(*amount)?;
            }
        }

        Ok(serializer)
    }
}

/// blake2b-256 of the CBOR-encoded body
pub fn get_cardano_body_hash(body: &CardanoTransactionBody) -> PreImageResult<[u8; 32]> {
    if body.inputs.is_empty() || body.outputs.is_empty() {
        return Err(PreImageError::InvalidTransaction(
            "Cardano transaction needs at least one input and one output".to_string(),
        ));
    }
    Ok(blake2b_256(&body.to_cbor()?))
}

/// Decode a bech32 string whose human-readable part starts with `hrp_prefix`
pub fn decode_bech32(encoded: &str, hrp_prefix: &str) -> PreImageResult<Vec<u8>> {
    let (hrp, data, _variant) = bech32::decode(encoded)
        .map_err(|e| PreImageError::InvalidAddress(format!("{}: {}", encoded, e)))?;
    if !hrp.starts_with(hrp_prefix) {
        return Err(PreImageError::InvalidAddress(format!(
            "expected '{}' prefix, got '{}'",
            hrp_prefix, hrp
        )));
    }
    Vec::<u8>::from_base32(&data)
        .map_err(|e| PreImageError::InvalidAddress(format!("{}: {}", encoded, e)))
}

/// Network id carried in the low nibble of an address header
pub fn network_id(address: &[u8]) -> PreImageResult<u8> {
    address
        .first()
        .map(|header| header & 0x0f)
        .ok_or_else(|| PreImageError::InvalidAddress("empty address".to_string()))
}

pub fn stake_key_hash(stake_public_key: &[u8]) -> [u8; 28] {
    blake2b_224(stake_public_key)
}

/// Reward address bytes for a key-hash stake credential
pub fn reward_address(network: u8, stake_key_hash: &[u8; 28]) -> Vec<u8> {
    let mut address = Vec::with_capacity(29);
    address.push(REWARD_ADDRESS_HEADER | (network & 0x0f));
    address.extend_from_slice(stake_key_hash);
    address
}

/// Pool key hash from a `pool1...` bech32 id
pub fn decode_pool_id(pool_id: &str) -> PreImageResult<[u8; 28]> {
    let bytes = decode_bech32(pool_id, "pool")?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        PreImageError::InvalidAddress(format!("pool id must decode to 28 bytes, got {}", len))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const A1: &str = "addr_test1qp6x4zhulyhpr2vdwpjcgehhxswy2sya2vcdlu7cptzckxky7h0xkc9hky26k8xdxlsdg0ltr7aqyee88h47yxf5l4rssz052e";
    const A2: &str = "addr_test1qpwn9qtuh6hm6npclec52tfmaudxu20xjcq22p77reyjlfp7ha8dhm3tg4gnq55ptfq7t0j5ah7rkjlegj8ng2hutfcs4xz8hl";
    const STAKE_PK: &str = "5755ee85e4a4b1ca3696760480c2b6d8cb0e40b5c2bcf7496744f7f55efffa63";
    const POOL: &str = "pool12ljkn792fwrpzax4h8fum6hcvl38vaj59nep6dgjw9dpqs96mrg";

    fn payment_body() -> CardanoTransactionBody {
        let mut tx_id = [0u8; 32];
        hex::decode_to_slice(
            "0832d0438d429cfea37e16871e1a84ebdae8905bf8d3d5aa119e2001d4853094",
            &mut tx_id,
        )
        .unwrap();
        CardanoTransactionBody {
            inputs: vec![CardanoInput { tx_id, index: 1 }],
            outputs: vec![
                CardanoOutput { address: decode_bech32(A1, "addr").unwrap(), amount: 1_500_000 },
                CardanoOutput { address: decode_bech32(A2, "addr").unwrap(), amount: 8_300_000 },
            ],
            fee: 180_000,
            ttl: 52_000_000,
            ..Default::default()
        }
    }

    fn stake_hash() -> [u8; 28] {
        stake_key_hash(&hex::decode(STAKE_PK).unwrap())
    }

    #[test]
    fn test_payment_body_encoding() {
        let body = payment_body();
        assert_eq!(
            hex::encode(body.to_cbor().unwrap()),
            "a400818258200832d0438d429cfea37e16871e1a84ebdae8905bf8d3d5aa119e2001d4853094\
             01018282583900746a8afcf92e11a98d70658466f7341c45409d5330dff3d80ac58b1ac4f5de6b\
             60b7b115ab1ccd37e0d43feb1fba0267273debe21934fd471a0016e360825839005d32817cbeaf\
             bd4c38fe71452d3bef1a6e29e69600a507de1e492fa43ebf4edbee2b45513052815a41e5be54ed\
             fc3b4bf9448f342afc5a711a007ea5e0021a0002bf20031a03197500"
        );
        assert_eq!(
            hex::encode(get_cardano_body_hash(&body).unwrap()),
            "b5952117c693419f561cbbd603bf9d8f12fb98559974691f86f115052a75b46c"
        );
    }

    #[test]
    fn test_stake_body_hash() {
        let mut body = payment_body();
        body.certificates = vec![
            Certificate::StakeRegistration { stake_key_hash: stake_hash() },
            Certificate::StakeDelegation {
                stake_key_hash: stake_hash(),
                pool_key_hash: decode_pool_id(POOL).unwrap(),
            },
        ];
        assert_eq!(
            hex::encode(get_cardano_body_hash(&body).unwrap()),
            "fb3c535fba194b8bff071330ef91da6b45402ff32f2ff8bc0641401a3b76933c"
        );
    }

    #[test]
    fn test_unstake_body_hash() {
        let mut body = payment_body();
        body.certificates = vec![Certificate::StakeDeregistration { stake_key_hash: stake_hash() }];
        assert_eq!(
            hex::encode(get_cardano_body_hash(&body).unwrap()),
            "84016317141a6fed3f0644600e3629012b2563dd3633af2ffb96ab307b78f843"
        );
    }

    #[test]
    fn test_withdrawal_body_hash() {
        let mut body = payment_body();
        let network = network_id(&body.outputs[0].address).unwrap();
        assert_eq!(network, 0);
        body.withdrawals = vec![(reward_address(network, &stake_hash()), 4_200_000)];
        assert_eq!(
            hex::encode(get_cardano_body_hash(&body).unwrap()),
            "f5f0085eb6ba9b51c81891f59e80afc386196e9927a9b95dd927c1cfe6a538e6"
        );
    }

    #[test]
    fn test_withdrawal_order_is_canonical() {
        let mut forward = payment_body();
        let mut other_key = stake_hash();
        other_key[0] ^= 0xff;
        forward.withdrawals = vec![
            (reward_address(0, &stake_hash()), 4_200_000),
            (reward_address(0, &other_key), 1_000_000),
        ];
        let mut reversed = forward.clone();
        reversed.withdrawals.reverse();
        assert_eq!(forward.to_cbor().unwrap(), reversed.to_cbor().unwrap());
    }

    #[test]
    fn test_fee_change_alters_digest() {
        let mut body = payment_body();
        let original = get_cardano_body_hash(&body).unwrap();
        body.fee += 1;
        assert_ne!(original, get_cardano_body_hash(&body).unwrap());
    }

    #[test]
    fn test_decode_rejects_wrong_prefix() {
        assert!(decode_bech32(POOL, "addr").is_err());
        assert!(decode_bech32("addr_test1notbech32", "addr").is_err());
    }
}
