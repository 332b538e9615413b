//! Bitcoin Pre-Image Hashing
//!
//! Every custody input spends a P2SH-wrapped P2WPKH output, so each input's
//! sighash is BIP-143 with `SIGHASH_ALL` and a P2PKH script code built from
//! the input's own compressed key.

use super::{PreImageError, PreImageResult};
use crate::utils::hash160;
use bitcoin::hashes::{sha256d, Hash};

const SIGHASH_ALL: u32 = 0x01;

/// Bitcoin transaction input for sighash calculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcoinInput {
    /// Previous transaction hash, display (big-endian) order
    pub txid: [u8; 32],
    /// Output index in previous transaction
    pub vout: u32,
    /// Sequence number
    pub sequence: u32,
    /// Value of the spent output in satoshis
    pub value: u64,
    /// Compressed secp256k1 key controlling the spent output
    pub public_key: [u8; 33],
}

impl BitcoinInput {
    /// `OP_DUP OP_HASH160 <hash160(pk)> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn script_code(&self) -> Vec<u8> {
        let mut script = Vec::with_capacity(25);
        script.extend_from_slice(&[0x76, 0xa9, 0x14]);
        script.extend_from_slice(&hash160(&self.public_key));
        script.extend_from_slice(&[0x88, 0xac]);
        script
    }

    /// `OP_0 <hash160(pk)>`
    pub fn redeem_script(&self) -> Vec<u8> {
        let mut script = Vec::with_capacity(22);
        script.extend_from_slice(&[0x00, 0x14]);
        script.extend_from_slice(&hash160(&self.public_key));
        script
    }

    fn outpoint(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        let mut txid = self.txid;
        txid.reverse();
        out[..32].copy_from_slice(&txid);
        out[32..].copy_from_slice(&self.vout.to_le_bytes());
        out
    }
}

/// Bitcoin transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcoinOutput {
    /// Value in satoshis
    pub value: u64,
    /// Output script (scriptPubKey)
    pub script_pubkey: Vec<u8>,
}

/// Unsigned Bitcoin transaction for pre-image generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedBitcoinTransaction {
    pub version: i32,
    pub inputs: Vec<BitcoinInput>,
    pub outputs: Vec<BitcoinOutput>,
    pub locktime: u32,
}

/// Get sighashes for all inputs, in input order
pub fn get_bitcoin_sighashes(tx: &UnsignedBitcoinTransaction) -> PreImageResult<Vec<[u8; 32]>> {
    if tx.inputs.is_empty() {
        return Err(PreImageError::InvalidTransaction("transaction has no inputs".to_string()));
    }
    if tx.outputs.is_empty() {
        return Err(PreImageError::InvalidTransaction("transaction has no outputs".to_string()));
    }

    (0..tx.inputs.len()).map(|index| get_segwit_sighash(tx, index)).collect()
}

/// Calculate the BIP-143 (SegWit) sighash for one input
pub fn get_segwit_sighash(
    tx: &UnsignedBitcoinTransaction,
    input_index: usize,
) -> PreImageResult<[u8; 32]> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(PreImageError::InvalidInputIndex(input_index))?;

    let mut serialized = Vec::with_capacity(182);

    // 1. Version
    serialized.extend_from_slice(&tx.version.to_le_bytes());

    // 2. hashPrevouts
    let mut prevouts = Vec::with_capacity(36 * tx.inputs.len());
    for inp in &tx.inputs {
        prevouts.extend_from_slice(&inp.outpoint());
    }
    serialized.extend_from_slice(&sha256d::Hash::hash(&prevouts).to_byte_array());

    // 3. hashSequence
    let mut sequences = Vec::with_capacity(4 * tx.inputs.len());
    for inp in &tx.inputs {
        sequences.extend_from_slice(&inp.sequence.to_le_bytes());
    }
    serialized.extend_from_slice(&sha256d::Hash::hash(&sequences).to_byte_array());

    // 4. outpoint
    serialized.extend_from_slice(&input.outpoint());

    // 5. scriptCode
    let script_code = input.script_code();
    write_varint(&mut serialized, script_code.len() as u64);
    serialized.extend_from_slice(&script_code);

    // 6. value
    serialized.extend_from_slice(&input.value.to_le_bytes());

    // 7. nSequence
    serialized.extend_from_slice(&input.sequence.to_le_bytes());

    // 8. hashOutputs
    let mut outputs = Vec::new();
    for out in &tx.outputs {
        write_output(&mut outputs, out);
    }
    serialized.extend_from_slice(&sha256d::Hash::hash(&outputs).to_byte_array());

    // 9. nLocktime
    serialized.extend_from_slice(&tx.locktime.to_le_bytes());

    // 10. sighash type
    serialized.extend_from_slice(&SIGHASH_ALL.to_le_bytes());

    Ok(sha256d::Hash::hash(&serialized).to_byte_array())
}

/// Legacy serialization of the unsigned transaction with P2SH-P2WPKH
/// scriptSigs and no witness data
pub fn serialize_unsigned(tx: &UnsignedBitcoinTransaction) -> Vec<u8> {
    let mut raw = Vec::new();
    raw.extend_from_slice(&tx.version.to_le_bytes());

    write_varint(&mut raw, tx.inputs.len() as u64);
    for input in &tx.inputs {
        raw.extend_from_slice(&input.outpoint());

        let redeem_script = input.redeem_script();
        let mut script_sig = Vec::with_capacity(redeem_script.len() + 1);
        script_sig.push(redeem_script.len() as u8);
        script_sig.extend_from_slice(&redeem_script);

        write_varint(&mut raw, script_sig.len() as u64);
        raw.extend_from_slice(&script_sig);
        raw.extend_from_slice(&input.sequence.to_le_bytes());
    }

    write_varint(&mut raw, tx.outputs.len() as u64);
    for output in &tx.outputs {
        write_output(&mut raw, output);
    }

    raw.extend_from_slice(&tx.locktime.to_le_bytes());
    raw
}

/// Transaction id in display order
pub fn txid(tx: &UnsignedBitcoinTransaction) -> [u8; 32] {
    let mut id = sha256d::Hash::hash(&serialize_unsigned(tx)).to_byte_array();
    id.reverse();
    id
}

fn write_output(buf: &mut Vec<u8>, output: &BitcoinOutput) {
    buf.extend_from_slice(&output.value.to_le_bytes());
    write_varint(buf, output.script_pubkey.len() as u64);
    buf.extend_from_slice(&output.script_pubkey);
}

fn write_varint(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x10000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p2pkh(hash_hex: &str) -> Vec<u8> {
        let mut script = vec![0x76, 0xa9, 0x14];
        script.extend(hex::decode(hash_hex).unwrap());
        script.extend([0x88, 0xac]);
        script
    }

    /// BIP-143 P2SH-P2WPKH example transaction
    fn bip143_tx() -> UnsignedBitcoinTransaction {
        let mut txid = [0u8; 32];
        hex::decode_to_slice(
            "77541aeb3c4dac9260b68f74f44c973081a9d4cb2ebe8038b2d70faa201b6bdb",
            &mut txid,
        )
        .unwrap();
        let mut public_key = [0u8; 33];
        hex::decode_to_slice(
            "03ad1d8e89212f0b92c74d23bb710c00662ad1470198ac48c43f7d6f93a2a26873",
            &mut public_key,
        )
        .unwrap();

        UnsignedBitcoinTransaction {
            version: 1,
            inputs: vec![BitcoinInput {
                txid,
                vout: 1,
                sequence: 0xfffffffe,
                value: 1_000_000_000,
                public_key,
            }],
            outputs: vec![
                BitcoinOutput {
                    value: 199_996_600,
                    script_pubkey: p2pkh("a457b684d7f0d539a46a45bbc043f35b59d0d963"),
                },
                BitcoinOutput {
                    value: 800_000_000,
                    script_pubkey: p2pkh("fd270b1ee6abcaea97fea7ad0402e8bd8ad6d77c"),
                },
            ],
            locktime: 1170,
        }
    }

    #[test]
    fn test_bip143_p2sh_p2wpkh_vector() {
        let hashes = get_bitcoin_sighashes(&bip143_tx()).unwrap();
        assert_eq!(hashes.len(), 1);
        assert_eq!(
            hex::encode(hashes[0]),
            "64f3b0f4dd2bb3aa1ce8566d220cc74dda9df97d8490cc81d89d735c92e59fb6"
        );
    }

    #[test]
    fn test_input_scripts_from_compressed_key() {
        let input = bip143_tx().inputs[0].clone();
        assert_eq!(
            hex::encode(input.redeem_script()),
            "001479091972186c449eb1ded22b78e40d009bdf0089"
        );
        assert_eq!(
            hex::encode(input.script_code()),
            "76a91479091972186c449eb1ded22b78e40d009bdf008988ac"
        );
    }

    #[test]
    fn test_unsigned_raw_and_txid() {
        let tx = bip143_tx();
        assert_eq!(
            hex::encode(serialize_unsigned(&tx)),
            "0100000001db6b1b20aa0fd7b23880be2ecbd4a98130974cf4748fb66092ac4d3ceb1a5477\
             010000001716001479091972186c449eb1ded22b78e40d009bdf0089feffffff02b8b4eb0b\
             000000001976a914a457b684d7f0d539a46a45bbc043f35b59d0d96388ac0008af2f000000\
             001976a914fd270b1ee6abcaea97fea7ad0402e8bd8ad6d77c88ac92040000"
        );
        assert_eq!(
            hex::encode(txid(&tx)),
            "ef48d9d0f595052e0f8cdcf825f7a5e50b6a388a81f206f3f4846e5ecd7a0c23"
        );
    }

    #[test]
    fn test_multi_input_sighashes_differ() {
        let mut tx = bip143_tx();
        let mut second = tx.inputs[0].clone();
        second.vout = 2;
        tx.inputs.push(second);

        let hashes = get_bitcoin_sighashes(&tx).unwrap();
        assert_eq!(hashes.len(), 2);
        assert_ne!(hashes[0], hashes[1]);
        assert_eq!(hashes, get_bitcoin_sighashes(&tx).unwrap());
    }

    #[test]
    fn test_value_change_alters_sighash() {
        let original = get_bitcoin_sighashes(&bip143_tx()).unwrap();
        let mut tx = bip143_tx();
        tx.outputs[1].value -= 1;
        assert_ne!(original, get_bitcoin_sighashes(&tx).unwrap());
    }

    #[test]
    fn test_invalid_input_index() {
        assert!(matches!(
            get_segwit_sighash(&bip143_tx(), 5),
            Err(PreImageError::InvalidInputIndex(5))
        ));
    }

    #[test]
    fn test_empty_transaction_rejected() {
        let mut tx = bip143_tx();
        tx.outputs.clear();
        assert!(get_bitcoin_sighashes(&tx).is_err());
    }

    #[test]
    fn test_varint_boundaries() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 0xfc);
        write_varint(&mut buf, 0xfd);
        write_varint(&mut buf, 0x1_0000);
        assert_eq!(hex::encode(buf), "fcfdfd00fe00000100");
    }
}
