//! Bitcoin change-address derivation
//!
//! Change outputs pay a P2SH-wrapped P2WPKH ("compatibility") address built
//! from a provenance-verified key. The claimed address must equal the
//! derived one character for character.

use super::verify_provenance;
use crate::config::BitcoinNetwork;
use crate::crypto::{compress_public_key, CurveType};
use crate::error::{CustodyError, CustodyResult, ErrorCode};
use crate::serde_bytes::hex_bytes;
use crate::{log_info, log_warn};
use bitcoin::{Address, CompressedPublicKey};
use serde::{Deserialize, Serialize};

/// Address-creation response from the custody service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAddressPayload {
    pub sub_wallet_id: String,
    pub address: String,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    pub path: Vec<u32>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

/// P2SH-P2WPKH address for a secp256k1 public key
pub fn change_address(public_key: &[u8], network: BitcoinNetwork) -> CustodyResult<String> {
    let compressed = compress_public_key(CurveType::Secp256k1, public_key)?;
    let key = CompressedPublicKey::from_slice(&compressed)
        .map_err(|e| CustodyError::invalid_input(format!("Invalid secp256k1 public key: {}", e)))?;
    Ok(Address::p2shwpkh(&key, network.to_network()).to_string())
}

pub fn verify_change_output(
    public_key: &[u8],
    claimed_address: &str,
    network: BitcoinNetwork,
) -> CustodyResult<()> {
    let derived = change_address(public_key, network)?;
    if derived.as_bytes() == claimed_address.as_bytes() {
        return Ok(());
    }

    log_warn!(
        "provenance",
        "Change output address does not match its verified key",
        address = claimed_address,
        network = network
    );
    Err(CustodyError::new(
        ErrorCode::ChangeAddressMismatch,
        "change output address is not derived from its provenance key",
    )
    .with_details(format!("expected={} actual={}", derived, claimed_address)))
}

/// Check a newly created deposit address: its key must carry custody
/// provenance for `sub_wallet_id` and the address must derive from that key
pub fn verify_created_address(
    sub_wallet_id: &str,
    payload: &CreatedAddressPayload,
    network: BitcoinNetwork,
    trusted_keys: &[Vec<u8>],
) -> CustodyResult<()> {
    if payload.sub_wallet_id != sub_wallet_id {
        return Err(CustodyError::expectation_mismatch(
            "subWalletId",
            sub_wallet_id,
            &payload.sub_wallet_id,
        ));
    }
    verify_provenance(
        sub_wallet_id,
        &payload.path,
        &payload.public_key,
        Some(payload.signature.as_slice()),
        trusted_keys,
    )?;
    verify_change_output(&payload.public_key, &payload.address, network)?;
    log_info!("provenance", "Created address verified", address = &payload.address);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ProvenanceRecord;
    use crate::utils::sha256;
    use bitcoin::address::NetworkUnchecked;
    use bitcoin::Network;
    use p256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};

    const E2E_PUBLIC_KEY: &str = "044f355bdcb7cc0af728ef3cceb9615d90684bb5b2ca5f859ab0f0b704075871aa385b6b1b8ead809ca67454d9683fcf2ba03456d6fe2c4abe2b07f0fbdbb2f1c1";

    #[test]
    fn test_change_address_vectors() {
        let public_key = hex::decode(E2E_PUBLIC_KEY).unwrap();
        assert_eq!(
            change_address(&public_key, BitcoinNetwork::Testnet).unwrap(),
            "2NEp346GsvyPAu3X9oKGjrzLXc8vw8CqG7T"
        );
        assert_eq!(
            change_address(&public_key, BitcoinNetwork::Bitcoin).unwrap(),
            "3PFpzMLrKWsphFtc8BesF3MGPnimKMuF4x"
        );
    }

    #[test]
    fn test_compressed_key_gives_same_address() {
        let public_key = hex::decode(E2E_PUBLIC_KEY).unwrap();
        let compressed =
            compress_public_key(CurveType::Secp256k1, &public_key).unwrap();
        let address = change_address(&compressed, BitcoinNetwork::Testnet).unwrap();
        assert_eq!(address, "2NEp346GsvyPAu3X9oKGjrzLXc8vw8CqG7T");

        let parsed: Address = address
            .parse::<Address<NetworkUnchecked>>()
            .unwrap()
            .require_network(Network::Testnet)
            .unwrap();
        assert!(parsed.is_related_to_pubkey(&bitcoin::PublicKey::new(
            bitcoin::secp256k1::PublicKey::from_slice(&compressed).unwrap()
        )));
    }

    #[test]
    fn test_change_address_rejects_off_curve_key() {
        let mut public_key = hex::decode(E2E_PUBLIC_KEY).unwrap();
        public_key[64] ^= 0x01;
        assert!(change_address(&public_key, BitcoinNetwork::Bitcoin).is_err());
    }

    #[test]
    fn test_one_character_mutation_rejected() {
        let public_key = hex::decode(E2E_PUBLIC_KEY).unwrap();
        verify_change_output(&public_key, "2NEp346GsvyPAu3X9oKGjrzLXc8vw8CqG7T", BitcoinNetwork::Testnet)
            .unwrap();

        let err = verify_change_output(
            &public_key,
            "2NEp346GsvyPAu3X9oKGjrzLXc8vw8CqG7U",
            BitcoinNetwork::Testnet,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ChangeAddressMismatch);

        let err = verify_change_output(
            &public_key,
            "2NEp346GsvyPAu3X9oKGjrzLXc8vw8CqG7T",
            BitcoinNetwork::Bitcoin,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ChangeAddressMismatch);
    }

    #[test]
    fn test_verify_created_address() {
        let custody = SigningKey::from_slice(&[0x22; 32]).unwrap();
        let trusted = vec![custody.verifying_key().to_encoded_point(false).as_bytes().to_vec()];
        let public_key = hex::decode(E2E_PUBLIC_KEY).unwrap();
        let path = vec![0x8000002c, 0x80000001, 0x80000000, 0, 3];
        let record = ProvenanceRecord {
            wallet_id: "sub-wallet-1".into(),
            path: path.clone(),
            public_key: public_key.clone(),
        };
        let signature: Signature = custody.sign_prehash(&sha256(&record.to_der())).unwrap();

        let mut payload = CreatedAddressPayload {
            sub_wallet_id: "sub-wallet-1".into(),
            address: "2NEp346GsvyPAu3X9oKGjrzLXc8vw8CqG7T".into(),
            public_key,
            path,
            signature: signature.to_bytes().to_vec(),
        };
        verify_created_address("sub-wallet-1", &payload, BitcoinNetwork::Testnet, &trusted).unwrap();

        let err = verify_created_address("sub-wallet-2", &payload, BitcoinNetwork::Testnet, &trusted)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ExpectationMismatch);

        payload.address = "2NEp346GsvyPAu3X9oKGjrzLXc8vw8CqG7U".into();
        let err = verify_created_address("sub-wallet-1", &payload, BitcoinNetwork::Testnet, &trusted)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ChangeAddressMismatch);

        payload.address = "2NEp346GsvyPAu3X9oKGjrzLXc8vw8CqG7T".into();
        payload.path[4] = 4;
        let err = verify_created_address("sub-wallet-1", &payload, BitcoinNetwork::Testnet, &trusted)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProvenanceInvalid);
    }
}
