use custody_signer::codec::{
    decode_recoverer_schedules, encode_recoverer_schedules, Clause, PolicyTemplate, ProvenanceRecord,
    Schedule, TxDigestPath,
};
use custody_signer::utils::{base58check_decode, parse_decimal_bytes, sha256};
use proptest::prelude::*;

fn any_clause() -> impl Strategy<Value = Clause> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 33..=65), 1..4).prop_flat_map(|keys| {
        let len = keys.len() as u32;
        (1..=len).prop_map(move |quorum_count| Clause {
            quorum_count,
            keys: keys.clone(),
        })
    })
}

fn any_schedules() -> impl Strategy<Value = Vec<Schedule>> {
    prop::collection::vec(prop::collection::vec(any_clause(), 0..3), 0..3)
}

fn any_template() -> impl Strategy<Value = PolicyTemplate> {
    (any::<u64>(), any_schedules(), any_schedules()).prop_map(
        |(expiry_timestamp, delegate_schedules, recoverer_schedules)| PolicyTemplate {
            expiry_timestamp,
            delegate_schedules,
            recoverer_schedules,
        },
    )
}

proptest! {
    #[test]
    fn policy_template_der_roundtrips(template in any_template()) {
        let der = template.to_der();
        prop_assert_eq!(PolicyTemplate::from_der(&der).unwrap(), template);
    }

    #[test]
    fn policy_digest_tracks_expiry(template in any_template(), other in any::<u64>()) {
        prop_assume!(other != template.expiry_timestamp);
        let mut changed = template.clone();
        changed.expiry_timestamp = other;
        prop_assert_ne!(sha256(&template.to_der()), sha256(&changed.to_der()));
    }

    #[test]
    fn recoverer_schedules_roundtrip(schedules in any_schedules()) {
        let der = encode_recoverer_schedules(&schedules);
        prop_assert_eq!(decode_recoverer_schedules(&der).unwrap(), schedules);
    }

    #[test]
    fn tx_digest_path_roundtrips(
        digest in prop::collection::vec(any::<u8>(), 1..300),
        path in prop::collection::vec(any::<u32>(), 0..8),
        algo in prop::option::of(prop::collection::vec(any::<u8>(), 1..16)),
    ) {
        let record = TxDigestPath { digest, path, algo };
        prop_assert_eq!(TxDigestPath::from_der(&record.to_der()).unwrap(), record);
    }

    #[test]
    fn provenance_record_rejects_trailing_bytes(
        wallet_id in "[a-z0-9-]{1,40}",
        path in prop::collection::vec(any::<u32>(), 5),
        public_key in prop::collection::vec(any::<u8>(), 65),
        trailing in any::<u8>(),
    ) {
        let record = ProvenanceRecord { wallet_id, path, public_key };
        let mut der = record.to_der();
        prop_assert_eq!(ProvenanceRecord::from_der(&der).unwrap(), record);
        der.push(trailing);
        prop_assert!(ProvenanceRecord::from_der(&der).is_err());
    }

    #[test]
    fn decimal_bytes_match_native(value in any::<u128>()) {
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        prop_assert_eq!(parse_decimal_bytes(&value.to_string()).unwrap(), bytes[first..].to_vec());
    }

    #[test]
    fn base58check_detects_single_character_edits(
        payload in prop::collection::vec(any::<u8>(), 21),
        position in any::<prop::sample::Index>(),
    ) {
        let encoded = bitcoin::base58::encode_check(&payload);
        prop_assert_eq!(base58check_decode(&encoded, bs58::Alphabet::BITCOIN).unwrap(), payload.clone());

        let mut chars: Vec<char> = encoded.chars().collect();
        let i = position.index(chars.len());
        chars[i] = if chars[i] == '2' { '3' } else { '2' };
        let mutated: String = chars.into_iter().collect();
        match base58check_decode(&mutated, bs58::Alphabet::BITCOIN) {
            Ok(decoded) => prop_assert_ne!(decoded, payload),
            Err(_) => {}
        }
    }
}
