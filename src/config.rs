//! Trust configuration
//!
//! Maps each custody environment to the keys allowed to vouch for public
//! keys and recoverer schedules, plus the Bitcoin network its addresses
//! live on. Loaded once and shared read-only behind an `Arc`.

use crate::codec::SubjectPublicKeyInfo;
use crate::crypto::{parse_public_key, CurveType};
use crate::error::{CustodyError, CustodyResult};
use crate::utils::{parse_hex_bytes, parse_json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Custody service environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Sandbox,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Sandbox => write!(f, "sandbox"),
        }
    }
}

/// Bitcoin network an environment's addresses belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitcoinNetwork {
    Bitcoin,
    Testnet,
}

impl BitcoinNetwork {
    pub fn to_network(self) -> bitcoin::Network {
        match self {
            Self::Bitcoin => bitcoin::Network::Bitcoin,
            Self::Testnet => bitcoin::Network::Testnet,
        }
    }
}

impl fmt::Display for BitcoinNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bitcoin => write!(f, "bitcoin"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrustProfile {
    trusted_custody_public_keys: Vec<String>,
    #[serde(default)]
    trusted_recoverer_public_keys: Vec<String>,
    bitcoin_network: BitcoinNetwork,
}

/// Validated trust material for one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustProfile {
    custody_keys: Vec<Vec<u8>>,
    recoverer_keys: Vec<Vec<u8>>,
    bitcoin_network: BitcoinNetwork,
}

impl TrustProfile {
    /// Build a profile from raw or SPKI-encoded P-256 keys.
    ///
    /// Every key is normalized to its 65-byte uncompressed form and at least
    /// one custody key is required.
    pub fn new(
        custody_keys: Vec<Vec<u8>>,
        recoverer_keys: Vec<Vec<u8>>,
        bitcoin_network: BitcoinNetwork,
    ) -> CustodyResult<Self> {
        if custody_keys.is_empty() {
            return Err(CustodyError::config("at least one trusted custody key is required"));
        }

        let custody_keys = custody_keys
            .iter()
            .map(|k| normalize_trusted_key(k))
            .collect::<CustodyResult<Vec<_>>>()?;
        let recoverer_keys = recoverer_keys
            .iter()
            .map(|k| normalize_trusted_key(k))
            .collect::<CustodyResult<Vec<_>>>()?;

        Ok(Self {
            custody_keys,
            recoverer_keys,
            bitcoin_network,
        })
    }

    pub fn custody_keys(&self) -> &[Vec<u8>] {
        &self.custody_keys
    }

    pub fn recoverer_keys(&self) -> &[Vec<u8>] {
        &self.recoverer_keys
    }

    pub fn bitcoin_network(&self) -> BitcoinNetwork {
        self.bitcoin_network
    }

    fn from_raw(raw: RawTrustProfile) -> CustodyResult<Self> {
        let decode = |keys: &[String]| -> CustodyResult<Vec<Vec<u8>>> {
            keys.iter()
                .map(|k| parse_hex_bytes(k).map_err(|e| CustodyError::config(e.message)))
                .collect()
        };
        Self::new(
            decode(&raw.trusted_custody_public_keys)?,
            decode(&raw.trusted_recoverer_public_keys)?,
            raw.bitcoin_network,
        )
    }
}

/// Trust profiles keyed by environment
#[derive(Debug, Clone, Default)]
pub struct TrustConfig {
    profiles: HashMap<Environment, TrustProfile>,
}

impl TrustConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, environment: Environment, profile: TrustProfile) -> Self {
        self.profiles.insert(environment, profile);
        self
    }

    /// Load `{ "production": {...}, "sandbox": {...} }`
    pub fn from_json(json: &str) -> CustodyResult<Self> {
        let raw: HashMap<Environment, RawTrustProfile> = parse_json(json)?;
        let mut profiles = HashMap::with_capacity(raw.len());
        for (environment, profile) in raw {
            let profile = TrustProfile::from_raw(profile).map_err(|e| {
                CustodyError::config(format!("{} profile: {}", environment, e.message))
            })?;
            profiles.insert(environment, profile);
        }

        if profiles.is_empty() {
            return Err(CustodyError::config("trust configuration has no environments"));
        }
        Ok(Self { profiles })
    }

    pub fn profile(&self, environment: Environment) -> CustodyResult<&TrustProfile> {
        self.profiles.get(&environment).ok_or_else(|| {
            CustodyError::config(format!("no trust profile for environment '{}'", environment))
        })
    }
}

/// Accept a raw point or a DER SubjectPublicKeyInfo; return the raw point
fn normalize_trusted_key(key: &[u8]) -> CustodyResult<Vec<u8>> {
    let raw = if key.first() == Some(&0x30) {
        let spki = SubjectPublicKeyInfo::from_der(key)
            .map_err(|e| CustodyError::config(format!("trusted key is not valid SPKI: {}", e)))?;
        if spki.curve != CurveType::Secp256r1 {
            return Err(CustodyError::config(format!(
                "trusted keys must be on p256, got {}",
                spki.curve
            )));
        }
        spki.public_key
    } else {
        key.to_vec()
    };

    let point = parse_public_key(CurveType::Secp256r1, &raw)
        .map_err(|e| CustodyError::config(format!("trusted key rejected: {}", e)))?;
    Ok(point.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const CUSTODY_KEY: &str = "04d65a93977caa3d1b081852ff57a79e465f1660577304baead505dd3a48589cf350185e895372df6221ea3a137557e473fddb6755f05bd507c3c533fce9c91285";
    const RECOVERER_KEY: &str = "045b36890dacbd7c9a96bb74a1ee28b3d2d75b72e09a20ef25cf8e6fd8a9f0350d0e14bed8d4682a34d83538bdff5b96e89a6666ec0db5745d02fa1210072df75a";

    #[test]
    fn test_load_config() {
        let json = format!(
            r#"{{
                "production": {{ "trustedCustodyPublicKeys": ["{c}"], "bitcoinNetwork": "bitcoin" }},
                "sandbox": {{
                    "trustedCustodyPublicKeys": ["0x{c}"],
                    "trustedRecovererPublicKeys": ["{r}"],
                    "bitcoinNetwork": "testnet"
                }}
            }}"#,
            c = CUSTODY_KEY,
            r = RECOVERER_KEY
        );
        let config = TrustConfig::from_json(&json).unwrap();

        let sandbox = config.profile(Environment::Sandbox).unwrap();
        assert_eq!(sandbox.bitcoin_network(), BitcoinNetwork::Testnet);
        assert_eq!(sandbox.custody_keys()[0], hex::decode(CUSTODY_KEY).unwrap());
        assert_eq!(sandbox.recoverer_keys().len(), 1);

        let production = config.profile(Environment::Production).unwrap();
        assert!(production.recoverer_keys().is_empty());
        assert_eq!(production.bitcoin_network(), BitcoinNetwork::Bitcoin);
    }

    #[test]
    fn test_spki_keys_are_unwrapped() {
        let raw = hex::decode(CUSTODY_KEY).unwrap();
        let spki = SubjectPublicKeyInfo { curve: CurveType::Secp256r1, public_key: raw.clone() };
        let profile =
            TrustProfile::new(vec![spki.to_der()], vec![], BitcoinNetwork::Testnet).unwrap();
        assert_eq!(profile.custody_keys(), &[raw]);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let err = TrustProfile::new(vec![vec![0x04; 65]], vec![], BitcoinNetwork::Bitcoin)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);

        let err = TrustProfile::new(vec![], vec![], BitcoinNetwork::Bitcoin).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);

        let secp = SubjectPublicKeyInfo {
            curve: CurveType::Secp256k1,
            public_key: hex::decode(CUSTODY_KEY).unwrap(),
        };
        assert!(TrustProfile::new(vec![secp.to_der()], vec![], BitcoinNetwork::Bitcoin).is_err());
    }

    #[test]
    fn test_missing_environment() {
        let json = format!(
            r#"{{ "sandbox": {{ "trustedCustodyPublicKeys": ["{}"], "bitcoinNetwork": "testnet" }} }}"#,
            CUSTODY_KEY
        );
        let config = TrustConfig::from_json(&json).unwrap();
        assert_eq!(
            config.profile(Environment::Production).unwrap_err().code,
            ErrorCode::ConfigError
        );
        assert!(TrustConfig::from_json(r#"{ "staging": {} }"#).is_err());
    }
}
