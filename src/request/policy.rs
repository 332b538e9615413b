//! Wallet policy change requests
//!
//! The digest is SHA-256 of the DER policy template. Validation checks the
//! delegate schedules against what the caller expects and the recoverer
//! schedules against a trusted recoverer signature.

use super::check_delegate_count;
use crate::codec::PolicyTemplate;
use crate::config::TrustProfile;
use crate::error::{CustodyError, CustodyResult};
use crate::provenance::verify_recoverer_schedules;
use crate::serde_bytes::hex_bytes;
use crate::types::{DelegateSignData, ValidationExpectations};
use crate::utils::{from_json_value, sha256};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyChangeRequestPayload {
    pub id: String,
    pub policy_template: PolicyTemplate,
    #[serde(with = "hex_bytes")]
    pub recoverer_schedules_signature: Vec<u8>,
    pub delegate_sign_data: Vec<DelegateSignData>,
}

#[derive(Debug, Clone)]
pub struct PolicyChangeRequest {
    payload: PolicyChangeRequestPayload,
    digest: OnceLock<[u8; 32]>,
}

impl PolicyChangeRequest {
    pub fn new(payload: PolicyChangeRequestPayload) -> CustodyResult<Self> {
        check_delegate_count(&payload.delegate_sign_data, None)?;
        for (index, clause) in payload
            .policy_template
            .delegate_schedules
            .iter()
            .chain(&payload.policy_template.recoverer_schedules)
            .flatten()
            .enumerate()
        {
            if clause.quorum_count == 0 || clause.quorum_count as usize > clause.keys.len() {
                return Err(CustodyError::invalid_input(format!(
                    "clause {} needs a quorum between 1 and {}, got {}",
                    index,
                    clause.keys.len(),
                    clause.quorum_count
                )));
            }
        }
        Ok(Self {
            payload,
            digest: OnceLock::new(),
        })
    }

    pub fn from_value(data: serde_json::Value) -> CustodyResult<Self> {
        Self::new(from_json_value(data)?)
    }

    pub fn id(&self) -> &str {
        &self.payload.id
    }

    pub fn template(&self) -> &PolicyTemplate {
        &self.payload.policy_template
    }

    pub fn delegate_sign_data(&self) -> &[DelegateSignData] {
        &self.payload.delegate_sign_data
    }

    pub fn digest(&self) -> [u8; 32] {
        *self
            .digest
            .get_or_init(|| sha256(&self.payload.policy_template.to_der()))
    }

    pub fn validate(
        &self,
        trust: &TrustProfile,
        expectations: &ValidationExpectations,
    ) -> CustodyResult<()> {
        let template = &self.payload.policy_template;

        if let Some(expected) = &expectations.expected_delegate_schedules {
            if expected != &template.delegate_schedules {
                return Err(CustodyError::expectation_mismatch(
                    "delegateSchedules",
                    &serde_json::to_string(expected)?,
                    &serde_json::to_string(&template.delegate_schedules)?,
                ));
            }
        }

        verify_recoverer_schedules(
            &template.recoverer_schedules,
            &self.payload.recoverer_schedules_signature,
            trust.recoverer_keys(),
        )
    }
}
