//! Request Orchestration
//!
//! Drives one request from payload to submission:
//! 1. Build the variant from a webhook envelope or a creation response
//! 2. Validate (schema, provenance, caller expectations)
//! 3. Prepare entries and check the service's digest claims
//! 4. Sign and verify every entry
//! 5. Submit and confirm the service answered for the same request
//!
//! Any failure rejects the request; nothing is retried here.

use crate::config::TrustProfile;
use crate::error::{CustodyError, CustodyResult, ErrorCode, ErrorKind};
use crate::provenance::{verify_created_address, CreatedAddressPayload};
use crate::request::{MessageType, RequestLifecycle, RequestState, SignableRequest};
use crate::signing::{prepare_entries, sign_entries, SignCallback, SigningStrategy};
use crate::types::{SignRequest, SignatureSubmission, ValidationExpectations};
use crate::utils::parse_json;
use crate::{log_error, log_info, log_warn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outbound half of the custody service API
#[async_trait]
pub trait CustodyClient: Send + Sync {
    /// Submit signatures; returns the id of the request the service applied them to
    async fn submit_signatures(&self, submission: &SignatureSubmission) -> CustodyResult<String>;
}

/// `{ "type": ..., "data": ... }` as delivered by the webhook transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub data: serde_json::Value,
}

/// What a completed request produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedRequest {
    pub request_id: String,
    pub kind: &'static str,
    pub sign_requests: Vec<SignRequest>,
    pub state: RequestState,
}

pub struct Orchestrator {
    trust: Arc<TrustProfile>,
    signer: Arc<dyn SignCallback>,
    client: Arc<dyn CustodyClient>,
    strategy: SigningStrategy,
}

impl Orchestrator {
    pub fn new(
        trust: Arc<TrustProfile>,
        signer: Arc<dyn SignCallback>,
        client: Arc<dyn CustodyClient>,
    ) -> Self {
        Self {
            trust,
            signer,
            client,
            strategy: SigningStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: SigningStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn trust(&self) -> &TrustProfile {
        &self.trust
    }

    pub fn strategy(&self) -> SigningStrategy {
        self.strategy
    }

    /// Build the variant for `message_type`, using the profile's Bitcoin network
    pub fn build_request(
        &self,
        message_type: MessageType,
        data: serde_json::Value,
    ) -> CustodyResult<SignableRequest> {
        SignableRequest::from_message(message_type, data, self.trust.bitcoin_network())
    }

    /// Parse a raw webhook body and run the request it carries
    pub async fn handle_webhook(
        &self,
        body: &str,
        expectations: &ValidationExpectations,
    ) -> CustodyResult<ProcessedRequest> {
        let envelope: WebhookEnvelope = parse_json(body)?;
        let message_type: MessageType = envelope.message_type.parse().map_err(|e| {
            log_warn!("orchestrator", "Unsupported webhook type", message_type = &envelope.message_type);
            e
        })?;

        let request = self.build_request(message_type, envelope.data).map_err(|e| {
            log_error!(
                "orchestrator",
                "Request rejected at construction",
                message_type = message_type,
                code = format!("{:?}", e.code)
            );
            e
        })?;
        self.process(request, expectations).await
    }

    /// Validate, sign and submit one request
    pub async fn process(
        &self,
        request: SignableRequest,
        expectations: &ValidationExpectations,
    ) -> CustodyResult<ProcessedRequest> {
        let mut lifecycle = RequestLifecycle::new();
        match self.run(&request, expectations, &mut lifecycle).await {
            Ok(sign_requests) => {
                log_info!(
                    "orchestrator",
                    "Request submitted",
                    request_id = request.id(),
                    kind = request.kind(),
                    signatures = sign_requests.len()
                );
                Ok(ProcessedRequest {
                    request_id: request.id().to_string(),
                    kind: request.kind(),
                    sign_requests,
                    state: lifecycle.state(),
                })
            }
            Err(e) => {
                let failed_at = lifecycle.state();
                if lifecycle.reject().is_err() {
                    log_warn!("orchestrator", "Request already terminal", state = failed_at);
                }
                log_error!(
                    "orchestrator",
                    "Request rejected",
                    request_id = request.id(),
                    kind = request.kind(),
                    stage = failed_at,
                    code = format!("{:?}", e.code),
                    error = &e.message
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: &SignableRequest,
        expectations: &ValidationExpectations,
        lifecycle: &mut RequestLifecycle,
    ) -> CustodyResult<Vec<SignRequest>> {
        request.validate(&self.trust, expectations)?;
        lifecycle.mark_validated()?;

        let entries = prepare_entries(request)?;
        lifecycle.begin_signing(entries.len())?;
        let sign_requests = sign_entries(
            request.id(),
            entries,
            Arc::clone(&self.signer),
            self.strategy,
            lifecycle,
        )
        .await?;
        lifecycle.mark_signed()?;

        let submission = SignatureSubmission {
            request_id: request.id().to_string(),
            sign_requests,
        };
        let returned_id = self
            .client
            .submit_signatures(&submission)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::Submission => e,
                _ => CustodyError::submission_failed(format!("submission failed: {}", e.message)),
            })?;

        if returned_id != submission.request_id {
            return Err(CustodyError::new(
                ErrorCode::SubmissionIdMismatch,
                "custody service applied the signatures to a different request",
            )
            .with_details(format!(
                "expected={} actual={}",
                submission.request_id, returned_id
            )));
        }
        lifecycle.mark_submitted()?;
        Ok(submission.sign_requests)
    }

    /// Check an address-creation response against the trusted custody keys
    pub fn verify_created_address(
        &self,
        sub_wallet_id: &str,
        payload: &CreatedAddressPayload,
    ) -> CustodyResult<()> {
        verify_created_address(
            sub_wallet_id,
            payload,
            self.trust.bitcoin_network(),
            self.trust.custody_keys(),
        )
    }
}
