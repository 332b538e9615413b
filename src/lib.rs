//! Custody Signer Core Library
//!
//! Independent verification and co-signing of requests issued by a remote
//! custody service. Nothing the service claims is trusted: every digest is
//! rebuilt from the structured request, compared against the claim, and only
//! then handed to an external signer whose answer is verified in turn.
//!
//! # Architecture
//!
//! This crate provides:
//! - **codec**: DER encoders/decoders for the fixed custody schemas
//! - **signing**: per-chain pre-image reconstruction and the sign/verify loop
//! - **request**: one signable request variant per chain or operation
//! - **provenance**: custody-key provenance, recoverer schedules, change addresses
//! - **orchestrator**: webhook handling, validation, signing and submission
//! - **crypto**: secp256k1 and P-256 verification
//!
//! # Example
//!
//! ```rust,ignore
//! use custody_signer::{Orchestrator, TrustConfig, Environment, ValidationExpectations};
//! use std::sync::Arc;
//!
//! let config = TrustConfig::from_json(&config_json)?;
//! let trust = Arc::new(config.profile(Environment::Sandbox)?.clone());
//! let orchestrator = Orchestrator::new(trust, signer, client);
//!
//! let expectations = ValidationExpectations::for_sub_wallet("sub-wallet-1");
//! let processed = orchestrator.handle_webhook(&body, &expectations).await?;
//! println!("submitted {}", processed.request_id);
//! ```

pub mod codec;
pub mod config;
pub mod crypto;
pub mod eip712;
pub mod error;
pub mod orchestrator;
pub mod provenance;
pub mod request;
pub mod serde_bytes;
pub mod signing;
pub mod types;
pub mod utils;

// Re-export key types for convenience
pub use config::{BitcoinNetwork, Environment, TrustConfig, TrustProfile};
pub use error::{CustodyError, CustodyResult, ErrorCode, ErrorKind};
pub use orchestrator::{CustodyClient, Orchestrator, ProcessedRequest, WebhookEnvelope};
pub use request::{MessageType, RequestLifecycle, RequestStage, RequestState, SignableRequest};
pub use signing::{SignCallback, SignContext, SigningStrategy};
pub use types::*;
