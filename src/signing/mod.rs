//! Digest Reconstruction and Signing
//!
//! This module turns a validated request into signatures:
//! 1. Rebuild each chain's exact signing bytes (`preimage`)
//! 2. Wrap every digest with its derivation path and check the service's claim
//! 3. Hand the sign data to the external signer and verify what comes back
//!
//! Supported chains:
//! - Bitcoin (BIP-143, P2SH-P2WPKH)
//! - Ethereum (legacy EIP-155, personal_sign, EIP-712)
//! - Ripple, Cardano, Solana (legacy and v0)

pub mod preimage;
pub mod signer;

pub use preimage::*;
pub use signer::*;
