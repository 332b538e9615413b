//! Sign-and-verify loop
//!
//! Every delegate entry is prepared (digest rebuilt, DER sign data derived,
//! service claim compared) before the signer is contacted at all. Signing
//! then runs sequentially or one task per entry; either way each returned
//! pair is verified as soon as it arrives and results keep entry order.

use crate::crypto::{verify_public_key_signature_pair, CurveType};
use crate::error::{CustodyError, CustodyResult, ErrorCode, ErrorKind};
use crate::request::{RequestLifecycle, SignableRequest};
use crate::types::{PublicKeySignaturePair, SignDigest, SignRequest, UnverifiedMessageData};
use crate::{log_debug, log_info, log_warn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Context passed to the signer with every digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignContext {
    pub request_id: String,
}

/// Pluggable key custody: software key, HSM, cloud KMS.
///
/// Implementations must return an error rather than hang when they cannot
/// sign. No timeout or retry is applied around this call.
#[async_trait]
pub trait SignCallback: Send + Sync {
    async fn sign(
        &self,
        sign_digest: &SignDigest,
        context: &SignContext,
    ) -> CustodyResult<PublicKeySignaturePair>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningStrategy {
    #[default]
    Sequential,
    /// One task per entry; the first failure aborts the rest
    Concurrent,
}

/// A delegate entry whose claim has been checked and is ready for the signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningEntry {
    pub index: usize,
    pub sign_digest: SignDigest,
    /// What the returned signature must verify over
    pub verification_message: [u8; 32],
    pub curve: CurveType,
    pub expected_public_key: Option<Vec<u8>>,
}

/// Rebuild and check every entry of `request`. Any mismatch aborts before
/// the signer is called.
pub fn prepare_entries(request: &SignableRequest) -> CustodyResult<Vec<SigningEntry>> {
    request
        .delegate_sign_data()
        .iter()
        .enumerate()
        .map(|(index, delegate)| {
            let digest = request.expected_digest(index)?;
            let sign_digest = SignDigest::new(
                &digest,
                &delegate.hd_wallet_path,
                delegate.algorithm.as_deref(),
            )?;
            check_claim(index, &digest, &sign_digest, &delegate.unverified_message_data)?;

            Ok(SigningEntry {
                index,
                verification_message: request.verification_message(&digest, &sign_digest)?,
                sign_digest,
                curve: request.curve(),
                expected_public_key: request.expected_signer_key(index),
            })
        })
        .collect()
}

fn check_claim(
    index: usize,
    digest: &[u8],
    sign_digest: &SignDigest,
    claim: &UnverifiedMessageData,
) -> CustodyResult<()> {
    let checks: [(ErrorCode, &str, &[u8], &[u8]); 3] = [
        (ErrorCode::DigestMismatch, "digest", digest, &claim.message),
        (ErrorCode::SignDataMismatch, "signData", sign_digest.sign_data(), &claim.sign_data),
        (
            ErrorCode::ShaSignDataMismatch,
            "shaSignData",
            sign_digest.sha_sign_data(),
            &claim.sha_sign_data,
        ),
    ];

    for (code, field, expected, claimed) in checks {
        if expected != claimed {
            log_warn!(
                "signing",
                "Service claim does not match reconstruction",
                entry = index,
                field = field,
                digest = hex::encode(expected)
            );
            return Err(CustodyError::mismatch(
                code,
                &format!("entry {} {}", index, field),
                expected,
                claimed,
            ));
        }
    }
    Ok(())
}

/// Sign all entries and return one `SignRequest` per entry, in entry order.
///
/// `lifecycle` must be in the signing state; it advances once per verified
/// signature.
pub async fn sign_entries(
    request_id: &str,
    entries: Vec<SigningEntry>,
    signer: Arc<dyn SignCallback>,
    strategy: SigningStrategy,
    lifecycle: &mut RequestLifecycle,
) -> CustodyResult<Vec<SignRequest>> {
    let context = SignContext { request_id: request_id.to_string() };
    log_info!(
        "signing",
        "Signing request",
        request_id = request_id,
        entries = entries.len(),
        strategy = format!("{:?}", strategy)
    );

    let pairs = match strategy {
        SigningStrategy::Sequential => sign_sequential(entries, signer, &context, lifecycle).await?,
        SigningStrategy::Concurrent => sign_concurrent(entries, signer, &context, lifecycle).await?,
    };

    Ok(pairs
        .into_iter()
        .map(|pair| SignRequest { public_key_signature_pairs: vec![pair] })
        .collect())
}

async fn sign_sequential(
    entries: Vec<SigningEntry>,
    signer: Arc<dyn SignCallback>,
    context: &SignContext,
    lifecycle: &mut RequestLifecycle,
) -> CustodyResult<Vec<PublicKeySignaturePair>> {
    let mut pairs = Vec::with_capacity(entries.len());
    for entry in &entries {
        pairs.push(sign_one(signer.as_ref(), entry, context).await?);
        lifecycle.record_signature()?;
    }
    Ok(pairs)
}

async fn sign_concurrent(
    entries: Vec<SigningEntry>,
    signer: Arc<dyn SignCallback>,
    context: &SignContext,
    lifecycle: &mut RequestLifecycle,
) -> CustodyResult<Vec<PublicKeySignaturePair>> {
    let total = entries.len();
    let mut tasks = JoinSet::new();
    for entry in entries {
        let signer = Arc::clone(&signer);
        let context = context.clone();
        tasks.spawn(async move {
            let pair = sign_one(signer.as_ref(), &entry, &context).await?;
            Ok::<_, CustodyError>((entry.index, pair))
        });
    }

    let mut slots: Vec<Option<PublicKeySignaturePair>> = vec![None; total];
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(CustodyError::from).and_then(|result| result);
        match outcome {
            Ok((index, pair)) => {
                let slot = slots.get_mut(index).ok_or_else(|| {
                    CustodyError::internal(format!("entry index {} out of range", index))
                })?;
                *slot = Some(pair);
                lifecycle.record_signature()?;
            }
            Err(e) => {
                tasks.abort_all();
                return Err(e);
            }
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| CustodyError::internal(format!("entry {} was never signed", index)))
        })
        .collect()
}

async fn sign_one(
    signer: &dyn SignCallback,
    entry: &SigningEntry,
    context: &SignContext,
) -> CustodyResult<PublicKeySignaturePair> {
    let pair = signer
        .sign(&entry.sign_digest, context)
        .await
        .map_err(|e| signer_error(entry.index, e))?;
    verify_pair(entry, &pair)?;
    log_debug!(
        "signing",
        "Signature verified",
        entry = entry.index,
        public_key = hex::encode(&pair.public_key)
    );
    Ok(pair)
}

fn signer_error(index: usize, error: CustodyError) -> CustodyError {
    if error.kind() == ErrorKind::Signer {
        return error;
    }
    CustodyError::signer_failed(format!("signer failed on entry {}: {}", index, error.message))
        .with_details(format!("{:?}", error.code))
}

/// Check a returned pair against the entry it answers
pub fn verify_pair(entry: &SigningEntry, pair: &PublicKeySignaturePair) -> CustodyResult<()> {
    verify_public_key_signature_pair(pair, &entry.verification_message, entry.curve)?;

    if let Some(expected) = &entry.expected_public_key {
        if expected != &pair.public_key {
            return Err(CustodyError::mismatch(
                ErrorCode::SignerKeyMismatch,
                &format!("entry {} signer public key", entry.index),
                expected,
                &pair.public_key,
            ));
        }
    }
    Ok(())
}
