//! The upload pipeline: one encoded [`EncryptedUploadRequest`] in, one
//! [`UploadReply`] out.
//!
//! Steps run strictly in order and the first failure ends the request:
//!
//! 1. decode the envelope
//! 2. server public key length
//! 3. resolve the server private key (the only store read)
//! 4. nonce length
//! 5. app public key length
//! 6. stored private key length
//! 7. open the sealed box
//! 8. decode the inner [`Upload`]
//! 9. timestamp within the skew window
//! 10. key count
//! 11. per-key and batch validation
//! 12. persist (the only store write)
//!
//! Each rejection is logged exactly once, at the severity the failure table
//! assigns. A successful upload logs nothing at `warn` or above.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use common::protocol::{
    EncryptedUploadRequest, EncryptedUploadResponse, ErrorCode, Upload, MAX_KEYS_IN_UPLOAD,
};
use common::{Severity, UploadFailure};
use prost::Message;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use super::validator::validate_keys;
use crate::crypto::{self, KEY_LEN, NONCE_LEN};
use crate::store::{KeyStore, StoreError};

/// Status and body to send back for one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReply {
    pub status: u16,
    pub response: EncryptedUploadResponse,
}

impl UploadReply {
    fn accepted() -> Self {
        Self {
            status: 200,
            response: EncryptedUploadResponse::with_code(ErrorCode::None),
        }
    }

    /// Log `failure` once and build the matching reply.
    fn rejected(failure: UploadFailure) -> Self {
        let outcome = failure.outcome();
        match outcome.severity {
            Severity::Warn => warn!(code = ?outcome.code, status = outcome.status, "{failure}"),
            Severity::Error => error!(code = ?outcome.code, status = outcome.status, "{failure}"),
        }
        Self {
            status: outcome.status,
            response: EncryptedUploadResponse::with_code(outcome.code),
        }
    }
}

/// Server private key bytes as returned by the store. Zeroed on drop.
struct PrivateKey(Vec<u8>);

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

/// Decrypts, validates and persists diagnosis key uploads.
#[derive(Clone)]
pub struct UploadPipeline {
    store: Arc<dyn KeyStore>,
    max_timestamp_skew: Duration,
}

impl UploadPipeline {
    /// Create a pipeline persisting into `store` and accepting upload
    /// timestamps within `max_timestamp_skew` of the server clock.
    pub fn new(store: Arc<dyn KeyStore>, max_timestamp_skew: Duration) -> Self {
        Self {
            store,
            max_timestamp_skew,
        }
    }

    /// Run one upload through every step and produce its reply.
    pub async fn handle(&self, body: &[u8]) -> UploadReply {
        let span = info_span!("upload", request_id = %Uuid::new_v4());
        async {
            match self.process(body).await {
                Ok(()) => UploadReply::accepted(),
                Err(failure) => UploadReply::rejected(failure),
            }
        }
        .instrument(span)
        .await
    }

    async fn process(&self, body: &[u8]) -> Result<(), UploadFailure> {
        let request =
            EncryptedUploadRequest::decode(body).map_err(|_| UploadFailure::MalformedEnvelope)?;

        ensure_len(&request.server_public_key, KEY_LEN, UploadFailure::ServerPublicKeyLength)?;

        let private_key = self
            .store
            .private_key_for(&request.server_public_key)
            .await
            .map(PrivateKey)
            .map_err(|e| {
                debug!(error = %e, "server keypair lookup failed");
                UploadFailure::UnresolvedKeypair
            })?;

        ensure_len(&request.nonce, NONCE_LEN, UploadFailure::NonceLength)?;
        ensure_len(&request.app_public_key, KEY_LEN, UploadFailure::AppPublicKeyLength)?;
        ensure_len(&private_key.0, KEY_LEN, UploadFailure::ServerPrivateKeyLength)?;

        let plaintext = crypto::open(
            &request.payload,
            &request.nonce,
            &request.app_public_key,
            &private_key.0,
        )
        .map_err(|_| UploadFailure::DecryptionFailed)?;
        drop(private_key);

        let upload =
            Upload::decode(plaintext.as_slice()).map_err(|_| UploadFailure::MalformedPayload)?;

        let timestamp = check_timestamp(&upload, Utc::now(), self.max_timestamp_skew)?;
        check_key_count(upload.keys.len())?;
        validate_keys(&upload.keys)?;

        self.store
            .store_keys(&request.app_public_key, &upload.keys, timestamp)
            .await
            .map_err(store_failure)?;

        debug!(keys = upload.keys.len(), "diagnosis keys stored");
        Ok(())
    }
}

fn ensure_len(bytes: &[u8], expected: usize, failure: UploadFailure) -> Result<(), UploadFailure> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(failure)
    }
}

/// Resolve the upload's timestamp and require it within `skew` of `now`,
/// in either direction.
fn check_timestamp(
    upload: &Upload,
    now: DateTime<Utc>,
    skew: Duration,
) -> Result<DateTime<Utc>, UploadFailure> {
    let timestamp = upload
        .timestamp
        .as_ref()
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts.seconds, u32::try_from(ts.nanos).ok()?))
        .ok_or(UploadFailure::InvalidTimestamp)?;

    let skew = TimeDelta::from_std(skew).map_err(|_| UploadFailure::InvalidTimestamp)?;
    if (timestamp - now).abs() > skew {
        return Err(UploadFailure::InvalidTimestamp);
    }
    Ok(timestamp)
}

fn check_key_count(count: usize) -> Result<(), UploadFailure> {
    match count {
        0 => Err(UploadFailure::NoKeys),
        n if n > MAX_KEYS_IN_UPLOAD => Err(UploadFailure::TooManyKeys),
        _ => Ok(()),
    }
}

fn store_failure(err: StoreError) -> UploadFailure {
    match err {
        StoreError::KeyConsumed => UploadFailure::KeyConsumed,
        StoreError::TooManyKeys => UploadFailure::QuotaExceeded,
        other => {
            debug!(error = %other, "key store write failed");
            UploadFailure::StoreFailed
        }
    }
}
