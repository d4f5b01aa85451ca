//! Persistence seam for server keypairs and submitted diagnosis keys.
//!
//! # Lifecycle
//!
//! 1. A server keypair is issued and registered; its public half reaches the
//!    app out of band (key claim flow, not part of this service).
//! 2. The upload pipeline resolves the private half with
//!    [`KeyStore::private_key_for`] to open the app's envelope.
//! 3. Fully validated batches are handed to [`KeyStore::store_keys`], which
//!    enforces the per-app-key budget and reuse window.
//!
//! # Invariants
//!
//! - `store_keys` is all-or-nothing: either every key of the batch is
//!   recorded or none is, including when the caller is cancelled.
//! - Private key material is never logged.

pub mod memory;

pub use memory::MemoryKeyStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::protocol::TemporaryExposureKey;
use thiserror::Error;

/// Errors produced by a [`KeyStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No private key is registered for the requested public key.
    #[error("no private key for server public key")]
    NotFound,

    /// The app public key is past its reuse window or has spent its budget.
    #[error("app public key already consumed")]
    KeyConsumed,

    /// Storing the batch would exceed the app public key's remaining budget.
    #[error("not enough keys remaining for app public key")]
    TooManyKeys,

    /// Any other backend failure.
    #[error("key store backend failure: {0}")]
    Backend(String),
}

/// Durable home of server keypairs and diagnosis keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Return the private key paired with `server_public_key`.
    ///
    /// The returned bytes are whatever the backend holds; callers must check
    /// the length before use.
    async fn private_key_for(&self, server_public_key: &[u8]) -> Result<Vec<u8>, StoreError>;

    /// Atomically record `keys` against `app_public_key`.
    async fn store_keys(
        &self,
        app_public_key: &[u8],
        keys: &[TemporaryExposureKey],
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
