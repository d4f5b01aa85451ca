//! [`MemoryKeyStore`]: process-local [`KeyStore`] backed by a tokio `RwLock`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::protocol::TemporaryExposureKey;
use tokio::sync::RwLock;

use super::{KeyStore, StoreError};
use crate::crypto::sealed_box::{generate_keypair, KEY_LEN};

/// Per-app-public-key limits.
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    /// Total keys one app public key may ever submit.
    pub max_keys: usize,
    /// How long after its first upload an app public key stays usable.
    pub window: Duration,
}

#[derive(Debug, Clone, Copy)]
struct AppKeyUsage {
    first_used: DateTime<Utc>,
    keys_stored: usize,
}

/// Server secret key bytes. Zeroed on drop and never printed.
struct SecretBytes([u8; KEY_LEN]);

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

#[derive(Default)]
struct Inner {
    server_keys: HashMap<[u8; KEY_LEN], SecretBytes>,
    app_keys: HashMap<Vec<u8>, AppKeyUsage>,
    /// Accepted keys paired with the upload timestamp they arrived with.
    diagnosis_keys: Vec<(DateTime<Utc>, TemporaryExposureKey)>,
}

/// Thread-safe in-memory key store.
///
/// Cloning is cheap and every clone shares the same state. Each
/// [`KeyStore::store_keys`] call checks and records under a single write
/// lock, so a batch is either fully recorded or not at all.
#[derive(Clone)]
pub struct MemoryKeyStore {
    inner: Arc<RwLock<Inner>>,
    policy: QuotaPolicy,
}

impl std::fmt::Debug for MemoryKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKeyStore")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl MemoryKeyStore {
    /// Create an empty store enforcing `policy`.
    pub fn new(policy: QuotaPolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            policy,
        }
    }

    /// Generate a server keypair, register it, and return its public half.
    pub async fn generate_server_keypair(&self) -> [u8; KEY_LEN] {
        let keypair = generate_keypair();
        self.inner
            .write()
            .await
            .server_keys
            .insert(keypair.public, SecretBytes(keypair.secret));
        keypair.public
    }

    /// Snapshot of every diagnosis key recorded so far, in arrival order.
    #[cfg(test)]
    pub async fn diagnosis_keys(&self) -> Vec<(DateTime<Utc>, TemporaryExposureKey)> {
        self.inner.read().await.diagnosis_keys.clone()
    }

    /// Keys still available to `app_public_key`, or `None` if it was never used.
    #[cfg(test)]
    pub async fn remaining_keys(&self, app_public_key: &[u8]) -> Option<usize> {
        self.inner
            .read()
            .await
            .app_keys
            .get(app_public_key)
            .map(|u| self.policy.max_keys.saturating_sub(u.keys_stored))
    }

    fn check_usage(
        &self,
        usage: Option<&AppKeyUsage>,
        batch: usize,
        now: DateTime<Utc>,
    ) -> Result<AppKeyUsage, StoreError> {
        let usage = usage.copied().unwrap_or(AppKeyUsage {
            first_used: now,
            keys_stored: 0,
        });

        let age = (now - usage.first_used).to_std().unwrap_or_default();
        if usage.keys_stored >= self.policy.max_keys || age > self.policy.window {
            return Err(StoreError::KeyConsumed);
        }
        if batch > self.policy.max_keys - usage.keys_stored {
            return Err(StoreError::TooManyKeys);
        }

        Ok(AppKeyUsage {
            first_used: usage.first_used,
            keys_stored: usage.keys_stored + batch,
        })
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn private_key_for(&self, server_public_key: &[u8]) -> Result<Vec<u8>, StoreError> {
        let lock = self.inner.read().await;
        lock.server_keys
            .get(server_public_key)
            .map(|secret| secret.0.to_vec())
            .ok_or(StoreError::NotFound)
    }

    async fn store_keys(
        &self,
        app_public_key: &[u8],
        keys: &[TemporaryExposureKey],
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut lock = self.inner.write().await;
        let usage = self.check_usage(lock.app_keys.get(app_public_key), keys.len(), Utc::now())?;

        lock.app_keys.insert(app_public_key.to_vec(), usage);
        lock.diagnosis_keys
            .extend(keys.iter().map(|k| (timestamp, k.clone())));
        Ok(())
    }
}
