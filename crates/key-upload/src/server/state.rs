//! Shared application state injected into every Axum handler.

use std::sync::Arc;
use std::time::Duration;

use crate::events::{EventLogger, MemoryEventStore, TokenTable};
use crate::store::memory::{MemoryKeyStore, QuotaPolicy};
use crate::upload::UploadPipeline;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-backed) so that Axum can clone the
/// state for each request without copying expensive data.
#[derive(Clone)]
pub struct AppState {
    /// Decrypts, validates and persists uploads.
    pub pipeline: UploadPipeline,
    /// Counts one-time-key events reported on `/events`.
    pub events: EventLogger,
}

impl AppState {
    /// Create a new [`AppState`] from its services.
    pub fn new(pipeline: UploadPipeline, events: EventLogger) -> Self {
        Self { pipeline, events }
    }
}

impl Default for AppState {
    /// Creates an [`AppState`] over empty in-memory stores, suitable for tests.
    fn default() -> Self {
        let keys = MemoryKeyStore::new(QuotaPolicy {
            max_keys: common::protocol::MAX_KEYS_IN_UPLOAD,
            window: Duration::from_secs(15 * 24 * 3600),
        });
        Self::new(
            UploadPipeline::new(Arc::new(keys), Duration::from_secs(3600)),
            EventLogger::new(Arc::new(TokenTable::new()), Arc::new(MemoryEventStore::new())),
        )
    }
}
