//! Structured logging and optional OpenTelemetry span export.
//!
//! # Telemetry invariants
//!
//! - **No key material** (server or app keys, nonces, diagnosis key data)
//!   may appear in any span attribute or log field.
//! - Bearer tokens appear in logs only in masked form.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
