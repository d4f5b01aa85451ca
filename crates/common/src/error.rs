//! Upload failure taxonomy and its mapping onto the wire.
//!
//! Every way an upload can be rejected is one [`UploadFailure`] variant. The
//! variant's `Display` text is the log message, and [`UploadFailure::outcome`]
//! is the single table that decides the wire code, HTTP status and log
//! severity. Changing any entry is a breaking change to the client protocol.

use thiserror::Error;

use crate::protocol::ErrorCode;

/// Log severity attached to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client-attributable; logged at `warn`.
    Warn,
    /// The service's own state is suspect; logged at `error`.
    Error,
}

/// Terminal result of mapping a failure: what the client sees and how loudly
/// the server logs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub code: ErrorCode,
    pub status: u16,
    pub severity: Severity,
}

/// A rejected upload, named by the check that rejected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UploadFailure {
    #[error("error unmarshalling request")]
    MalformedEnvelope,

    #[error("server public key was not expected length")]
    ServerPublicKeyLength,

    #[error("failure to resolve client keypair")]
    UnresolvedKeypair,

    #[error("nonce was not expected length")]
    NonceLength,

    #[error("app public key key was not expected length")]
    AppPublicKeyLength,

    /// The store returned a private key of the wrong size.
    #[error("server private key was not expected length")]
    ServerPrivateKeyLength,

    #[error("failure to decrypt payload")]
    DecryptionFailed,

    #[error("error unmarshalling request payload")]
    MalformedPayload,

    #[error("invalid timestamp")]
    InvalidTimestamp,

    #[error("no keys provided")]
    NoKeys,

    #[error("too many keys provided")]
    TooManyKeys,

    #[error("missing or invalid rollingPeriod")]
    InvalidRollingPeriod,

    #[error("invalid key data")]
    InvalidKeyData,

    #[error("invalid rolling start number")]
    InvalidRollingStartIntervalNumber,

    #[error("invalid transmission risk level")]
    InvalidTransmissionRiskLevel,

    /// Every key is well-formed but their start intervals span too many days.
    #[error("sequence of rollingStartIntervalNumbers exceeds 15 days")]
    RollingStartSpreadExceeded,

    #[error("key is used up")]
    KeyConsumed,

    #[error("not enough keys remaining")]
    QuotaExceeded,

    #[error("failed to store diagnosis keys")]
    StoreFailed,
}

impl UploadFailure {
    /// Look up the wire code, HTTP status and log severity for this failure.
    pub const fn outcome(self) -> Outcome {
        use ErrorCode as C;
        use Severity::{Error as E, Warn as W};
        use UploadFailure as F;

        let (code, status, severity) = match self {
            F::MalformedEnvelope => (C::Unknown, 400, W),
            F::ServerPublicKeyLength => (C::InvalidCryptoParameters, 400, W),
            F::UnresolvedKeypair => (C::InvalidKeypair, 401, W),
            F::NonceLength => (C::InvalidCryptoParameters, 400, W),
            F::AppPublicKeyLength => (C::InvalidCryptoParameters, 400, W),
            F::ServerPrivateKeyLength => (C::ServerError, 500, E),
            F::DecryptionFailed => (C::DecryptionFailed, 400, W),
            F::MalformedPayload => (C::InvalidPayload, 400, W),
            F::InvalidTimestamp => (C::InvalidTimestamp, 400, W),
            F::NoKeys => (C::NoKeysInPayload, 400, W),
            F::TooManyKeys => (C::TooManyKeys, 400, W),
            F::InvalidRollingPeriod => (C::InvalidRollingPeriod, 400, W),
            F::InvalidKeyData => (C::InvalidKeyData, 400, W),
            F::InvalidRollingStartIntervalNumber => (C::InvalidRollingStartIntervalNumber, 400, W),
            F::InvalidTransmissionRiskLevel => (C::InvalidTransmissionRiskLevel, 400, W),
            F::RollingStartSpreadExceeded => (C::InvalidRollingStartIntervalNumber, 400, W),
            F::KeyConsumed => (C::InvalidKeypair, 400, W),
            F::QuotaExceeded => (C::TooManyKeys, 400, W),
            F::StoreFailed => (C::ServerError, 500, E),
        };

        Outcome {
            code,
            status,
            severity,
        }
    }
}
