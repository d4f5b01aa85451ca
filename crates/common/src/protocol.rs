//! Request and response types exchanged with mobile clients.
//!
//! The upload path speaks protobuf (`application/x-protobuf`); the field tags
//! and enum values below are part of the public wire contract and must never
//! be renumbered. The auxiliary endpoints (`/events`, `/health`, errors) use
//! JSON.

use serde::{Deserialize, Serialize};

/// Maximum number of diagnosis keys accepted in a single upload.
pub const MAX_KEYS_IN_UPLOAD: usize = 28;

/// Content type of every protobuf request and response body.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

// ---------------------------------------------------------------------------
// Upload endpoint (protobuf)
// ---------------------------------------------------------------------------

/// Outer envelope posted to `POST /upload`.
///
/// `payload` is an [`Upload`] sealed with NaCl `box` from the app's ephemeral
/// secret key to `server_public_key`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EncryptedUploadRequest {
    /// Curve25519 public key of the server keypair the payload is sealed to.
    #[prost(bytes = "vec", tag = "1")]
    pub server_public_key: Vec<u8>,
    /// Curve25519 public key of the app's ephemeral keypair.
    #[prost(bytes = "vec", tag = "2")]
    pub app_public_key: Vec<u8>,
    /// 24-byte XSalsa20 nonce.
    #[prost(bytes = "vec", tag = "3")]
    pub nonce: Vec<u8>,
    /// Ciphertext of an encoded [`Upload`].
    #[prost(bytes = "vec", tag = "4")]
    pub payload: Vec<u8>,
}

/// Decrypted inner payload of an upload.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Upload {
    /// Client wall-clock time at which the upload was sealed.
    #[prost(message, optional, tag = "1")]
    pub timestamp: Option<::prost_types::Timestamp>,
    /// Diagnosis keys, in client order.
    #[prost(message, repeated, tag = "2")]
    pub keys: Vec<TemporaryExposureKey>,
}

/// One diagnosis key as reported by the device.
///
/// Fields are proto2 `optional`; the generated accessors return the declared
/// default when a field is absent.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TemporaryExposureKey {
    /// 16 bytes of key material.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub key_data: Option<Vec<u8>>,
    #[prost(int32, optional, tag = "2")]
    pub transmission_risk_level: Option<i32>,
    /// Count of 10-minute intervals since the Unix epoch.
    #[prost(int32, optional, tag = "3")]
    pub rolling_start_interval_number: Option<i32>,
    /// Count of 10-minute intervals the key covers.
    #[prost(int32, optional, tag = "4", default = "144")]
    pub rolling_period: Option<i32>,
}

/// Response body of `POST /upload`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EncryptedUploadResponse {
    #[prost(enumeration = "ErrorCode", optional, tag = "1")]
    pub error: Option<i32>,
}

impl EncryptedUploadResponse {
    /// Wrap a single error code. `ErrorCode::None` is the success response.
    pub fn with_code(code: ErrorCode) -> Self {
        Self {
            error: Some(code as i32),
        }
    }
}

/// Closed set of error codes returned to uploading clients.
///
/// Value 9 is retired and must not be reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorCode {
    None = 0,
    Unknown = 1,
    InvalidKeypair = 2,
    DecryptionFailed = 3,
    InvalidPayload = 4,
    ServerError = 5,
    InvalidCryptoParameters = 6,
    TooManyKeys = 7,
    InvalidTimestamp = 8,
    InvalidRollingPeriod = 10,
    InvalidKeyData = 11,
    InvalidRollingStartIntervalNumber = 12,
    InvalidTransmissionRiskLevel = 13,
    NoKeysInPayload = 14,
}

// ---------------------------------------------------------------------------
// Events endpoint (JSON)
// ---------------------------------------------------------------------------

/// Request body for `POST /events`.
///
/// `identifier` and `device_type` are free-form on the wire and validated by
/// the event logger so that rejected values still reach the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRequest {
    /// Event type, e.g. `"OTKClaimed"`.
    pub identifier: String,
    /// Device type, e.g. `"Android"` or `"iOS"`.
    pub device_type: String,
    /// Day bucket in `YYYY-MM-DD` form.
    pub date: String,
    /// Number of occurrences to add to the bucket.
    pub count: u32,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard JSON error body returned by the non-protobuf endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
