//! Wire protocol and failure taxonomy shared across `key-upload` crates.

pub mod error;
pub mod protocol;

pub use error::{Outcome, Severity, UploadFailure};
