//! NaCl `box` (Curve25519 + XSalsa20-Poly1305) for upload payloads.
//!
//! This module is free of HTTP and storage dependencies. Opening either returns
//! the complete plaintext or fails; a forged or tampered envelope never yields
//! partial output.

pub mod sealed_box;

pub use sealed_box::{open, KEY_LEN, NONCE_LEN};
