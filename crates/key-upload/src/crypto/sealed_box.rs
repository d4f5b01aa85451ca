//! Curve25519-XSalsa20-Poly1305 public-key authenticated encryption.
//!
//! Byte-compatible with NaCl / libsodium `crypto_box`: the shared key is
//! HSalsa20 over the X25519 agreement, the payload is XSalsa20 with a
//! Poly1305 tag prepended to the ciphertext.
//!
//! **Do NOT drop the tag check to "salvage" a payload.** Any change to the
//! nonce, ciphertext, or either public key must surface as
//! [`CipherError::AeadFailure`] with no plaintext.

use crypto_box::{
    aead::{generic_array::GenericArray, Aead, Nonce, OsRng},
    PublicKey, SalsaBox, SecretKey,
};
use thiserror::Error;

/// Byte length of a Curve25519 public or secret key.
pub const KEY_LEN: usize = 32;

/// Byte length of an XSalsa20 nonce.
pub const NONCE_LEN: usize = 24;

/// Errors produced by the sealed-box layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// A public or secret key is not [`KEY_LEN`] bytes.
    #[error("invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// The nonce is not [`NONCE_LEN`] bytes.
    #[error("invalid nonce length: expected {NONCE_LEN} bytes, got {0}")]
    InvalidNonceLength(usize),

    /// Authentication failed (wrong keys or tampered data).
    #[error("aead operation failed")]
    AeadFailure,
}

/// A freshly generated Curve25519 keypair as raw bytes.
#[derive(Clone)]
pub struct Keypair {
    pub public: [u8; KEY_LEN],
    pub secret: [u8; KEY_LEN],
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Generate a keypair from the OS CSPRNG.
pub fn generate_keypair() -> Keypair {
    let secret = SecretKey::generate(&mut OsRng);
    Keypair {
        public: *secret.public_key().as_bytes(),
        secret: secret.to_bytes(),
    }
}

/// Open a box sealed by `sender_public_key` for the holder of `recipient_secret_key`.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] or [`CipherError::InvalidNonceLength`]
/// on malformed parameters, and [`CipherError::AeadFailure`] if the Poly1305
/// tag does not verify.
pub fn open(
    ciphertext: &[u8],
    nonce: &[u8],
    sender_public_key: &[u8],
    recipient_secret_key: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let salsa_box = build_box(sender_public_key, recipient_secret_key)?;
    let nonce = nonce_from_slice(nonce)?;
    salsa_box
        .decrypt(nonce, ciphertext)
        .map_err(|_| CipherError::AeadFailure)
}

/// Seal `plaintext` from `sender_secret_key` to `recipient_public_key`.
///
/// The server never seals; this is the client half, used to build envelopes
/// in tests.
#[cfg(test)]
pub fn seal(
    plaintext: &[u8],
    nonce: &[u8],
    recipient_public_key: &[u8],
    sender_secret_key: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let salsa_box = build_box(recipient_public_key, sender_secret_key)?;
    let nonce = nonce_from_slice(nonce)?;
    salsa_box
        .encrypt(nonce, plaintext)
        .map_err(|_| CipherError::AeadFailure)
}

/// A random nonce from the OS CSPRNG.
#[cfg(test)]
pub fn random_nonce() -> [u8; NONCE_LEN] {
    use crypto_box::aead::rand_core::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn build_box(public_key: &[u8], secret_key: &[u8]) -> Result<SalsaBox, CipherError> {
    let public = key_from_slice(public_key)?;
    let secret = key_from_slice(secret_key)?;
    Ok(SalsaBox::new(&PublicKey::from(public), &SecretKey::from(secret)))
}

fn key_from_slice(bytes: &[u8]) -> Result<[u8; KEY_LEN], CipherError> {
    <[u8; KEY_LEN]>::try_from(bytes).map_err(|_| CipherError::InvalidKeyLength(bytes.len()))
}

fn nonce_from_slice(bytes: &[u8]) -> Result<&Nonce<SalsaBox>, CipherError> {
    if bytes.len() != NONCE_LEN {
        return Err(CipherError::InvalidNonceLength(bytes.len()));
    }
    Ok(GenericArray::from_slice(bytes))
}
