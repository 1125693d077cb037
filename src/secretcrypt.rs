//! Encryption/decryption using PBKDF2 + AES-256-GCM
//!
//! This module implements the primary, authenticated cipher family:
//! - PBKDF2-HMAC-SHA256 for key derivation from the secret
//! - AES-256-GCM for authenticated encryption
//!
//! The binary body format is:
//! - version: 1 byte (currently 1)
//! - salt length: 1 byte
//! - salt: variable (at least 8 bytes)
//! - nonce: 12 bytes
//! - ciphertext: variable (includes 16-byte GCM tag)

use crate::config::NONCE_LEN;
use crate::error::{CommentSealError, ErrorCategory, ErrorKind, Result};
use crate::kdf::derive_key;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;

/// Body layout version written after the marker
pub const BODY_VERSION: u8 = 1;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Shortest salt accepted when parsing a body
pub const MIN_BODY_SALT_LEN: usize = 8;

/// Message for every authentication failure, whatever its cause
const AUTH_FAILED_MSG: &str = "corrupt comment, tampered-with data, or wrong secret";

/// Fill `buf` from the operating system RNG
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng.try_fill_bytes(buf).map_err(|e| {
        CommentSealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::RandomnessUnavailable,
            "operating system random number generator failed",
            e,
        )
    })
}

/// Seal plaintext under a key derived from `secret` and `salt`, using a
/// fresh random nonce
pub fn seal(secret: &[u8], plaintext: &[u8], salt: &[u8], iterations: u32) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce)?;

    seal_deterministic(secret, plaintext, salt, &nonce, iterations)
}

/// Seal plaintext using a provided nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `seal()` which generates a random nonce.
pub fn seal_deterministic(
    secret: &[u8],
    plaintext: &[u8],
    salt: &[u8],
    nonce: &[u8; NONCE_LEN],
    iterations: u32,
) -> Result<Vec<u8>> {
    if salt.len() < MIN_BODY_SALT_LEN || salt.len() > u8::MAX as usize {
        return Err(CommentSealError::invalid_config(format!(
            "salt length must be within {}..={} bytes, got {}",
            MIN_BODY_SALT_LEN,
            u8::MAX,
            salt.len()
        )));
    }

    let key = derive_key(secret, salt, iterations)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let sealed = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| {
            CommentSealError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "AES-GCM encryption failed",
            )
        })?;

    let mut output = Vec::with_capacity(2 + salt.len() + NONCE_LEN + sealed.len());
    output.push(BODY_VERSION);
    output.push(salt.len() as u8);
    output.extend_from_slice(salt);
    output.extend_from_slice(nonce);
    output.extend_from_slice(&sealed);

    Ok(output)
}

/// The fields of a primary body, borrowed from the raw bytes
struct SealedBody<'a> {
    salt: &'a [u8],
    nonce: &'a [u8],
    sealed: &'a [u8],
}

fn parse(body: &[u8]) -> Result<SealedBody<'_>> {
    let Some((&version, rest)) = body.split_first() else {
        return Err(CommentSealError::malformed(
            "input likely truncated while reading version",
        ));
    };
    if version != BODY_VERSION {
        return Err(CommentSealError::malformed(format!(
            "unsupported body version {}",
            version
        )));
    }

    let Some((&salt_len, rest)) = rest.split_first() else {
        return Err(CommentSealError::malformed(
            "input likely truncated while reading salt length",
        ));
    };
    let salt_len = salt_len as usize;
    if salt_len < MIN_BODY_SALT_LEN {
        return Err(CommentSealError::malformed(format!(
            "salt length {} is below the minimum of {}",
            salt_len, MIN_BODY_SALT_LEN
        )));
    }

    if rest.len() < salt_len {
        return Err(CommentSealError::malformed(
            "input likely truncated while reading salt",
        ));
    }
    let (salt, rest) = rest.split_at(salt_len);

    if rest.len() < NONCE_LEN {
        return Err(CommentSealError::malformed(
            "input likely truncated while reading nonce",
        ));
    }
    let (nonce, sealed) = rest.split_at(NONCE_LEN);

    if sealed.len() < TAG_LEN {
        return Err(CommentSealError::malformed(
            "input likely truncated while reading authentication tag",
        ));
    }

    Ok(SealedBody {
        salt,
        nonce,
        sealed,
    })
}

/// Open a primary body with a secret
pub fn open(secret: &[u8], body: &[u8], iterations: u32) -> Result<Vec<u8>> {
    let parsed = parse(body)?;

    let key = derive_key(secret, parsed.salt, iterations)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(parsed.nonce), parsed.sealed)
        .map_err(|_| {
            CommentSealError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                AUTH_FAILED_MSG,
            )
        })
}
