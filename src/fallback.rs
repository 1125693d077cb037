//! Keyed multi-round XOR obfuscation
//!
//! Used only when the primary cipher is unavailable on the host, and to read
//! payloads written that way. This is obfuscation, not encryption: there is
//! no integrity check, and a wrong secret yields garbage rather than an
//! error.
//!
//! The binary body format is:
//! - tag: the 9 ASCII bytes `FALLBACK:`
//! - salt length: 1 byte
//! - salt: variable (at least 8 bytes)
//! - transformed text: variable
//!
//! Each round XORs the data with a SHA-256 keystream over (secret, salt,
//! round) and then rotates it left by an amount drawn from the same stream.

use crate::error::{CommentSealError, Result};
use crate::secretcrypt::MIN_BODY_SALT_LEN;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Fixed tag at the start of every fallback body
pub const BODY_TAG: &[u8] = b"FALLBACK:";

const DOMAIN: &[u8] = b"commentseal-fallback";

/// Bytes of each round stream consumed for the rotation amount
const SHIFT_BYTES: usize = 4;

/// Expand (secret, salt, round) into `len` keystream bytes.
fn round_stream(secret: &[u8], salt: &[u8], round: u8, len: usize) -> Zeroizing<Vec<u8>> {
    let mut stream = Zeroizing::new(Vec::with_capacity(len + 32));
    let mut counter: u32 = 0;
    while stream.len() < len {
        let block = Sha256::new()
            .chain_update(DOMAIN)
            .chain_update(salt)
            .chain_update([round])
            .chain_update(counter.to_be_bytes())
            .chain_update(secret)
            .finalize();
        stream.extend_from_slice(&block);
        counter = counter.wrapping_add(1);
    }
    stream.truncate(len);
    stream
}

fn round_params(secret: &[u8], salt: &[u8], round: u8, len: usize) -> (usize, Zeroizing<Vec<u8>>) {
    let stream = round_stream(secret, salt, round, SHIFT_BYTES + len);
    let shift_bytes: [u8; SHIFT_BYTES] = [stream[0], stream[1], stream[2], stream[3]];
    let shift = if len == 0 {
        0
    } else {
        u32::from_be_bytes(shift_bytes) as usize % len
    };
    (shift, stream)
}

/// Apply the forward transform in place
pub fn obfuscate(secret: &[u8], salt: &[u8], rounds: u8, data: &mut [u8]) {
    let len = data.len();
    for round in 0..rounds {
        let (shift, stream) = round_params(secret, salt, round, len);
        for (byte, k) in data.iter_mut().zip(&stream[SHIFT_BYTES..]) {
            *byte ^= k;
        }
        data.rotate_left(shift);
    }
}

/// Apply the inverse transform in place
pub fn deobfuscate(secret: &[u8], salt: &[u8], rounds: u8, data: &mut [u8]) {
    let len = data.len();
    for round in (0..rounds).rev() {
        let (shift, stream) = round_params(secret, salt, round, len);
        data.rotate_right(shift);
        for (byte, k) in data.iter_mut().zip(&stream[SHIFT_BYTES..]) {
            *byte ^= k;
        }
    }
}

/// Build a fallback body from plaintext
pub fn seal(secret: &[u8], plaintext: &[u8], salt: &[u8], rounds: u8) -> Result<Vec<u8>> {
    if salt.len() < MIN_BODY_SALT_LEN || salt.len() > u8::MAX as usize {
        return Err(CommentSealError::invalid_config(format!(
            "salt length must be within {}..={} bytes, got {}",
            MIN_BODY_SALT_LEN,
            u8::MAX,
            salt.len()
        )));
    }

    let mut output = Vec::with_capacity(BODY_TAG.len() + 1 + salt.len() + plaintext.len());
    output.extend_from_slice(BODY_TAG);
    output.push(salt.len() as u8);
    output.extend_from_slice(salt);
    let start = output.len();
    output.extend_from_slice(plaintext);
    obfuscate(secret, salt, rounds, &mut output[start..]);
    Ok(output)
}

/// Recover bytes from a fallback body
///
/// Structural problems are reported as `MalformedPayload`. A wrong secret
/// is NOT detected.
pub fn open(secret: &[u8], body: &[u8], rounds: u8) -> Result<Vec<u8>> {
    let Some(rest) = body.strip_prefix(BODY_TAG) else {
        return Err(CommentSealError::malformed("fallback body tag missing"));
    };
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
    let (salt, transformed) = rest.split_at(salt_len);

    let mut data = transformed.to_vec();
    deobfuscate(secret, salt, rounds, &mut data);
    Ok(data)
}
