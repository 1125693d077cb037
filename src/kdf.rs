//! Key derivation from a secret using PBKDF2-HMAC-SHA256
//!
//! Also provides a non-blocking strength advisory for candidate
//! passphrases. The advisory never rejects or alters a secret.

use crate::config::check_iterations;
use crate::error::{CommentSealError, ErrorCategory, ErrorKind, Result};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// Minimum passphrase length below which the advisory warns
pub const ADVISORY_MIN_LEN: usize = 8;

/// A 32-byte symmetric key, wiped from memory on drop
pub struct DerivedKey(Zeroizing<[u8; KEY_LEN]>);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Derive a 32-byte key from a secret and salt
///
/// Deterministic: the same inputs always yield the same key. This is CPU
/// bound by design; event-driven hosts should call it off their UI or
/// request-handling threads.
pub fn derive_key(secret: &[u8], salt: &[u8], iterations: u32) -> Result<DerivedKey> {
    if secret.is_empty() {
        return Err(CommentSealError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidSecret,
            "secret must not be empty",
        ));
    }
    check_iterations(iterations)?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(secret, salt, iterations, key.as_mut_slice());
    Ok(DerivedKey(key))
}

/// A reason a passphrase may be easy to guess
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weakness {
    /// Fewer than [`ADVISORY_MIN_LEN`] characters.
    TooShort { len: usize },
    /// Uses fewer than three of: lowercase, uppercase, digits, other.
    FewCharacterClasses { classes: usize },
}

impl std::fmt::Display for Weakness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Weakness::TooShort { len } => write!(
                f,
                "passphrase is {} characters long; at least {} is recommended",
                len, ADVISORY_MIN_LEN
            ),
            Weakness::FewCharacterClasses { classes } => write!(
                f,
                "passphrase mixes {} character classes; mixing case, digits and symbols is recommended",
                classes
            ),
        }
    }
}

/// Classify a candidate passphrase. An empty result means no warnings.
pub fn assess_secret(secret: &[u8]) -> Vec<Weakness> {
    let text = String::from_utf8_lossy(secret);
    let len = text.chars().count();

    let mut lower = false;
    let mut upper = false;
    let mut digit = false;
    let mut other = false;
    for ch in text.chars() {
        if ch.is_lowercase() {
            lower = true;
        } else if ch.is_uppercase() {
            upper = true;
        } else if ch.is_ascii_digit() {
            digit = true;
        } else {
            other = true;
        }
    }
    let classes = [lower, upper, digit, other].iter().filter(|&&c| c).count();

    let mut weaknesses = Vec::new();
    if len < ADVISORY_MIN_LEN {
        weaknesses.push(Weakness::TooShort { len });
    }
    if classes < 3 {
        weaknesses.push(Weakness::FewCharacterClasses { classes });
    }
    weaknesses
}
