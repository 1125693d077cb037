//! Encoding and decoding of comment payloads
//!
//! [`Codec`] ties together key derivation, the two cipher families and the
//! marker armor. It holds only immutable configuration and the cached
//! capability probe result, so one instance can be shared freely across
//! threads.

use crate::config::{CodecConfig, check_salt_len};
use crate::error::{CommentSealError, ErrorCategory, ErrorKind, Result};
use crate::fallback;
use crate::probe::{self, CipherSupport};
use crate::secretcrypt;
use crate::varmor::{self, Family};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Where the key derivation salt of a new payload comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaltSource {
    /// A fresh random salt of the configured length.
    #[default]
    Random,
    /// A caller-supplied salt, used verbatim.
    Fixed(Vec<u8>),
    /// A per-deployment value followed by a fresh random part of the
    /// configured length.
    Deployment(Vec<u8>),
}

/// Result of marker inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadClass {
    Plaintext,
    Primary,
    Fallback,
}

/// Outcome of a decode attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The input carries no marker; it is an ordinary comment.
    NotEncoded,
    /// Authenticated plaintext from the primary cipher.
    Verified(String),
    /// Text recovered from a fallback payload. It was not integrity checked
    /// and may be garbage if the secret was wrong.
    Unverified(String),
}

impl Decoded {
    /// Recovered text, verified or not.
    pub fn text(&self) -> Option<&str> {
        match self {
            Decoded::NotEncoded => None,
            Decoded::Verified(text) | Decoded::Unverified(text) => Some(text),
        }
    }

    /// Recovered text only when it was authenticated.
    pub fn verified(&self) -> Option<&str> {
        match self {
            Decoded::Verified(text) => Some(text),
            _ => None,
        }
    }
}

/// Classify a stored text by its marker alone.
pub fn classify(text: &str) -> PayloadClass {
    match varmor::classify(text) {
        None => PayloadClass::Plaintext,
        Some(Family::Primary) => PayloadClass::Primary,
        Some(Family::Fallback) => PayloadClass::Fallback,
    }
}

/// True if the text starts with a recognized marker.
pub fn is_encoded(text: &str) -> bool {
    varmor::classify(text).is_some()
}

#[derive(Debug, Clone, Copy)]
pub struct Codec {
    config: CodecConfig,
    support: CipherSupport,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            config: CodecConfig::default(),
            support: probe::primary_support(),
        }
    }
}

impl Codec {
    /// Create a codec, probing the primary cipher (once per process).
    pub fn new(config: CodecConfig) -> Result<Self> {
        Self::with_support(config, probe::primary_support())
    }

    /// Create a codec with an explicit capability, bypassing the probe.
    pub fn with_support(config: CodecConfig, support: CipherSupport) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, support })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn support(&self) -> CipherSupport {
        self.support
    }

    /// Encode a comment.
    ///
    /// Uses the primary cipher when available and the fallback obfuscation
    /// otherwise. The chosen family is visible in the payload's marker.
    pub fn encode(&self, plaintext: &str, secret: &[u8], salt: &SaltSource) -> Result<String> {
        require_secret(secret)?;
        let salt = self.make_salt(salt)?;

        match self.support {
            CipherSupport::Available => {
                debug!(salt_len = salt.len(), "encoding with primary cipher");
                let body = secretcrypt::seal(
                    secret,
                    plaintext.as_bytes(),
                    &salt,
                    self.config.iterations,
                )?;
                Ok(varmor::wrap(Family::Primary, &body))
            }
            CipherSupport::Unavailable => {
                warn!("primary cipher unavailable; encoding with fallback obfuscation");
                let body = fallback::seal(
                    secret,
                    plaintext.as_bytes(),
                    &salt,
                    self.config.fallback_rounds,
                )?;
                Ok(varmor::wrap(Family::Fallback, &body))
            }
        }
    }

    /// Decode a stored text.
    ///
    /// Unmarked input yields `Decoded::NotEncoded` rather than an error.
    pub fn decode(&self, encoded: &str, secret: &[u8]) -> Result<Decoded> {
        let Some(family) = varmor::classify(encoded) else {
            return Ok(Decoded::NotEncoded);
        };
        require_secret(secret)?;

        match family {
            Family::Primary => {
                if self.support == CipherSupport::Unavailable {
                    return Err(CommentSealError::with_kind(
                        ErrorCategory::Internal,
                        ErrorKind::UnavailablePrimitive,
                        "payload requires AES-256-GCM, which is unavailable on this host",
                    ));
                }
                let (_, body) = varmor::unwrap(encoded)?;
                debug!(body_len = body.len(), "decoding primary payload");
                let plaintext = Zeroizing::new(secretcrypt::open(
                    secret,
                    &body,
                    self.config.iterations,
                )?);
                let text = std::str::from_utf8(&plaintext).map_err(|e| {
                    CommentSealError::with_kind_and_source(
                        ErrorCategory::User,
                        ErrorKind::MalformedPayload,
                        "decrypted comment is not valid UTF-8",
                        e,
                    )
                })?;
                Ok(Decoded::Verified(text.to_owned()))
            }
            Family::Fallback => {
                let (_, body) = varmor::unwrap(encoded)?;
                warn!("decoding fallback payload; result is not integrity checked");
                let data = Zeroizing::new(fallback::open(
                    secret,
                    &body,
                    self.config.fallback_rounds,
                )?);
                Ok(Decoded::Unverified(
                    String::from_utf8_lossy(&data).into_owned(),
                ))
            }
        }
    }

    fn make_salt(&self, source: &SaltSource) -> Result<Vec<u8>> {
        match source {
            SaltSource::Random => {
                let mut salt = vec![0u8; self.config.salt_len];
                secretcrypt::fill_random(&mut salt)?;
                Ok(salt)
            }
            SaltSource::Fixed(salt) => {
                check_salt_len(salt.len())?;
                Ok(salt.clone())
            }
            SaltSource::Deployment(prefix) => {
                let total = prefix.len() + self.config.salt_len;
                if total > u8::MAX as usize {
                    return Err(CommentSealError::invalid_config(format!(
                        "deployment salt of {} bytes plus {} random bytes exceeds {} bytes",
                        prefix.len(),
                        self.config.salt_len,
                        u8::MAX
                    )));
                }
                let mut salt = Vec::with_capacity(total);
                salt.extend_from_slice(prefix);
                salt.resize(total, 0);
                secretcrypt::fill_random(&mut salt[prefix.len()..])?;
                Ok(salt)
            }
        }
    }
}

fn require_secret(secret: &[u8]) -> Result<()> {
    if secret.is_empty() {
        return Err(CommentSealError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidSecret,
            "secret must not be empty",
        ));
    }
    Ok(())
}
