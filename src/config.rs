//! Codec configuration
//!
//! Every value has a documented default and an accepted range. Out-of-range
//! values are rejected by [`CodecConfig::validate`]; nothing is clamped.

use crate::error::{CommentSealError, ErrorCategory, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

/// Default PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 150_000;

/// Accepted PBKDF2 iteration counts
pub const ITERATIONS_RANGE: RangeInclusive<u32> = 10_000..=10_000_000;

/// Default length of a freshly generated salt in bytes
pub const DEFAULT_SALT_LEN: usize = 16;

/// Accepted salt lengths in bytes
pub const SALT_LEN_RANGE: RangeInclusive<usize> = 8..=64;

/// Nonce length of the primary cipher (AES-256-GCM)
pub const NONCE_LEN: usize = 12;

/// Default number of fallback transform rounds
pub const DEFAULT_FALLBACK_ROUNDS: u8 = 8;

/// Accepted fallback round counts
pub const FALLBACK_ROUNDS_RANGE: RangeInclusive<u8> = 1..=64;

/// Tunables shared by encoder and decoder
///
/// The iteration count and fallback round count are not embedded in
/// payloads, so every party reading a given comment store must agree on
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    pub iterations: u32,
    pub salt_len: usize,
    pub nonce_len: usize,
    pub fallback_rounds: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            salt_len: DEFAULT_SALT_LEN,
            nonce_len: NONCE_LEN,
            fallback_rounds: DEFAULT_FALLBACK_ROUNDS,
        }
    }
}

impl CodecConfig {
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_salt_len(mut self, salt_len: usize) -> Self {
        self.salt_len = salt_len;
        self
    }

    pub fn with_fallback_rounds(mut self, rounds: u8) -> Self {
        self.fallback_rounds = rounds;
        self
    }

    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<()> {
        check_iterations(self.iterations)?;
        check_salt_len(self.salt_len)?;
        if self.nonce_len != NONCE_LEN {
            return Err(CommentSealError::invalid_config(format!(
                "nonce length must be {} bytes, got {}",
                NONCE_LEN, self.nonce_len
            )));
        }
        if !FALLBACK_ROUNDS_RANGE.contains(&self.fallback_rounds) {
            return Err(CommentSealError::invalid_config(format!(
                "fallback rounds must be within {}..={}, got {}",
                FALLBACK_ROUNDS_RANGE.start(),
                FALLBACK_ROUNDS_RANGE.end(),
                self.fallback_rounds
            )));
        }
        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// Missing fields take their defaults; unknown fields are rejected.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            CommentSealError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to read config from {}", path.display()),
                e,
            )
        })?;
        Self::from_json_str(&raw)
            .map_err(|e| e.with_context(format!("invalid config in {}", path.display())))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|e| {
            CommentSealError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::InvalidConfig,
                format!("failed to parse config: {}", e),
                e,
            )
        })?;
        config.validate()?;
        Ok(config)
    }
}

pub(crate) fn check_iterations(iterations: u32) -> Result<()> {
    if ITERATIONS_RANGE.contains(&iterations) {
        Ok(())
    } else {
        Err(CommentSealError::with_kind(
            ErrorCategory::User,
            ErrorKind::UnsupportedIterationCount,
            format!(
                "iteration count must be within {}..={}, got {}",
                ITERATIONS_RANGE.start(),
                ITERATIONS_RANGE.end(),
                iterations
            ),
        ))
    }
}

pub(crate) fn check_salt_len(salt_len: usize) -> Result<()> {
    if SALT_LEN_RANGE.contains(&salt_len) {
        Ok(())
    } else {
        Err(CommentSealError::invalid_config(format!(
            "salt length must be within {}..={} bytes, got {}",
            SALT_LEN_RANGE.start(),
            SALT_LEN_RANGE.end(),
            salt_len
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = CodecConfig::default();
        config.validate().unwrap();
        assert!(config.iterations >= 100_000);
        assert_eq!(config.nonce_len, 12);
    }

    #[test]
    fn test_iterations_out_of_range() {
        for iterations in [0, 9_999, 10_000_001] {
            let err = CodecConfig::default()
                .with_iterations(iterations)
                .validate()
                .expect_err("expected iteration count rejection");
            assert_eq!(err.kind, Some(ErrorKind::UnsupportedIterationCount));
        }
    }

    #[test]
    fn test_salt_len_out_of_range() {
        for salt_len in [0, 7, 65] {
            let err = CodecConfig::default()
                .with_salt_len(salt_len)
                .validate()
                .expect_err("expected salt length rejection");
            assert_eq!(err.kind, Some(ErrorKind::InvalidConfig));
        }
    }

    #[test]
    fn test_nonce_len_is_fixed() {
        let config = CodecConfig {
            nonce_len: 24,
            ..CodecConfig::default()
        };
        let err = config.validate().expect_err("expected nonce rejection");
        assert_eq!(err.kind, Some(ErrorKind::InvalidConfig));
    }

    #[test]
    fn test_zero_fallback_rounds() {
        let err = CodecConfig::default()
            .with_fallback_rounds(0)
            .validate()
            .expect_err("expected rounds rejection");
        assert_eq!(err.kind, Some(ErrorKind::InvalidConfig));
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let config = CodecConfig::from_json_str(r#"{"iterations": 20000}"#).unwrap();
        assert_eq!(config.iterations, 20_000);
        assert_eq!(config.salt_len, DEFAULT_SALT_LEN);
        assert_eq!(config.fallback_rounds, DEFAULT_FALLBACK_ROUNDS);
    }

    #[test]
    fn test_json_rejects_unknown_fields() {
        let err = CodecConfig::from_json_str(r#"{"iterashuns": 20000}"#)
            .expect_err("expected unknown field rejection");
        assert_eq!(err.kind, Some(ErrorKind::InvalidConfig));
    }

    #[test]
    fn test_json_validates() {
        let err = CodecConfig::from_json_str(r#"{"iterations": 5}"#)
            .expect_err("expected validation failure");
        assert_eq!(err.kind, Some(ErrorKind::UnsupportedIterationCount));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"salt_len": 32, "fallback_rounds": 3}"#).unwrap();

        let config = CodecConfig::from_json_file(&path).unwrap();
        assert_eq!(config.salt_len, 32);
        assert_eq!(config.fallback_rounds, 3);
    }
}
