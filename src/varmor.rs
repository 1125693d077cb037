//! Versioned armoring for payload bodies
//!
//! Provides base64url encoding behind a marker prefix so that an encoded
//! comment can share an untyped text field with ordinary comments. The
//! armored format is:
//! - Free of whitespace (including newlines)
//! - Safe to embed in URLs
//! - Safe to pass unescaped in a POSIX shell
//!
//! Each cipher family has its own marker. Neither marker is a prefix of the
//! other, so classification is a single prefix check.

use crate::error::{CommentSealError, ErrorCategory, ErrorKind, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Marker for payloads sealed with the primary (authenticated) cipher
pub const PRIMARY_MARKER: &str = "cseal1:";

/// Marker for payloads produced by the fallback obfuscation
pub const FALLBACK_MARKER: &str = "cseal1x:";

/// Which cipher family produced a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Primary,
    Fallback,
}

impl Family {
    pub fn marker(self) -> &'static str {
        match self {
            Family::Primary => PRIMARY_MARKER,
            Family::Fallback => FALLBACK_MARKER,
        }
    }
}

/// Inspect the marker only; no decoding work is done.
pub fn classify(text: &str) -> Option<Family> {
    if text.starts_with(PRIMARY_MARKER) {
        Some(Family::Primary)
    } else if text.starts_with(FALLBACK_MARKER) {
        Some(Family::Fallback)
    } else {
        None
    }
}

/// Wrap bytes in armor, returning the armored string
///
/// Format: {marker}{base64url-no-padding}
pub fn wrap(family: Family, body: &[u8]) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(body);
    format!("{}{}", family.marker(), encoded)
}

/// Unwrap an armored string, returning its family and the original bytes
pub fn unwrap(armored: &str) -> Result<(Family, Vec<u8>)> {
    let Some(family) = classify(armored) else {
        return Err(CommentSealError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotEncoded,
            "input unrecognized as commentseal data",
        ));
    };

    let encoded = &armored[family.marker().len()..];
    let body = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
        CommentSealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::MalformedPayload,
            format!("base64 decoding failed: {}", e),
            e,
        )
    })?;
    Ok((family, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bytes() {
        let armored = wrap(Family::Primary, b"");
        assert_eq!(armored, PRIMARY_MARKER);
        let (family, unwrapped) = unwrap(&armored).unwrap();
        assert_eq!(family, Family::Primary);
        assert!(unwrapped.is_empty());
    }

    #[test]
    fn test_families_roundtrip() {
        for family in [Family::Primary, Family::Fallback] {
            let armored = wrap(family, b"test");
            assert!(armored.starts_with(family.marker()));
            let (unwrapped_family, unwrapped) = unwrap(&armored).unwrap();
            assert_eq!(unwrapped_family, family);
            assert_eq!(unwrapped, b"test");
        }
    }

    #[test]
    fn test_markers_do_not_collide() {
        assert!(!PRIMARY_MARKER.starts_with(FALLBACK_MARKER));
        assert!(!FALLBACK_MARKER.starts_with(PRIMARY_MARKER));
        assert_eq!(classify(&wrap(Family::Fallback, b"x")), Some(Family::Fallback));
        assert_eq!(classify(&wrap(Family::Primary, b"x")), Some(Family::Primary));
    }

    #[test]
    fn test_all_byte_values() {
        let bytes: Vec<u8> = (0..=255).collect();
        let armored = wrap(Family::Primary, &bytes);

        assert_eq!(
            armored,
            "cseal1:AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8gISIjJCUmJygpKissLS4vMDEyMzQ1Njc4OTo7PD0-P0BBQkNERUZHSElKS0xNTk9QUVJTVFVWV1hZWltcXV5fYGFiY2RlZmdoaWprbG1ub3BxcnN0dXZ3eHl6e3x9fn-AgYKDhIWGh4iJiouMjY6PkJGSk5SVlpeYmZqbnJ2en6ChoqOkpaanqKmqq6ytrq-wsbKztLW2t7i5uru8vb6_wMHCw8TFxsfIycrLzM3Oz9DR0tPU1dbX2Nna29zd3t_g4eLj5OXm5-jp6uvs7e7v8PHy8_T19vf4-fr7_P3-_w"
        );

        let (_, unwrapped) = unwrap(&armored).unwrap();
        assert_eq!(bytes, unwrapped);
    }

    #[test]
    fn test_plain_text_is_not_encoded() {
        for text in ["", "hello world", "cseal", "cseal1", "cseal2:AAAA", " cseal1:AAAA"] {
            assert_eq!(classify(text), None, "{:?}", text);
            let err = unwrap(text).expect_err("expected not-encoded classification");
            assert_eq!(err.kind, Some(ErrorKind::NotEncoded));
        }
    }

    #[test]
    fn test_bad_base64() {
        let err = unwrap("cseal1:bad$$").expect_err("expected base64 decode error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedPayload));
    }

    #[test]
    fn test_no_whitespace() {
        let armored = wrap(Family::Fallback, b"test data with spaces\n\t");

        assert!(!armored.contains(' '));
        assert!(!armored.contains('\n'));
        assert!(!armored.contains('\t'));
    }

    #[test]
    fn test_url_safe() {
        let bytes = vec![0xFFu8; 100]; // Bytes that might encode to + or / in standard base64
        let armored = wrap(Family::Primary, &bytes);

        assert!(!armored.contains('+'));
        assert!(!armored.contains('/'));
        assert!(!armored.contains('='));
    }
}
