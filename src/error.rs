use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee the error is not, for example,
    /// caused by bad input - merely that it cannot be confidently determined
    /// by the code.
    Internal,

    /// The caller provided invalid input (a bad secret, a corrupt payload,
    /// an out-of-range setting) or asked for something impossible.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The secret was empty.
    InvalidSecret,
    /// The PBKDF2 iteration count is outside the accepted range.
    UnsupportedIterationCount,
    /// A configuration value (salt length, nonce length, fallback rounds)
    /// is outside its accepted range.
    InvalidConfig,
    /// The input carries no recognized marker and is ordinary text.
    NotEncoded,
    /// A marker was present but the body could not be parsed (bad base64,
    /// truncation, wrong lengths, unknown body version).
    MalformedPayload,
    /// The primary cipher rejected the payload: wrong secret, tampering or
    /// corruption. These causes are deliberately indistinguishable.
    AuthenticationFailed,
    /// The primary cipher is not usable on this host.
    UnavailablePrimitive,
    /// The payload decoded without an integrity check, so the secret could
    /// not be confirmed.
    UnverifiedPayload,
    /// The operating system random number generator failed.
    RandomnessUnavailable,
    /// No secret could be obtained from the configured reader or store.
    SecretUnavailable,
    /// Unexpected state reached within commentseal logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct CommentSealError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl CommentSealError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for a `User` error tagged `MalformedPayload`.
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::User, ErrorKind::MalformedPayload, msg)
    }

    /// Shorthand for a `User` error tagged `InvalidConfig`.
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::User, ErrorKind::InvalidConfig, msg)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// True when the error carries the given kind, including through
    /// layers added by `with_context`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CommentSealError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_context_preserves_kind_and_source() {
        let inner = CommentSealError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "authentication failed",
        );
        let outer = inner.with_context("failed to decode");

        assert_eq!(outer.kind, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(outer.category, ErrorCategory::User);
        assert_eq!(outer.message(), "failed to decode");
        assert!(outer.is(ErrorKind::AuthenticationFailed));

        let source = StdError::source(&outer).expect("expected wrapped source");
        assert_eq!(source.to_string(), "authentication failed");
    }

    #[test]
    fn test_source_is_retained() {
        let err = CommentSealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to read",
            io::Error::other("disk on fire"),
        );
        assert_eq!(err.to_string(), "failed to read");
        assert_eq!(
            StdError::source(&err).map(|s| s.to_string()),
            Some("disk on fire".to_string())
        );
    }

    #[test]
    fn test_new_has_no_kind() {
        let err = CommentSealError::new(ErrorCategory::Internal, "oops");
        assert_eq!(err.kind, None);
        assert!(!err.is(ErrorKind::Io));
    }
}
