//! Commentseal - passphrase-based encryption of comments that live in
//! ordinary text fields
//!
//! A comment is encoded into a marker-prefixed, base64url string that any
//! text column can hold. Readers holding the secret decode it; everyone
//! else sees an opaque token, and unmarked text is passed through as an
//! ordinary comment.

#![forbid(unsafe_code)]

pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod fallback;
pub mod file_ops;
pub mod kdf;
pub mod passphrase;
pub mod probe;
pub mod secretcrypt;
pub mod varmor;
pub mod widget;

pub use codec::{Codec, Decoded, PayloadClass, SaltSource, classify, is_encoded};
pub use config::CodecConfig;
pub use error::{CommentSealError, ErrorCategory, ErrorKind, Result};
