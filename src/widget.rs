//! Adapter between a comment widget and the codec
//!
//! The hosting widget owns rendering and persistence. It hands plaintext to
//! [`CommentBoard::submit`] and the stored records to
//! [`CommentBoard::render`]; the board only encodes, classifies and decodes.

use crate::codec::{Codec, Decoded, PayloadClass, SaltSource, classify};
use crate::error::{ErrorKind, Result};
use tracing::debug;

/// A comment as the backend stores it: an opaque text body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredComment {
    pub id: u64,
    pub body: String,
}

/// The persistence side of a comment widget
pub trait CommentStore {
    /// Persist a comment body and return the stored record.
    fn submit(&mut self, body: String) -> Result<StoredComment>;
}

/// In-memory comment store
#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    comments: Vec<StoredComment>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comments(&self) -> &[StoredComment] {
        &self.comments
    }
}

impl CommentStore for MemoryCommentStore {
    fn submit(&mut self, body: String) -> Result<StoredComment> {
        let record = StoredComment {
            id: self.comments.len() as u64 + 1,
            body,
        };
        self.comments.push(record.clone());
        Ok(record)
    }
}

/// What a widget should show for one stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedComment {
    /// An ordinary, unencrypted comment.
    Plain(String),
    /// Authenticated plaintext of an encrypted comment.
    Decrypted(String),
    /// Text of a fallback payload; not integrity checked.
    Unverified(String),
    /// Encrypted, and no usable secret was available (none given, wrong
    /// secret, or primary cipher missing on this host).
    Locked,
    /// Carries a marker but cannot be parsed.
    Malformed,
}

pub struct CommentBoard<S> {
    codec: Codec,
    store: S,
}

impl<S: CommentStore> CommentBoard<S> {
    pub fn new(codec: Codec, store: S) -> Self {
        Self { codec, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Submit a comment, encrypting it when a secret is given.
    pub fn submit(&mut self, plaintext: &str, secret: Option<&[u8]>) -> Result<StoredComment> {
        let body = match secret {
            Some(secret) => self.codec.encode(plaintext, secret, &SaltSource::Random)?,
            None => plaintext.to_owned(),
        };
        self.store.submit(body)
    }

    /// Map each stored record to what should be displayed.
    ///
    /// Records are handled independently; one bad record never prevents
    /// the others from rendering.
    pub fn render(&self, records: &[StoredComment], secret: Option<&[u8]>) -> Vec<RenderedComment> {
        records
            .iter()
            .map(|record| self.render_one(record, secret))
            .collect()
    }

    fn render_one(&self, record: &StoredComment, secret: Option<&[u8]>) -> RenderedComment {
        if classify(&record.body) == PayloadClass::Plaintext {
            return RenderedComment::Plain(record.body.clone());
        }
        let Some(secret) = secret else {
            return RenderedComment::Locked;
        };
        match self.codec.decode(&record.body, secret) {
            Ok(Decoded::NotEncoded) => RenderedComment::Plain(record.body.clone()),
            Ok(Decoded::Verified(text)) => RenderedComment::Decrypted(text),
            Ok(Decoded::Unverified(text)) => RenderedComment::Unverified(text),
            Err(e) if e.is(ErrorKind::MalformedPayload) => {
                debug!(id = record.id, "malformed payload: {}", e);
                RenderedComment::Malformed
            }
            Err(e) => {
                debug!(id = record.id, "comment stays locked: {}", e);
                RenderedComment::Locked
            }
        }
    }
}
