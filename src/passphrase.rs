//! Obtaining and persisting secrets
//!
//! [`PassphraseReader`] is how a caller obtains a secret for one operation
//! (terminal, stdin, a constant, a cache). [`SecretStore`] is the optional
//! persistence of a secret between sessions. The codec itself never reads
//! either; it only consumes the bytes handed to it.

use crate::error::{CommentSealError, ErrorCategory, ErrorKind, Result};
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

/// Source of the comment secret for a single encode or decode
pub trait PassphraseReader {
    /// Secret bytes, not necessarily UTF-8. The codec keys on raw bytes.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// A secret fixed at construction, e.g. one handed over by a widget host
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: Vec<u8>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(self.passphrase.clone())
    }
}

/// Takes the whole of a byte stream (stdin for `--passphrase-stdin`) as the secret
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            CommentSealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading comment secret: {}", e),
                e,
            )
        })?;
        Ok(data)
    }
}

/// Prompts on stderr and reads the secret from the terminal without echo
#[derive(Default)]
pub struct TerminalPassphraseReader;

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Terminal input is UTF-8 only; byte secrets go through
    /// `--passphrase-stdin` or a secret file.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(CommentSealError::with_kind(
                ErrorCategory::User,
                ErrorKind::SecretUnavailable,
                "cannot prompt for the comment secret: stdin is not a terminal",
            ));
        }

        let mut stderr = io::stderr();
        stderr
            .write_all(b"Passphrase (commentseal): ")
            .and_then(|()| stderr.flush())
            .map_err(|e| {
                CommentSealError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;

        // rpassword returns a String (UTF-8 only) that is not zeroized
        let passphrase = rpassword::read_password().map_err(|e| {
            CommentSealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::SecretUnavailable,
                format!("failure reading comment secret: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(passphrase.into_bytes()))
    }
}

/// Asks its upstream once per session
///
/// `update` needs the secret twice (verify the old payload, seal the new
/// one) and must not prompt twice. Failed reads are retried.
pub struct CachingPassphraseReader {
    upstream: Box<dyn PassphraseReader>,
    cached: Option<Zeroizing<Vec<u8>>>,
}

impl CachingPassphraseReader {
    pub fn new(upstream: Box<dyn PassphraseReader>) -> Self {
        Self {
            upstream,
            cached: None,
        }
    }
}

impl PassphraseReader for CachingPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }
        let passphrase = self.upstream.read_passphrase()?;
        self.cached = Some(passphrase.clone());
        Ok(passphrase)
    }
}

/// Persistence of a secret between sessions
///
/// Implementations decide the storage medium. Changing or clearing the
/// stored secret is the caller's signal to drop anything derived from the
/// previous one.
pub trait SecretStore {
    /// The stored secret, or `None` when nothing is stored.
    fn get(&self) -> Result<Option<Zeroizing<Vec<u8>>>>;

    fn set(&mut self, secret: &[u8]) -> Result<()>;

    /// Forget the stored secret. Clearing an empty store is not an error.
    fn clear(&mut self) -> Result<()>;
}

/// Keeps the secret in process memory only
#[derive(Default)]
pub struct MemorySecretStore {
    secret: Option<Zeroizing<Vec<u8>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        Ok(self.secret.clone())
    }

    fn set(&mut self, secret: &[u8]) -> Result<()> {
        self.secret = Some(Zeroizing::new(secret.to_vec()));
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.secret = None;
        Ok(())
    }
}

/// Keeps the secret in a file readable only by its owner
///
/// Writes are atomic (tempfile + fsync + rename), so readers see either the
/// old secret or the new one.
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        match fs::read(&self.path) {
            Ok(data) if data.is_empty() => Ok(None),
            Ok(data) => Ok(Some(Zeroizing::new(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CommentSealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to read secret from {}", self.path.display()),
                e,
            )),
        }
    }

    fn set(&mut self, secret: &[u8]) -> Result<()> {
        crate::file_ops::write_file_atomic(&self.path, secret)
            .map_err(|e| e.with_context(format!("failed to store secret in {}", self.path.display())))?;
        debug!(path = %self.path.display(), "stored secret");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "cleared stored secret");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CommentSealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to remove {}", self.path.display()),
                e,
            )),
        }
    }
}

/// Reads the passphrase from a [`SecretStore`]
pub struct StoredPassphraseReader<S> {
    store: S,
}

impl<S: SecretStore> StoredPassphraseReader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: SecretStore> PassphraseReader for StoredPassphraseReader<S> {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        self.store.get()?.ok_or_else(|| {
            CommentSealError::with_kind(
                ErrorCategory::User,
                ErrorKind::SecretUnavailable,
                "no secret has been stored",
            )
        })
    }
}
