//! File encoding/decoding operations
//!
//! High-level operations used by the command line tool: encode a text file
//! into a payload, decode a payload file back to text, and replace the
//! content of an existing payload file without changing its secret.

use crate::codec::{Codec, Decoded, SaltSource};
use crate::error::{CommentSealError, ErrorCategory, ErrorKind, Result};
use crate::passphrase::PassphraseReader;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;

/// Encode a text file with a passphrase
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encode_file(
    codec: &Codec,
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let plaintext = read_text(input_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let encoded = codec
        .encode(&plaintext, &passphrase, &SaltSource::Random)
        .map_err(|e| e.with_context("encoding failed"))?;
    write_file_secure(output_path, encoded.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    Ok(())
}

/// Decode a payload file with a passphrase
///
/// Input that carries no marker is refused rather than copied through.
/// Fallback payloads are decoded with a warning, since a wrong passphrase
/// cannot be detected for them.
pub fn decode_file(
    codec: &Codec,
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let encoded = read_text(input_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let text = match codec
        .decode(encoded.trim_end(), &passphrase)
        .map_err(|e| e.with_context("failed to decode"))?
    {
        Decoded::NotEncoded => return Err(not_encoded(input_path)),
        Decoded::Verified(text) => text,
        Decoded::Unverified(text) => {
            warn!(
                path = %input_path.display(),
                "fallback payload has no integrity check; output may be garbage if the passphrase is wrong"
            );
            text
        }
    };
    write_file_secure(output_path, text.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    Ok(())
}

/// Update a payload file with new plaintext using the same passphrase
///
/// This function:
/// 1. Decodes the existing file at `crypt_path` to validate the passphrase
/// 2. Reads new plaintext from `plain_path`
/// 3. Encodes the new plaintext with the validated passphrase
/// 4. Atomically writes to `crypt_path` (tempfile + fsync + rename)
///
/// Only primary payloads can validate a passphrase, so fallback payloads
/// are refused.
pub fn update_file(
    codec: &Codec,
    plain_path: &Path,
    crypt_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let existing = read_text(crypt_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;

    match codec
        .decode(existing.trim_end(), &passphrase)
        .map_err(|e| e.with_context("failed to decode"))?
    {
        Decoded::Verified(_) => {}
        Decoded::NotEncoded => return Err(not_encoded(crypt_path)),
        Decoded::Unverified(_) => {
            return Err(CommentSealError::with_kind(
                ErrorCategory::User,
                ErrorKind::UnverifiedPayload,
                "existing file is a fallback payload; the passphrase cannot be validated",
            ));
        }
    }

    let new_plaintext = read_text(plain_path)?;
    let encoded = codec
        .encode(&new_plaintext, &passphrase, &SaltSource::Random)
        .map_err(|e| e.with_context("failed to encode"))?;
    write_file_atomic(crypt_path, encoded.as_bytes())
}

/// Replace `path` atomically with `contents`
///
/// Either the old file or the new file exists afterwards, never a partial
/// one. The new file has mode 0o600 on Unix systems.
pub(crate) fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        CommentSealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        CommentSealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        CommentSealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        CommentSealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                CommentSealError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }

    temp_file.persist(path).map_err(|e| {
        CommentSealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    let file = {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
    };
    #[cfg(not(unix))]
    let file = fs::File::create(path);

    let mut file = file.map_err(|e| {
        CommentSealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to open {}", path.display()),
            e,
        )
    })?;
    file.write_all(contents).map_err(|e| {
        CommentSealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to write {}", path.display()),
            e,
        )
    })
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    String::from_utf8(bytes).map_err(|e| {
        CommentSealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} is not valid UTF-8", path.display()),
            e,
        )
    })
}

fn not_encoded(path: &Path) -> CommentSealError {
    CommentSealError::with_kind(
        ErrorCategory::User,
        ErrorKind::NotEncoded,
        format!("{} is not commentseal data", path.display()),
    )
}

fn read_error(path: &Path, err: io::Error) -> CommentSealError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    CommentSealError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
