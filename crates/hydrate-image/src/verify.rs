//! Streaming SHA-256 computation and verification.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use sha2::{Digest as _, Sha256};

use crate::digest::Digest;
use crate::error::{ImageError, Result};

/// Write-through SHA-256 hasher.
///
/// Bytes written are forwarded to the inner writer while the running hash is
/// updated; [`DigestWriter::finalize`] returns the inner writer and the hex
/// digest of everything written.
pub struct DigestWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> DigestWriter<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Consumes the wrapper, returning the inner writer and the hex digest.
    #[must_use]
    pub fn finalize(self) -> (W, String) {
        (self.inner, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Hex-encoded SHA-256 of a byte slice.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex-encoded SHA-256 of a reader's contents.
///
/// # Errors
///
/// Returns an error if reading fails.
pub fn sha256_reader<R: Read>(mut reader: R) -> Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hex-encoded SHA-256 of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String> {
    sha256_reader(File::open(path)?)
}

/// Verifies that a blob file hashes to the digest naming it.
///
/// # Errors
///
/// Returns [`ImageError::ShaMismatch`] when the content does not match, or
/// an I/O error if the file cannot be read.
pub fn verify_file(path: &Path, expected: &Digest) -> Result<()> {
    let found = sha256_file(path)?;
    if found != expected.encoded() {
        return Err(ImageError::ShaMismatch {
            expected: expected.encoded().to_string(),
            found,
        });
    }
    Ok(())
}
