//! Tee writer feeding a SHA-256 digest
//!
//! Every byte accepted by the inner sink is also fed to the hasher, so the
//! digest always covers exactly what landed on disk.

use sha2::{Digest, Sha256};
use std::io::{self, Write};

/// Writer that hashes bytes as they pass through to an inner sink
pub struct DigestWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Finalize the digest as lowercase hex
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        // Hash only what the sink accepted; a short write must not skew the digest
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
