//! Streaming content digests used to verify backup copies.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Read buffer size; memory stays bounded regardless of file size.
const CHUNK_SIZE: usize = 64 * 1024;

/// Content fingerprint of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// SHA-256 hex
    pub hash: String,
    /// Bytes fed into the hash
    pub size: u64,
}

/// Incremental hasher: feed chunks, then finalize.
#[derive(Default)]
pub struct Checksum {
    hasher: Sha256,
    size: u64,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
        self.size += bytes.len() as u64;
    }

    pub fn finalize(self) -> FileDigest {
        FileDigest {
            hash: hex::encode(self.hasher.finalize()),
            size: self.size,
        }
    }
}

/// Stream a file through the hasher in fixed-size chunks.
pub fn digest_file(path: &Path) -> io::Result<FileDigest> {
    let mut file = File::open(path)?;
    let mut checksum = Checksum::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        checksum.feed(&buf[..n]);
    }
    Ok(checksum.finalize())
}

/// Two files are identical iff their on-disk sizes and digests both match.
pub fn files_identical(a: &Path, b: &Path) -> io::Result<bool> {
    let size_a = std::fs::metadata(a)?.len();
    let size_b = std::fs::metadata(b)?.len();
    if size_a != size_b {
        return Ok(false);
    }
    let da = digest_file(a)?;
    let db = digest_file(b)?;
    Ok(da.size == db.size && da.hash == db.hash)
}
