//! SHA-256 content hashing
//!
//! Allele lengths are keyed by the hash of the sequence text and the training
//! file is bound to its schema by the hash of its bytes. Both use lowercase hex.

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Hash a byte slice, returning lowercase hex
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hash the UTF-8 bytes of a sequence string
pub fn sequence_hash(sequence: &str) -> String {
    sha256_hex(sequence.as_bytes())
}

/// Hash a file's content
///
/// Reads in 1MB chunks so large training files do not need to fit in memory.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {} for hashing: {}", path.display(), e),
        ))
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {} for hashing: {}", path.display(), e),
            ))
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    let hash_hex = format!("{:x}", hasher.finalize());
    tracing::debug!(path = %path.display(), hash = %hash_hex, "Calculated file hash");

    Ok(hash_hex)
}
