//! Multi-record sequence file reader
//!
//! Parses FASTA into ordered `(identifier, sequence)` records. The identifier
//! is the first whitespace-delimited token of the header; sequence lines are
//! concatenated and upper-cased. Parsing is delegated to `bio::io::fasta`.

use bio::io::fasta;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sequence file parse errors
#[derive(Debug, Error)]
pub enum FastaError {
    /// Cannot open or read the file
    #[error("File access error {0}: {1}")]
    FileAccess(PathBuf, String),

    /// Malformed record (e.g. sequence data before the first header)
    #[error("Malformed record {0}: {1}")]
    Malformed(usize, String),

    /// Header line without an identifier
    #[error("Empty identifier in record {0}")]
    EmptyIdentifier(usize),
}

/// One record of a sequence file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub id: String,
    pub sequence: String,
}

impl From<fasta::Record> for SequenceRecord {
    fn from(record: fasta::Record) -> Self {
        Self {
            id: record.id().to_string(),
            sequence: String::from_utf8_lossy(record.seq()).to_ascii_uppercase(),
        }
    }
}

/// Read every record of a FASTA file
pub fn read_fasta(path: &Path) -> Result<Vec<SequenceRecord>, FastaError> {
    let file = File::open(path)
        .map_err(|e| FastaError::FileAccess(path.to_path_buf(), e.to_string()))?;
    parse_fasta(file)
}

/// Parse FASTA records from any reader
///
/// Record numbers in errors are 1-based.
pub fn parse_fasta<R: Read>(reader: R) -> Result<Vec<SequenceRecord>, FastaError> {
    let mut records = Vec::new();

    for (idx, result) in fasta::Reader::new(reader).records().enumerate() {
        let record_no = idx + 1;
        let record = result.map_err(|e| FastaError::Malformed(record_no, e.to_string()))?;

        if record.id().is_empty() {
            return Err(FastaError::EmptyIdentifier(record_no));
        }
        records.push(SequenceRecord::from(record));
    }

    Ok(records)
}
