//! Local and remote locus models

use crate::services::fasta_reader::{read_fasta, FastaError, SequenceRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Annotation name/label used when no answer was accepted
pub const NOT_FOUND: &str = "not found";

/// Placeholder annotation URI (the registry requires URL syntax)
pub const NOT_FOUND_URI: &str = "http://not.found.org";

/// One local schema file
#[derive(Debug, Clone)]
pub struct LocalLocus {
    pub path: PathBuf,
    /// File stem
    pub name: String,
    /// File name, the join key against the registry's `original_name`
    pub file_name: String,
    pub records: Vec<SequenceRecord>,
}

impl LocalLocus {
    pub fn load(path: &Path) -> Result<Self, FastaError> {
        let records = read_fasta(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            name: crate::services::schema_scanner::locus_name(path),
            file_name,
            records,
        })
    }

    /// Distinct allele sequences
    pub fn allele_set(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.sequence.as_str()).collect()
    }
}

/// A locus already registered for the target schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocus {
    pub uri: String,
    pub original_name: String,
    pub name: String,
    pub alleles: HashSet<String>,
}

impl RemoteLocus {
    /// Numeric registry id, taken from the last URI segment
    pub fn id(&self) -> Option<u64> {
        locus_id_from_uri(&self.uri)
    }
}

/// Registry id from a locus URI (`.../loci/42` -> 42)
pub fn locus_id_from_uri(uri: &str) -> Option<u64> {
    uri.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// An allele rejected by quality control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidAllele {
    pub id: String,
    pub reason: String,
}

/// Quality-control classification for one locus
#[derive(Debug, Clone, PartialEq)]
pub struct LocusQc {
    /// Locus file name
    pub locus: String,
    pub valid: Vec<SequenceRecord>,
    pub invalid: Vec<InvalidAllele>,
    /// Protein translation of each valid allele, same order as `valid`
    pub proteins: Vec<String>,
    /// Persisted copy of the translations; annotation queries read from it
    pub proteins_file: Option<PathBuf>,
}

impl LocusQc {
    pub fn valid_sequences(&self) -> HashSet<&str> {
        self.valid.iter().map(|r| r.sequence.as_str()).collect()
    }
}

/// Best-effort descriptive annotation for a locus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Found { name: String, label: String, uri: String },
    NotFound,
}

impl Annotation {
    pub fn name(&self) -> &str {
        match self {
            Annotation::Found { name, .. } if !name.is_empty() => name,
            _ => NOT_FOUND,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Annotation::Found { label, .. } if !label.is_empty() => label,
            _ => NOT_FOUND,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Annotation::Found { uri, .. } if !uri.is_empty() => uri,
            _ => NOT_FOUND_URI,
        }
    }
}

/// Annotation result carrying its locus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocusAnnotation {
    /// Locus file name
    pub locus: String,
    pub annotation: Annotation,
}

/// What the upload must do for one locus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    /// Not in the registry yet: create, link, then send every valid allele
    FreshLocus,
    /// Already linked to the schema: send only the alleles it lacks
    ResumedLocus {
        existing_uri: String,
        missing_alleles: BTreeSet<String>,
    },
}
