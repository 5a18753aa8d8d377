//! Error types for nsup-load
//!
//! Fatal gates (configuration, integrity, authorization) surface as
//! `LoadError` and halt the run. Per-locus registry failures are recorded in
//! the upload statistics instead and never reach this type.

use crate::services::fasta_reader::FastaError;
use crate::services::ns_client::RegistryError;
use thiserror::Error;

/// Load workflow error
#[derive(Debug, Error)]
pub enum LoadError {
    /// One or more schema parameters failed validation; every message is kept
    #[error("Found invalid parameter values:\n{}", .0.join("\n"))]
    Configuration(Vec<String>),

    /// Registry content did not originate from this local schema
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Current identity may not create or resume the schema
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Registry already holds the resource (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Species, schema or file not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local and remote schemas are identical
    #[error("{0}")]
    NothingToDo(String),

    /// Registry request failed outside the per-locus upload loop
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Local locus file could not be read
    #[error("Sequence file error: {0}")]
    Fasta(#[from] FastaError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// nsup-common error
    #[error("Common error: {0}")]
    Common(#[from] nsup_common::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoadError {
    /// Informational halts end the run without signalling failure
    pub fn is_informational(&self) -> bool {
        matches!(self, LoadError::NothingToDo(_))
    }
}

/// Result type for the load workflow
pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_lists_every_message() {
        let err = LoadError::Configuration(vec![
            "Invalid BSR value".to_string(),
            "Invalid genetic code.".to_string(),
        ]);
        let text = err.to_string();
        assert!(text.contains("Invalid BSR value"));
        assert!(text.contains("Invalid genetic code."));
    }

    #[test]
    fn test_only_nothing_to_do_is_informational() {
        assert!(LoadError::NothingToDo("identical".into()).is_informational());
        assert!(!LoadError::Integrity("diverged".into()).is_informational());
        assert!(!LoadError::Conflict("exists".into()).is_informational());
    }
}
