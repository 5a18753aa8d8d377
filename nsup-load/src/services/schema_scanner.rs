//! Local schema directory scanner
//!
//! A schema directory holds one `.fasta` file per locus, the gene-prediction
//! training file (`.trn`) and the `.schema_config` snapshot. Subdirectories
//! (`short/`, intermediate work dirs) are not part of the locus inventory.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Snapshot file name inside a schema directory
pub const SCHEMA_CONFIG_FILE: &str = ".schema_config";

/// Schema directory scan errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Directory contains no locus files
    #[error("No locus files found in {0}")]
    NoLoci(PathBuf),
}

/// Files discovered in a schema directory
#[derive(Debug, Clone, Default)]
pub struct SchemaDirectory {
    /// Locus files, sorted by file name
    pub loci: Vec<PathBuf>,
    /// Training files (exactly one expected)
    pub training_files: Vec<PathBuf>,
    /// Configuration snapshot, if present
    pub config_snapshot: Option<PathBuf>,
}

/// Scan a schema directory (top level only)
pub fn scan_schema_dir(root_path: &Path) -> Result<SchemaDirectory, ScanError> {
    if !root_path.exists() {
        return Err(ScanError::PathNotFound(root_path.to_path_buf()));
    }

    if !root_path.is_dir() {
        return Err(ScanError::NotADirectory(root_path.to_path_buf()));
    }

    let mut found = SchemaDirectory::default();

    let walker = WalkDir::new(root_path)
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Error accessing entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match classify(&entry) {
            Some(EntryKind::Locus) => found.loci.push(entry.into_path()),
            Some(EntryKind::Training) => found.training_files.push(entry.into_path()),
            Some(EntryKind::Snapshot) => found.config_snapshot = Some(entry.into_path()),
            None => {}
        }
    }

    tracing::debug!(
        loci = found.loci.len(),
        training_files = found.training_files.len(),
        "Scanned schema directory {}",
        root_path.display()
    );

    if found.loci.is_empty() {
        return Err(ScanError::NoLoci(root_path.to_path_buf()));
    }

    Ok(found)
}

enum EntryKind {
    Locus,
    Training,
    Snapshot,
}

fn classify(entry: &DirEntry) -> Option<EntryKind> {
    let name = entry.file_name().to_str()?;

    if name == SCHEMA_CONFIG_FILE {
        return Some(EntryKind::Snapshot);
    }

    match entry.path().extension().and_then(|ext| ext.to_str()) {
        Some("fasta") => Some(EntryKind::Locus),
        Some("trn") => Some(EntryKind::Training),
        _ => None,
    }
}

/// Locus name for a locus file (file stem)
pub fn locus_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_finds_loci_in_name_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("locusB.fasta"), ">1\nATG\n").unwrap();
        fs::write(root.join("locusA.fasta"), ">1\nATG\n").unwrap();
        fs::write(root.join("model.trn"), b"\x00\x01").unwrap();
        fs::write(root.join(SCHEMA_CONFIG_FILE), "{}").unwrap();
        fs::write(root.join("notes.txt"), "ignored").unwrap();

        let found = scan_schema_dir(root).unwrap();

        let names: Vec<String> = found.loci.iter().map(|p| locus_name(p)).collect();
        assert_eq!(names, vec!["locusA", "locusB"]);
        assert_eq!(found.training_files.len(), 1);
        assert!(found.config_snapshot.is_some());
    }

    #[test]
    fn test_subdirectories_are_not_scanned() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("short")).unwrap();
        fs::write(root.join("short").join("locusA_short.fasta"), ">1\nATG\n").unwrap();
        fs::write(root.join("locusA.fasta"), ">1\nATG\n").unwrap();

        let found = scan_schema_dir(root).unwrap();
        assert_eq!(found.loci.len(), 1);
    }

    #[test]
    fn test_empty_directory_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = scan_schema_dir(temp_dir.path());
        assert!(matches!(result, Err(ScanError::NoLoci(_))));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let result = scan_schema_dir(Path::new("/nonexistent/schema"));
        assert!(matches!(result, Err(ScanError::PathNotFound(_))));
    }
}
