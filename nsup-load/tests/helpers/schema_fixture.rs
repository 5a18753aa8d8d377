//! Local schema directories for tests

use nsup_common::hashing::sha256_hex;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

pub const TRAINING_BYTES: &[u8] = b"\x00\x01prodigal training model\xff\xfe";

/// Valid coding sequences under translation table 11
pub const ALLELE_1: &str = "ATGAAATAA";
pub const ALLELE_2: &str = "ATGAAGTAA";
pub const ALLELE_3: &str = "ATGCCCTAA";
pub const ALLELE_4: &str = "ATGGGGTGA";
/// Ambiguous base
pub const INVALID_ALLELE: &str = "ATGNNNTAA";

pub struct SchemaFixture {
    pub dir: TempDir,
}

impl SchemaFixture {
    /// Schema directory with the given loci and a matching configuration snapshot
    pub fn new(loci: &[(&str, &[&str])]) -> Self {
        let dir = TempDir::new().unwrap();
        for (file_name, alleles) in loci {
            write_locus(dir.path(), file_name, alleles);
        }

        std::fs::write(dir.path().join("Streptococcus_pneumoniae.trn"), TRAINING_BYTES).unwrap();
        write_snapshot(
            dir.path(),
            json!({
                "bsr": [0.6],
                "minimum_locus_length": [9],
                "translation_table": [11],
                "size_threshold": [null],
                "chewBBACA_version": ["2.5.0"],
                "prodigal_training_file": [sha256_hex(TRAINING_BYTES)],
                "word_size": [5],
                "cluster_sim": [0.2],
                "representative_filter": [0.9],
                "intra_cluster_filter": [0.9]
            }),
        );

        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn set_snapshot(&self, snapshot: serde_json::Value) {
        write_snapshot(self.path(), snapshot);
    }
}

pub fn write_locus(dir: &Path, file_name: &str, alleles: &[&str]) {
    let content: String = alleles
        .iter()
        .enumerate()
        .map(|(i, seq)| format!(">{}_{}\n{}\n", file_name.trim_end_matches(".fasta"), i + 1, seq))
        .collect();
    std::fs::write(dir.join(file_name), content).unwrap();
}

pub fn write_snapshot(dir: &Path, snapshot: serde_json::Value) {
    std::fs::write(dir.join(".schema_config"), snapshot.to_string()).unwrap();
}
