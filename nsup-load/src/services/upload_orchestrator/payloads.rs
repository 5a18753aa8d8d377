//! Upload request bodies
//!
//! Binary content (gzip allele archives, training files) travels inside JSON
//! with every byte mapped to the Latin-1 character of the same value.

use crate::models::TrainingFile;
use crate::services::ns_client::{FilePayload, SchemaRef};
use flate2::write::GzEncoder;
use flate2::Compression;
use nsup_common::hashing::sequence_hash;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::Write;

/// Map bytes one-to-one onto Latin-1 characters
pub fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Registry short id of a locus (`SPN-000042`)
pub fn ns_locus_id(prefix: &str, locus_id: u64) -> String {
    format!("{}-{:06}", prefix, locus_id)
}

#[derive(Debug, Serialize)]
struct AlleleEntry<'a> {
    sequence: &'a str,
    hash: String,
}

#[derive(Debug, Serialize)]
struct AlleleDocument<'a> {
    locus: &'a str,
    species: &'a str,
    user_id: &'a str,
    alleles: Vec<AlleleEntry<'a>>,
}

/// Gzipped JSON document describing the alleles to insert
pub fn allele_archive(
    locus_uri: &str,
    species_name: &str,
    user_id: &str,
    sequences: &[&str],
) -> std::io::Result<Vec<u8>> {
    let document = AlleleDocument {
        locus: locus_uri,
        species: species_name,
        user_id,
        alleles: sequences
            .iter()
            .map(|sequence| AlleleEntry {
                sequence,
                hash: sequence_hash(sequence),
            })
            .collect(),
    };

    let json = serde_json::to_vec(&document).map_err(std::io::Error::other)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    encoder.finish()
}

/// Archive file name, unique per schema and locus
pub fn archive_file_name(schema: &SchemaRef, locus_id: u64) -> String {
    format!("{}_{}_{}.gz", schema.species_id, schema.schema_id, locus_id)
}

pub fn allele_payload(filename: String, archive: &[u8]) -> FilePayload {
    FilePayload {
        filename,
        content: latin1_string(archive),
    }
}

/// `{"content": {locus_id: {sequence hash: length}}}`
pub fn lengths_payload(locus_id: u64, sequences: &[&str]) -> Value {
    let lengths: BTreeMap<String, usize> = sequences
        .iter()
        .map(|sequence| (sequence_hash(sequence), sequence.len()))
        .collect();

    json!({ "content": { locus_id.to_string(): lengths } })
}

/// Training file named by its hash
pub fn training_file_payload(training_file: &TrainingFile) -> std::io::Result<FilePayload> {
    let bytes = std::fs::read(&training_file.path)?;
    Ok(FilePayload {
        filename: training_file.hash.clone(),
        content: latin1_string(&bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_latin1_mapping_is_byte_for_byte() {
        let bytes: Vec<u8> = (0..=255).collect();
        let text = latin1_string(&bytes);
        assert_eq!(text.chars().count(), 256);
        let back: Vec<u8> = text.chars().map(|c| c as u32 as u8).collect();
        assert_eq!(back, bytes);
    }

    #[test]
    fn test_ns_locus_id_padding() {
        assert_eq!(ns_locus_id("SPN", 42), "SPN-000042");
        assert_eq!(ns_locus_id("ACIBA", 1234567), "ACIBA-1234567");
    }

    #[test]
    fn test_allele_archive_content() {
        let archive = allele_archive(
            "http://ns/api/loci/3",
            "Streptococcus pneumoniae",
            "7",
            &["ATGAAATAA", "ATGAAGTAA"],
        )
        .unwrap();

        let mut json = String::new();
        GzDecoder::new(archive.as_slice()).read_to_string(&mut json).unwrap();
        let document: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(document["locus"], "http://ns/api/loci/3");
        assert_eq!(document["user_id"], "7");
        assert_eq!(document["alleles"].as_array().unwrap().len(), 2);
        assert_eq!(document["alleles"][0]["hash"], sequence_hash("ATGAAATAA"));
    }

    #[test]
    fn test_lengths_payload_shape() {
        let body = lengths_payload(3, &["ATGAAATAA"]);
        assert_eq!(body["content"]["3"][sequence_hash("ATGAAATAA")], 9);
    }
}
