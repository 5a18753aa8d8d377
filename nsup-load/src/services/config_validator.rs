//! Schema parameter validation
//!
//! Each parameter from the `.schema_config` snapshot is checked on its own and
//! yields a [`Checked`] value with a human-readable message. The run only
//! proceeds when every parameter is valid; otherwise all messages are returned
//! together so every problem is visible at once.

use crate::error::{LoadError, LoadResult};
use crate::models::{Checked, ConfigSnapshot, SchemaParameters, TrainingFile};
use crate::models::schema_params::{format_float, snapshot_from_json};
use crate::services::genetic_code::genetic_code;
use nsup_common::hashing::file_sha256;
use std::path::{Path, PathBuf};

/// Schema builder versions whose schemas the registry accepts
pub const COMPATIBLE_VERSIONS: &[&str] = &[
    "2.0.0", "2.0.1", "2.0.2", "2.0.3", "2.0.4", "2.0.5", "2.0.6", "2.0.7", "2.0.8", "2.0.9",
    "2.0.10", "2.0.11", "2.0.12", "2.0.13", "2.0.14", "2.0.15", "2.0.16", "2.0.17", "2.1.0",
    "2.5.0", "2.5.1", "2.5.2", "2.5.3", "2.5.4", "2.5.5", "2.5.6",
];

const NO_CLUSTERING: &str = "Schema created with a chewBBACA version that did not use clustering.";

/// Read the local configuration snapshot (JSON)
pub fn load_snapshot(path: &Path) -> LoadResult<ConfigSnapshot> {
    if !path.is_file() {
        return Err(LoadError::Configuration(vec![
            "Could not find a valid config file. Cannot upload schema without checking for valid parameters values."
                .to_string(),
        ]));
    }

    let content = std::fs::read_to_string(path)?;
    let document: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        LoadError::Configuration(vec![format!("Malformed config file {}: {}", path.display(), e)])
    })?;

    snapshot_from_json(&document).map_err(|e| LoadError::Configuration(vec![e]))
}

/// Values stored for `key`, `None` when the key is absent
fn values<'a>(snapshot: &'a ConfigSnapshot, key: &str) -> Option<&'a [Option<String>]> {
    snapshot.get(key).map(|v| v.as_slice())
}

/// The single non-null value stored for `key`
fn single<'a>(snapshot: &'a ConfigSnapshot, key: &str) -> Option<&'a str> {
    match values(snapshot, key) {
        Some([Some(value)]) => Some(value.trim()),
        _ => None,
    }
}

pub fn validate_bsr(snapshot: &ConfigSnapshot) -> Checked<f64> {
    const NAME: &str = "bsr";
    let Some(raw) = single(snapshot, NAME) else {
        return Checked::invalid(NAME, "Invalid BSR value or multiple BSR values.");
    };

    match raw.parse::<f64>() {
        Ok(bsr) if bsr > 0.0 && bsr < 1.0 => Checked::valid(
            NAME,
            bsr,
            format!("Schema created with BSR value of {}.", format_float(bsr)),
        ),
        _ => Checked::invalid(
            NAME,
            format!(
                "Invalid BSR value of {}. BSR value must be contained in the ]0.0, 1.0[ interval.",
                raw
            ),
        ),
    }
}

pub fn validate_minimum_length(snapshot: &ConfigSnapshot) -> Checked<u32> {
    const NAME: &str = "minimum_locus_length";
    let Some(raw) = single(snapshot, NAME) else {
        return Checked::invalid(NAME, "Invalid minimum sequence length value.");
    };

    match raw.parse::<u32>() {
        Ok(length) => Checked::valid(
            NAME,
            length,
            format!("Schema created with a minimum sequence length parameter of {}.", length),
        ),
        Err(_) => Checked::invalid(
            NAME,
            "Invalid minimum sequence length value used to create schema. Value must be a positive integer.",
        ),
    }
}

pub fn validate_translation_table(snapshot: &ConfigSnapshot) -> Checked<u8> {
    const NAME: &str = "translation_table";
    let Some(raw) = single(snapshot, NAME) else {
        return Checked::invalid(NAME, "Invalid genetic code.");
    };

    match raw.parse::<u8>().ok().and_then(genetic_code) {
        Some(code) => Checked::valid(
            NAME,
            code.id,
            format!(
                "Schema genes were predicted with genetic code {} ({}).",
                code.id, code.description
            ),
        ),
        None => Checked::invalid(NAME, "Genetic code used to create schema is not valid."),
    }
}

/// Missing key or a single `null` both mean "no size threshold"
pub fn validate_size_threshold(snapshot: &ConfigSnapshot) -> Checked<Option<f64>> {
    const NAME: &str = "size_threshold";
    let without = "Schema was created without a size_threshold value.";

    let raw = match values(snapshot, NAME) {
        None | Some([None]) => return Checked::valid(NAME, None, without),
        Some([Some(raw)]) => raw.trim(),
        Some(_) => return Checked::invalid(NAME, "Multiple size threshold values."),
    };

    if raw == "None" {
        return Checked::valid(NAME, None, without);
    }

    match raw.parse::<f64>() {
        Ok(threshold) if threshold.is_finite() && threshold >= 0.0 => Checked::valid(
            NAME,
            Some(threshold),
            format!(
                "Schema created with a size threshold parameter of {}.",
                format_float(threshold)
            ),
        ),
        _ => Checked::invalid(
            NAME,
            "Invalid size threshold value used to create schema. Value must be None or a positive float.",
        ),
    }
}

pub fn validate_version(snapshot: &ConfigSnapshot) -> Checked<String> {
    const NAME: &str = "chewBBACA_version";
    let Some(raw) = single(snapshot, NAME) else {
        return Checked::invalid(NAME, "Invalid Chewie version.");
    };

    if COMPATIBLE_VERSIONS.contains(&raw) {
        Checked::valid(NAME, raw.to_string(), format!("Schema created with chewBBACA v{}.", raw))
    } else {
        Checked::invalid(
            NAME,
            "Schema created with chewBBACA version that is not suitable to work with the NS.",
        )
    }
}

/// Shared shape of the optional clustering parameters
fn clustering_value<T, F>(
    snapshot: &ConfigSnapshot,
    name: &'static str,
    label: &str,
    accept: F,
) -> Checked<Option<T>>
where
    T: std::str::FromStr + std::fmt::Display,
    F: Fn(&T) -> bool,
{
    let raw = match values(snapshot, name) {
        None | Some([None]) => return Checked::valid(name, None, NO_CLUSTERING),
        Some([Some(raw)]) => raw.trim(),
        Some(_) => {
            return Checked::invalid(name, format!("Schema created with multiple {} values.", label))
        }
    };

    match raw.parse::<T>() {
        Ok(value) if accept(&value) => {
            let message = format!("Schema created with a {} value of {}.", label, value);
            Checked::valid(name, Some(value), message)
        }
        _ => Checked::invalid(name, format!("Schema created with invalid {} value.", label)),
    }
}

pub fn validate_word_size(snapshot: &ConfigSnapshot) -> Checked<Option<u32>> {
    clustering_value(snapshot, "word_size", "clustering word size", |w: &u32| *w >= 4)
}

pub fn validate_cluster_sim(snapshot: &ConfigSnapshot) -> Checked<Option<f64>> {
    clustering_value(snapshot, "cluster_sim", "clustering threshold", unit_interval)
}

pub fn validate_representative_filter(snapshot: &ConfigSnapshot) -> Checked<Option<f64>> {
    clustering_value(snapshot, "representative_filter", "representative filter", unit_interval)
}

pub fn validate_intra_cluster_filter(snapshot: &ConfigSnapshot) -> Checked<Option<f64>> {
    clustering_value(snapshot, "intraCluster_filter", "intraCluster filter", unit_interval)
}

fn unit_interval(value: &f64) -> bool {
    (0.0..=1.0).contains(value)
}

/// Training file: one recorded hash, one `.trn` file, matching content
pub fn validate_training_file(
    snapshot: &ConfigSnapshot,
    training_files: &[PathBuf],
) -> Checked<TrainingFile> {
    const NAME: &str = "prodigal_training_file";

    let recorded = match values(snapshot, NAME) {
        Some([Some(hash)]) => hash.trim(),
        Some(hashes) if hashes.len() > 1 => {
            return Checked::invalid(NAME, "Schema was used with more than one training file.")
        }
        _ => {
            return Checked::invalid(NAME, "Could not find a valid training file in schema configs.")
        }
    };

    let path = match training_files {
        [path] => path,
        [] => return Checked::invalid(NAME, "Could not find a training file in schema directory."),
        _ => return Checked::invalid(NAME, "More than one training file in schema directory."),
    };

    match file_sha256(path) {
        Ok(hash) if hash == recorded => Checked::valid(
            NAME,
            TrainingFile {
                path: path.clone(),
                hash,
            },
            "Found valid training file in schema directory.",
        ),
        Ok(_) => Checked::invalid(NAME, "Training file in schema directory is not the original."),
        Err(e) => Checked::invalid(NAME, format!("Could not read training file: {}", e)),
    }
}

/// Validate every parameter and assemble the canonical set
///
/// Every message is logged; on failure the invalid ones are returned inside
/// [`LoadError::Configuration`].
pub fn validate_parameters(
    snapshot: &ConfigSnapshot,
    training_files: &[PathBuf],
) -> LoadResult<SchemaParameters> {
    let training_file = validate_training_file(snapshot, training_files);
    let bsr = validate_bsr(snapshot);
    let minimum_length = validate_minimum_length(snapshot);
    let translation_table = validate_translation_table(snapshot);
    let size_threshold = validate_size_threshold(snapshot);
    let version = validate_version(snapshot);
    let word_size = validate_word_size(snapshot);
    let cluster_sim = validate_cluster_sim(snapshot);
    let representative_filter = validate_representative_filter(snapshot);
    let intra_cluster_filter = validate_intra_cluster_filter(snapshot);

    let outcomes: [(&str, bool, &str); 10] = [
        (training_file.name, training_file.is_valid(), training_file.message.as_str()),
        (bsr.name, bsr.is_valid(), bsr.message.as_str()),
        (minimum_length.name, minimum_length.is_valid(), minimum_length.message.as_str()),
        (translation_table.name, translation_table.is_valid(), translation_table.message.as_str()),
        (size_threshold.name, size_threshold.is_valid(), size_threshold.message.as_str()),
        (version.name, version.is_valid(), version.message.as_str()),
        (word_size.name, word_size.is_valid(), word_size.message.as_str()),
        (cluster_sim.name, cluster_sim.is_valid(), cluster_sim.message.as_str()),
        (representative_filter.name, representative_filter.is_valid(), representative_filter.message.as_str()),
        (intra_cluster_filter.name, intra_cluster_filter.is_valid(), intra_cluster_filter.message.as_str()),
    ];

    let mut failures = Vec::new();
    for (name, valid, message) in outcomes {
        if valid {
            tracing::info!(parameter = name, "{}", message);
        } else {
            tracing::error!(parameter = name, "{}", message);
            failures.push(message.to_string());
        }
    }

    match (
        training_file.value,
        bsr.value,
        minimum_length.value,
        translation_table.value,
        size_threshold.value,
        version.value,
        word_size.value,
        cluster_sim.value,
        representative_filter.value,
        intra_cluster_filter.value,
    ) {
        (
            Some(training_file),
            Some(bsr),
            Some(minimum_locus_length),
            Some(translation_table),
            Some(size_threshold),
            Some(chewbbaca_version),
            Some(word_size),
            Some(cluster_sim),
            Some(representative_filter),
            Some(intra_cluster_filter),
        ) => {
            tracing::info!("All configurations successfully validated.");
            Ok(SchemaParameters {
                bsr,
                minimum_locus_length,
                translation_table,
                size_threshold,
                chewbbaca_version,
                word_size,
                cluster_sim,
                representative_filter,
                intra_cluster_filter,
                training_file,
            })
        }
        _ => Err(LoadError::Configuration(failures)),
    }
}
