//! Per-locus allele quality control
//!
//! Every allele is translated with the schema's genetic code; alleles that
//! fail, or whose length falls outside the size threshold around the locus
//! length mode, are classified invalid and excluded from every later step.
//!
//! Loci are classified in parallel on a dedicated rayon pool of `cpu_cores`
//! threads. The caller waits for every locus before anything downstream runs.

use crate::error::{LoadError, LoadResult};
use crate::models::{InvalidAllele, LocalLocus, LocusQc};
use crate::services::genetic_code::{genetic_code, GeneticCode};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Quality-control parameters shared by every locus
#[derive(Debug, Clone)]
pub struct QcSettings {
    pub translation_table: u8,
    pub minimum_length: u32,
    pub size_threshold: Option<f64>,
    pub cpu_cores: usize,
    /// Directory for persisted protein translations; `None` skips persistence
    pub work_dir: Option<PathBuf>,
}

/// Classify every allele of one locus
///
/// Pure function of the locus content and parameters.
pub fn classify_locus(
    locus: &LocalLocus,
    code: &GeneticCode,
    minimum_length: u32,
    size_threshold: Option<f64>,
) -> LocusQc {
    let mut outcomes: Vec<Result<String, String>> = locus
        .records
        .iter()
        .map(|record| {
            code.translate_cds(&record.sequence, minimum_length as usize)
                .map(|translation| translation.protein)
                .map_err(|e| e.to_string())
        })
        .collect();

    if let Some(threshold) = size_threshold {
        let lengths: Vec<usize> = locus
            .records
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| outcome.is_ok())
            .map(|(record, _)| record.sequence.len())
            .collect();

        if let Some(mode) = length_mode(&lengths) {
            let lower = mode as f64 * (1.0 - threshold);
            let upper = mode as f64 * (1.0 + threshold);

            for (record, outcome) in locus.records.iter().zip(outcomes.iter_mut()) {
                if outcome.is_err() {
                    continue;
                }
                let length = record.sequence.len() as f64;
                if length < lower {
                    *outcome = Err("allele length below size threshold".to_string());
                } else if length > upper {
                    *outcome = Err("allele length above size threshold".to_string());
                }
            }
        }
    }

    let mut qc = LocusQc {
        locus: locus.file_name.clone(),
        valid: Vec::new(),
        invalid: Vec::new(),
        proteins: Vec::new(),
        proteins_file: None,
    };

    for (record, outcome) in locus.records.iter().zip(outcomes) {
        match outcome {
            Ok(protein) => {
                qc.valid.push(record.clone());
                qc.proteins.push(protein);
            }
            Err(reason) => qc.invalid.push(InvalidAllele {
                id: record.id.clone(),
                reason,
            }),
        }
    }

    qc
}

/// Most frequent length; ties go to the smallest length
pub fn length_mode(lengths: &[usize]) -> Option<usize> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for length in lengths {
        *counts.entry(*length).or_insert(0) += 1;
    }

    // BTreeMap iterates ascending, so the first maximum is the smallest length
    let mut best: Option<(usize, usize)> = None;
    for (length, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((length, count));
        }
    }
    best.map(|(length, _)| length)
}

/// One persisted protein translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProteinEntry {
    pub id: String,
    pub protein: String,
}

/// Write the valid alleles' translations, in allele order
pub fn persist_proteins(qc: &LocusQc, work_dir: &Path) -> std::io::Result<PathBuf> {
    let stem = qc.locus.strip_suffix(".fasta").unwrap_or(&qc.locus);
    let path = work_dir.join(format!("{}_proteins.json", stem));

    let entries: Vec<ProteinEntry> = qc
        .valid
        .iter()
        .zip(&qc.proteins)
        .map(|(record, protein)| ProteinEntry {
            id: record.id.clone(),
            protein: protein.clone(),
        })
        .collect();

    let json = serde_json::to_vec_pretty(&entries).map_err(std::io::Error::other)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// Read translations written by [`persist_proteins`]
pub fn load_proteins(path: &Path) -> std::io::Result<Vec<ProteinEntry>> {
    let content = std::fs::read(path)?;
    serde_json::from_slice(&content).map_err(std::io::Error::other)
}

/// Classify every locus in parallel and wait for all of them
///
/// Results keep the input order.
pub async fn run_quality_control(
    loci: Arc<Vec<LocalLocus>>,
    settings: QcSettings,
) -> LoadResult<Vec<LocusQc>> {
    let code = genetic_code(settings.translation_table).ok_or_else(|| {
        LoadError::Configuration(vec![format!(
            "Genetic code {} is not valid.",
            settings.translation_table
        )])
    })?;

    if let Some(dir) = &settings.work_dir {
        std::fs::create_dir_all(dir)?;
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.cpu_cores.max(1))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build quality control pool: {}", e))?;

    let total = loci.len();
    let processed = Arc::new(AtomicUsize::new(0));
    let processed_counter = processed.clone();
    let start = std::time::Instant::now();

    tracing::info!(loci = total, cpu_cores = settings.cpu_cores, "Running allele quality control");

    let results: Vec<std::io::Result<LocusQc>> = tokio::task::spawn_blocking(move || {
        pool.install(|| {
            loci.par_iter()
                .map(|locus| -> std::io::Result<LocusQc> {
                    let mut qc = classify_locus(
                        locus,
                        code,
                        settings.minimum_length,
                        settings.size_threshold,
                    );

                    if !qc.invalid.is_empty() {
                        tracing::info!(
                            "Found {} invalid alleles for locus {}.",
                            qc.invalid.len(),
                            locus.name
                        );
                    }

                    if let Some(dir) = &settings.work_dir {
                        qc.proteins_file = Some(persist_proteins(&qc, dir)?);
                    }

                    processed_counter.fetch_add(1, Ordering::Relaxed);
                    Ok(qc)
                })
                .collect()
        })
    })
    .await
    .map_err(|e| anyhow::anyhow!("Quality control task failed: {}", e))?;

    let results = results.into_iter().collect::<std::io::Result<Vec<_>>>()?;

    let invalid_total: usize = results.iter().map(|qc| qc.invalid.len()).sum();
    tracing::info!(
        "Quality control completed in {:?} | Loci: {} | Invalid alleles: {}",
        start.elapsed(),
        processed.load(Ordering::Relaxed),
        invalid_total
    );

    Ok(results)
}
