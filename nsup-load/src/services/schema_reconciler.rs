//! Local vs. registry schema reconciliation
//!
//! The registry may only ever hold a subset of the local alleles for a locus.
//! Anything else means the registry copy did not come from this local schema,
//! and the run stops before writing anything.
//!
//! For a resumed schema the delta is every local locus the registry lacks
//! (`missing`) plus every shared locus with local alleles the registry lacks
//! (`incomplete`).

use crate::error::{LoadError, LoadResult};
use crate::models::locus::locus_id_from_uri;
use crate::models::{LocalLocus, LocusQc, RemoteLocus, UploadTarget};
use crate::services::ns_client::{RegistryApi, RegistryError, SchemaRef, SchemaState, SchemaSummary};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Shared locus with alleles still to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteLocus {
    /// Locus file name
    pub locus: String,
    pub uri: String,
    pub missing_alleles: BTreeSet<String>,
}

/// What must be uploaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationDelta {
    /// Loci to create, by file name
    pub missing: Vec<String>,
    pub incomplete: Vec<IncompleteLocus>,
}

impl ReconciliationDelta {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.incomplete.is_empty()
    }

    /// Upload target per locus file name
    pub fn targets(&self) -> BTreeMap<String, UploadTarget> {
        let mut targets: BTreeMap<String, UploadTarget> = self
            .missing
            .iter()
            .map(|locus| (locus.clone(), UploadTarget::FreshLocus))
            .collect();

        for incomplete in &self.incomplete {
            targets.insert(
                incomplete.locus.clone(),
                UploadTarget::ResumedLocus {
                    existing_uri: incomplete.uri.clone(),
                    missing_alleles: incomplete.missing_alleles.clone(),
                },
            );
        }

        targets
    }
}

/// A schema may be resumed only while open and only by the user who started it
pub async fn check_resumable(
    registry: &dyn RegistryApi,
    species_id: &str,
    schema: &SchemaSummary,
) -> LoadResult<()> {
    let info = registry.get_schema(species_id, &schema.id).await?;
    if info.state() != SchemaState::Open {
        return Err(LoadError::Conflict(
            "Schema finished uploading. Cannot proceed.".to_string(),
        ));
    }

    if !registry.schema_administrated(species_id, &schema.id).await? {
        return Err(LoadError::Authorization(
            "Current user is not the user that started schema upload.".to_string(),
        ));
    }

    tracing::info!(schema = %schema.uri, "Schema exists and was not fully uploaded");
    Ok(())
}

/// Fetch the registry's loci and their alleles
///
/// Loci unknown to the local schema abort with an integrity error before
/// any sequences are requested. Fewer remote loci than local ones only
/// produces a warning.
pub async fn fetch_remote_inventory(
    registry: &dyn RegistryApi,
    schema: &SchemaRef,
    local_loci: &[LocalLocus],
    threads: usize,
) -> LoadResult<Vec<RemoteLocus>> {
    let entries = registry.list_schema_loci(schema).await?;

    let local_names: BTreeSet<&str> = local_loci.iter().map(|l| l.file_name.as_str()).collect();
    let remote_names: BTreeSet<&str> = entries.iter().map(|e| e.original_name.as_str()).collect();

    let unknown: Vec<&str> = remote_names.difference(&local_names).copied().collect();
    if !unknown.is_empty() {
        tracing::error!(loci = ?unknown, "Registry loci absent from local schema");
        return Err(LoadError::Integrity(
            "NS schema has loci that are not in the local schema.".to_string(),
        ));
    }

    if remote_names.len() < local_names.len() {
        let absent: Vec<String> = local_names
            .difference(&remote_names)
            .map(|name| name.to_string())
            .collect();
        tracing::warn!(
            "NS schema has less loci than local schema.\nAbsent loci: \n{}",
            format_absent_loci(&absent)
        );
    } else {
        tracing::info!("NS and local schemas have the same number of loci.");
    }

    let remote: Vec<RemoteLocus> = stream::iter(entries)
        .map(|entry| async move {
            let id = locus_id_from_uri(&entry.uri).ok_or_else(|| {
                RegistryError::Parse(format!("locus URI without numeric id: {}", entry.uri))
            })?;
            let sequences = registry.locus_sequences(id).await?;

            Ok::<_, RegistryError>(RemoteLocus {
                uri: entry.uri,
                original_name: entry.original_name,
                name: entry.name,
                alleles: sequences.into_iter().collect(),
            })
        })
        .buffer_unordered(threads.max(1))
        .try_collect()
        .await?;

    tracing::info!(loci = remote.len(), "Retrieved registry inventory");
    Ok(remote)
}

/// Four names per row, padded to 30 columns
pub fn format_absent_loci(absent: &[String]) -> String {
    absent
        .chunks(4)
        .map(|row| {
            row.iter()
                .map(|name| format!("{:30} ", name))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every remote allele must exist locally
///
/// Checked against every local sequence, valid or not.
pub fn check_integrity(local_loci: &[LocalLocus], remote_loci: &[RemoteLocus]) -> LoadResult<()> {
    let local_by_name: HashMap<&str, &LocalLocus> =
        local_loci.iter().map(|l| (l.file_name.as_str(), l)).collect();

    for remote in remote_loci {
        let Some(local) = local_by_name.get(remote.original_name.as_str()) else {
            return Err(LoadError::Integrity(
                "NS schema has loci that are not in the local schema.".to_string(),
            ));
        };

        let local_alleles = local.allele_set();
        let foreign = remote
            .alleles
            .iter()
            .filter(|allele| !local_alleles.contains(allele.as_str()))
            .count();

        if foreign > 0 {
            tracing::error!(
                locus = %remote.original_name,
                foreign_alleles = foreign,
                "Registry locus has alleles absent locally"
            );
            return Err(LoadError::Integrity(format!(
                "Locus {} in the NS has sequences that are not in the local locus. Local schema is not the original.",
                remote.original_name
            )));
        }
    }

    Ok(())
}

/// Delta for a fresh schema: every local locus
pub fn reconcile_fresh(qc: &[LocusQc]) -> ReconciliationDelta {
    ReconciliationDelta {
        missing: qc.iter().map(|q| q.locus.clone()).collect(),
        incomplete: Vec::new(),
    }
}

/// Delta for a resumed schema
///
/// Integrity is verified first. Incompleteness compares the alleles that
/// passed quality control, since only those are ever sent.
pub fn reconcile_resume(
    local_loci: &[LocalLocus],
    qc: &[LocusQc],
    remote_loci: &[RemoteLocus],
) -> LoadResult<ReconciliationDelta> {
    check_integrity(local_loci, remote_loci)?;

    let remote_by_name: HashMap<&str, &RemoteLocus> = remote_loci
        .iter()
        .map(|r| (r.original_name.as_str(), r))
        .collect();

    let mut delta = ReconciliationDelta::default();

    for locus in qc {
        match remote_by_name.get(locus.locus.as_str()) {
            Some(remote) => {
                let valid: HashSet<&str> = locus.valid_sequences();
                let missing_alleles: BTreeSet<String> = valid
                    .into_iter()
                    .filter(|seq| !remote.alleles.contains(*seq))
                    .map(str::to_string)
                    .collect();

                if !missing_alleles.is_empty() {
                    delta.incomplete.push(IncompleteLocus {
                        locus: locus.locus.clone(),
                        uri: remote.uri.clone(),
                        missing_alleles,
                    });
                }
            }
            None => delta.missing.push(locus.locus.clone()),
        }
    }

    tracing::info!(
        missing = delta.missing.len(),
        incomplete = delta.incomplete.len(),
        "Determined loci to upload"
    );

    if delta.is_empty() {
        return Err(LoadError::NothingToDo(
            "Local and NS schemas are identical. Nothing left to do.".to_string(),
        ));
    }

    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fasta_reader::SequenceRecord;
    use std::path::PathBuf;

    fn local(name: &str, alleles: &[&str]) -> LocalLocus {
        LocalLocus {
            path: PathBuf::from(format!("/schema/{}.fasta", name)),
            name: name.to_string(),
            file_name: format!("{}.fasta", name),
            records: alleles
                .iter()
                .enumerate()
                .map(|(i, s)| SequenceRecord {
                    id: format!("{}_{}", name, i + 1),
                    sequence: s.to_string(),
                })
                .collect(),
        }
    }

    fn qc_all_valid(locus: &LocalLocus) -> LocusQc {
        LocusQc {
            locus: locus.file_name.clone(),
            valid: locus.records.clone(),
            invalid: Vec::new(),
            proteins: Vec::new(),
            proteins_file: None,
        }
    }

    fn remote(name: &str, id: u64, alleles: &[&str]) -> RemoteLocus {
        RemoteLocus {
            uri: format!("http://ns/api/loci/{}", id),
            original_name: format!("{}.fasta", name),
            name: format!("SPN-{:06}", id),
            alleles: alleles.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn abc() -> Vec<LocalLocus> {
        vec![
            local("A", &["AAA", "AAT"]),
            local("B", &["CCC", "CCG"]),
            local("C", &["GGG"]),
        ]
    }

    #[test]
    fn test_fresh_delta_is_every_locus() {
        let loci = abc();
        let qc: Vec<LocusQc> = loci.iter().map(qc_all_valid).collect();
        let delta = reconcile_fresh(&qc);
        assert_eq!(delta.missing, vec!["A.fasta", "B.fasta", "C.fasta"]);
        assert!(delta.incomplete.is_empty());
    }

    #[test]
    fn test_resume_partial_schema() {
        let loci = abc();
        let qc: Vec<LocusQc> = loci.iter().map(qc_all_valid).collect();
        let remote_loci = vec![remote("A", 1, &["AAA", "AAT"]), remote("B", 2, &["CCC"])];

        let delta = reconcile_resume(&loci, &qc, &remote_loci).unwrap();

        assert_eq!(delta.missing, vec!["C.fasta"]);
        assert_eq!(delta.incomplete.len(), 1);
        assert_eq!(delta.incomplete[0].locus, "B.fasta");
        assert_eq!(delta.incomplete[0].uri, "http://ns/api/loci/2");
        assert_eq!(
            delta.incomplete[0].missing_alleles,
            BTreeSet::from(["CCG".to_string()])
        );

        let targets = delta.targets();
        assert_eq!(targets["C.fasta"], UploadTarget::FreshLocus);
        assert!(matches!(targets["B.fasta"], UploadTarget::ResumedLocus { .. }));
        assert!(!targets.contains_key("A.fasta"));
    }

    #[test]
    fn test_reconciliation_is_idempotent() {
        let loci = abc();
        let qc: Vec<LocusQc> = loci.iter().map(qc_all_valid).collect();
        let remote_loci = vec![remote("B", 2, &["CCC"])];

        let first = reconcile_resume(&loci, &qc, &remote_loci).unwrap();
        let second = reconcile_resume(&loci, &qc, &remote_loci).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_identical_schemas_have_nothing_to_do() {
        let loci = abc();
        let qc: Vec<LocusQc> = loci.iter().map(qc_all_valid).collect();
        let remote_loci = vec![
            remote("A", 1, &["AAA", "AAT"]),
            remote("B", 2, &["CCC", "CCG"]),
            remote("C", 3, &["GGG"]),
        ];

        let result = reconcile_resume(&loci, &qc, &remote_loci);
        assert!(matches!(result, Err(LoadError::NothingToDo(_))));
    }

    #[test]
    fn test_foreign_remote_allele_is_integrity_error() {
        let loci = abc();
        let qc: Vec<LocusQc> = loci.iter().map(qc_all_valid).collect();
        let remote_loci = vec![remote("A", 1, &["AAA", "TTT"])];

        let result = reconcile_resume(&loci, &qc, &remote_loci);
        assert!(matches!(result, Err(LoadError::Integrity(_))));
    }

    #[test]
    fn test_integrity_checks_invalid_local_alleles_too() {
        let loci = abc();
        let mut qc: Vec<LocusQc> = loci.iter().map(qc_all_valid).collect();
        // AAT failed quality control locally but the registry may hold it
        qc[0].valid.retain(|r| r.sequence != "AAT");
        let remote_loci = vec![remote("A", 1, &["AAA", "AAT"])];

        let delta = reconcile_resume(&loci, &qc, &remote_loci).unwrap();
        assert!(delta.incomplete.is_empty());
        assert_eq!(delta.missing, vec!["B.fasta", "C.fasta"]);
    }

    #[test]
    fn test_unknown_remote_locus_is_integrity_error() {
        let loci = abc();
        let result = check_integrity(&loci, &[remote("Z", 9, &[])]);
        assert!(matches!(result, Err(LoadError::Integrity(_))));
    }

    #[test]
    fn test_absent_loci_four_per_row() {
        let absent: Vec<String> = (1..=6).map(|i| format!("locus{}.fasta", i)).collect();
        let text = format_absent_loci(&absent);
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains("locus4.fasta"));
        assert!(rows[1].starts_with("locus5.fasta"));
        assert_eq!(rows[0].len(), 4 * 31);
    }
}
