//! Schema load workflow
//!
//! Two phases. [`prepare_local_schema`] touches only the local schema
//! directory, so configuration errors surface before any network contact.
//! [`LoadWorkflow::run`] then talks to the registry:
//!
//! gates → remote inventory (resume) → quality control → delta →
//! annotation → schema creation (fresh) → per-locus upload → training file

use crate::error::{LoadError, LoadResult};
use crate::models::{Annotation, LocalLocus, LocusQc, RemoteLocus, SchemaParameters, UploadTarget};
use crate::services::annotation_resolver::{build_queries, resolve_all};
use crate::services::config_validator::{load_snapshot, validate_parameters};
use crate::services::ns_client::{last_segment, RegistryApi, RegistryError, SchemaRef, Species};
use crate::services::quality_control::{run_quality_control, QcSettings};
use crate::services::schema_reconciler::{
    check_integrity, check_resumable, fetch_remote_inventory, reconcile_fresh, reconcile_resume,
    ReconciliationDelta,
};
use crate::services::schema_scanner::{scan_schema_dir, ScanError, SCHEMA_CONFIG_FILE};
use crate::services::sparql_client::KnowledgeBase;
use crate::services::upload_orchestrator::{
    LocusWork, UploadContext, UploadOrchestrator, UploadStatistics,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// What the user asked to load
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub schema_dir: PathBuf,
    /// Registry species identifier or species name
    pub species: String,
    pub description: String,
    pub prefix: String,
    pub cpu_cores: usize,
    pub threads: usize,
    /// Resume a previously interrupted upload
    pub continue_up: bool,
    pub keep_intermediate: bool,
}

/// Validated local schema, ready to upload
#[derive(Debug, Clone)]
pub struct LocalSchema {
    pub root: PathBuf,
    pub parameters: SchemaParameters,
    /// Sorted by file name
    pub loci: Vec<LocalLocus>,
}

/// Scan, validate and read a local schema directory
pub fn prepare_local_schema(schema_dir: &Path) -> LoadResult<LocalSchema> {
    let directory = scan_schema_dir(schema_dir).map_err(|e| match e {
        ScanError::PathNotFound(_) | ScanError::NoLoci(_) => LoadError::NotFound(e.to_string()),
        ScanError::NotADirectory(_) => LoadError::Configuration(vec![e.to_string()]),
    })?;

    let snapshot_path = directory
        .config_snapshot
        .clone()
        .unwrap_or_else(|| schema_dir.join(SCHEMA_CONFIG_FILE));
    let snapshot = load_snapshot(&snapshot_path)?;
    tracing::info!("Found config file. Validating parameters...");

    let parameters = validate_parameters(&snapshot, &directory.training_files)?;

    let loci = directory
        .loci
        .iter()
        .map(|path| LocalLocus::load(path))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(loci = loci.len(), "Read local schema {}", schema_dir.display());

    Ok(LocalSchema {
        root: schema_dir.to_path_buf(),
        parameters,
        loci,
    })
}

/// Final outcome of a load run
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub run_id: Uuid,
    pub schema_uri: String,
    pub species_name: String,
    pub description: String,
    pub resumed: bool,
    pub statistics: UploadStatistics,
    /// Registry reply to the training file upload, or the failure
    pub training_file: Result<String, String>,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            self.statistics.created_display(),
            self.statistics.species_display(&self.species_name),
            self.statistics.schema_display(&self.description),
            self.statistics.transmissions_display(),
        ];

        for failure in &self.statistics.failures {
            lines.push(format!("Failed locus {} ({:?}): {}", failure.locus, failure.state, failure.reason));
        }

        match &self.training_file {
            Ok(message) => lines.push(message.clone()),
            Err(reason) => lines.push(format!("Could not upload training file: {}", reason)),
        }

        lines.push(format!("Elapsed time: {}", format_elapsed(self.elapsed)));
        lines
    }
}

/// `XmYs`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m{}s", secs / 60, secs % 60)
}

/// Resolve a species given by numeric identifier or by name
pub async fn resolve_species(registry: &dyn RegistryApi, species: &str) -> LoadResult<Species> {
    let found = if species.chars().all(|c| c.is_ascii_digit()) && !species.is_empty() {
        registry.species_by_id(species).await?
    } else {
        registry
            .species_list()
            .await?
            .into_iter()
            .find(|s| s.name == species)
    };

    let species = found.ok_or_else(|| {
        LoadError::NotFound(format!(
            "There is no species with the provided identifier in the NS: {}",
            species
        ))
    })?;

    tracing::info!("NS species with identifier {} is {}.", species.id, species.name);
    Ok(species)
}

/// Map schema creation failures onto the fatal taxonomy
fn schema_creation_error(error: RegistryError) -> LoadError {
    match &error {
        RegistryError::Status { code: 409, reason } => LoadError::Conflict(reason.clone()),
        RegistryError::Status { code: 403, reason } => LoadError::Authorization(reason.clone()),
        RegistryError::Status { code: 404, reason } => LoadError::NotFound(reason.clone()),
        _ => LoadError::Registry(error),
    }
}

/// Valid allele sequences in file order, first occurrence only
fn unique_valid_sequences(qc: &LocusQc) -> Vec<String> {
    let mut seen = HashSet::new();
    qc.valid
        .iter()
        .filter(|record| seen.insert(record.sequence.clone()))
        .map(|record| record.sequence.clone())
        .collect()
}

/// Registry-facing load workflow
pub struct LoadWorkflow {
    registry: Arc<dyn RegistryApi>,
    knowledge_base: Arc<dyn KnowledgeBase>,
    run_id: Uuid,
}

impl LoadWorkflow {
    pub fn new(registry: Arc<dyn RegistryApi>, knowledge_base: Arc<dyn KnowledgeBase>) -> Self {
        Self {
            registry,
            knowledge_base,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Work directory for intermediate files of this run
    pub fn work_dir(&self, schema: &LocalSchema) -> PathBuf {
        schema.root.join(format!("nsup_{}", self.run_id.simple()))
    }

    /// Upload a prepared local schema
    ///
    /// Intermediate files are removed afterwards, whatever the outcome,
    /// unless `keep_intermediate` is set.
    pub async fn run(&self, request: &LoadRequest, schema: &LocalSchema) -> LoadResult<LoadReport> {
        let work_dir = self.work_dir(schema);
        let result = self.execute(request, schema, &work_dir).await;

        if request.keep_intermediate {
            tracing::info!(run_id = %self.run_id, "Kept intermediate files in {}", work_dir.display());
        } else if work_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&work_dir) {
                tracing::warn!("Could not remove {}: {}", work_dir.display(), e);
            }
        }

        result
    }

    async fn execute(
        &self,
        request: &LoadRequest,
        schema: &LocalSchema,
        work_dir: &Path,
    ) -> LoadResult<LoadReport> {
        let start = Instant::now();
        let registry = self.registry.as_ref();

        tracing::info!(run_id = %self.run_id, continue_up = request.continue_up, "Starting schema load");

        // Gates
        let user = registry.current_user().await?;
        if !user.can_upload() {
            return Err(LoadError::Authorization(
                "Current user has no Administrator or Contributor permissions. Not allowed to upload schemas."
                    .to_string(),
            ));
        }

        let species = resolve_species(registry, &request.species).await?;

        let existing = registry
            .list_schemas(&species.id)
            .await?
            .into_iter()
            .find(|s| s.description == request.description);

        let resumed_schema = match (request.continue_up, existing) {
            (false, Some(_)) => {
                return Err(LoadError::Conflict(
                    "A schema with provided description already exists.".to_string(),
                ))
            }
            (true, None) => {
                return Err(LoadError::NotFound(
                    "Cannot continue uploading to a schema that does not exist.".to_string(),
                ))
            }
            (false, None) => {
                tracing::info!("Will create a new schema with description {}.", request.description);
                None
            }
            (true, Some(summary)) => {
                check_resumable(registry, &species.id, &summary).await?;
                Some(SchemaRef {
                    species_id: species.id.clone(),
                    schema_id: summary.id,
                    uri: summary.uri,
                })
            }
        };

        // Remote inventory must be consistent before any local work
        let remote: Vec<RemoteLocus> = match &resumed_schema {
            Some(schema_ref) => {
                tracing::info!("Determining loci absent from NS schema...");
                let remote =
                    fetch_remote_inventory(registry, schema_ref, &schema.loci, request.threads).await?;
                check_integrity(&schema.loci, &remote)?;
                remote
            }
            None => Vec::new(),
        };

        let qc = run_quality_control(
            Arc::new(schema.loci.clone()),
            QcSettings {
                translation_table: schema.parameters.translation_table,
                minimum_length: schema.parameters.minimum_locus_length,
                size_threshold: schema.parameters.size_threshold,
                cpu_cores: request.cpu_cores,
                work_dir: Some(work_dir.to_path_buf()),
            },
        )
        .await?;

        let delta: ReconciliationDelta = match &resumed_schema {
            Some(_) => reconcile_resume(&schema.loci, &qc, &remote)?,
            None => reconcile_fresh(&qc),
        };

        let qc_by_locus: HashMap<&str, &LocusQc> = qc.iter().map(|q| (q.locus.as_str(), q)).collect();

        // Only loci about to be created need an annotation
        let annotation_work: Vec<(String, Vec<String>)> = delta
            .missing
            .iter()
            .filter_map(|locus| qc_by_locus.get(locus.as_str()))
            .map(|q| build_queries(q).map(|queries| (q.locus.clone(), queries)))
            .collect::<std::io::Result<_>>()?;
        let annotations: HashMap<String, Annotation> =
            resolve_all(self.knowledge_base.clone(), annotation_work, request.threads)
                .await
                .into_iter()
                .map(|a| (a.locus, a.annotation))
                .collect();

        let schema_ref = match resumed_schema {
            Some(schema_ref) => schema_ref,
            None => {
                tracing::info!("Creating new schema...");
                let body = schema.parameters.to_request_body(&request.description);
                let uri = registry
                    .create_schema(&species.id, &body)
                    .await
                    .map_err(schema_creation_error)?;
                tracing::info!(run_id = %self.run_id, "Created schema {}", uri);

                SchemaRef {
                    species_id: species.id.clone(),
                    schema_id: last_segment(&uri).to_string(),
                    uri,
                }
            }
        };

        let work: Vec<LocusWork> = delta
            .targets()
            .into_iter()
            .filter_map(|(locus, target)| {
                let qc = qc_by_locus.get(locus.as_str())?;
                let annotation = match target {
                    UploadTarget::FreshLocus => annotations
                        .get(&locus)
                        .cloned()
                        .unwrap_or(Annotation::NotFound),
                    UploadTarget::ResumedLocus { .. } => Annotation::NotFound,
                };
                Some(LocusWork {
                    alleles: unique_valid_sequences(qc),
                    locus,
                    target,
                    annotation,
                })
            })
            .collect();

        let orchestrator = UploadOrchestrator::new(
            self.registry.clone(),
            UploadContext {
                schema: schema_ref.clone(),
                schema_description: request.description.clone(),
                species_name: species.name.clone(),
                user_id: user.id.clone(),
                prefix: request.prefix.clone(),
                work_dir: Some(work_dir.to_path_buf()),
            },
        );
        let outcome = orchestrator.run(work).await;

        tracing::info!("Uploading training file...");
        let training_file = match orchestrator
            .upload_training_file(&schema.parameters.training_file)
            .await
        {
            Ok(message) => {
                tracing::info!("{}", message);
                Ok(message)
            }
            Err(e) => {
                tracing::warn!(status = e.status_code(), "Could not upload training file: {}", e);
                Err(e.to_string())
            }
        };

        let report = LoadReport {
            run_id: self.run_id,
            schema_uri: schema_ref.uri,
            species_name: species.name,
            description: request.description.clone(),
            resumed: request.continue_up,
            statistics: outcome.statistics,
            training_file,
            elapsed: start.elapsed(),
        };

        tracing::info!(
            run_id = %self.run_id,
            completed = report.statistics.completed(),
            failed = report.statistics.failures.len(),
            "Elapsed time: {}",
            format_elapsed(report.elapsed)
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0m0s");
        assert_eq!(format_elapsed(Duration::from_secs(59)), "0m59s");
        assert_eq!(format_elapsed(Duration::from_millis(125_900)), "2m5s");
    }

    #[test]
    fn test_schema_creation_error_mapping() {
        let conflict = schema_creation_error(RegistryError::Status {
            code: 409,
            reason: "duplicate".into(),
        });
        assert!(matches!(conflict, LoadError::Conflict(ref r) if r == "duplicate"));

        let denied = schema_creation_error(RegistryError::Status {
            code: 403,
            reason: "no permission".into(),
        });
        assert!(matches!(denied, LoadError::Authorization(_)));

        let other = schema_creation_error(RegistryError::Status {
            code: 500,
            reason: "Could not insert schema.".into(),
        });
        assert!(matches!(other, LoadError::Registry(_)));
    }
}
