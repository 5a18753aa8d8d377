//! Upload orchestrator
//!
//! Drives every locus of a reconciliation delta through the upload state
//! machine, one locus at a time:
//!
//! New → Created → LinkedToSpecies → LinkedToSchema → AllelesSent → LengthsSent
//!
//! Resumed loci enter at `LinkedToSchema` and only send the alleles the
//! registry lacks. A failed request stops that locus only; the batch goes on.

use crate::models::{
    locus_id_from_uri, Annotation, LocusUpload, StateTransition, TrainingFile, UploadState,
    UploadTarget,
};
use crate::services::ns_client::{NewLocus, RegistryApi, RegistryError, SchemaRef};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub mod payloads;
pub mod statistics;

pub use statistics::{LocusFailure, UploadStatistics};

/// Why a locus stopped uploading
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to build payload: {0}")]
    Payload(#[from] std::io::Error),

    #[error("registry returned an unexpected locus URI: {0}")]
    LocusUri(String),
}

impl StepError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StepError::Registry(e) => e.status_code(),
            _ => None,
        }
    }
}

/// Schema-wide values shared by every locus upload
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub schema: SchemaRef,
    pub schema_description: String,
    pub species_name: String,
    pub user_id: String,
    pub prefix: String,
    /// Allele archives are also written here when set
    pub work_dir: Option<PathBuf>,
}

/// One locus to upload
#[derive(Debug, Clone)]
pub struct LocusWork {
    /// Locus file name
    pub locus: String,
    pub target: UploadTarget,
    pub annotation: Annotation,
    /// Valid allele sequences in file order, without duplicates
    pub alleles: Vec<String>,
}

impl LocusWork {
    /// Alleles this locus must transmit
    pub fn alleles_to_send(&self) -> Vec<&str> {
        match &self.target {
            UploadTarget::FreshLocus => self.alleles.iter().map(String::as_str).collect(),
            UploadTarget::ResumedLocus { missing_alleles, .. } => self
                .alleles
                .iter()
                .filter(|a| missing_alleles.contains(a.as_str()))
                .map(String::as_str)
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub uploads: Vec<LocusUpload>,
    pub statistics: UploadStatistics,
}

pub struct UploadOrchestrator {
    registry: Arc<dyn RegistryApi>,
    context: UploadContext,
}

impl UploadOrchestrator {
    pub fn new(registry: Arc<dyn RegistryApi>, context: UploadContext) -> Self {
        Self { registry, context }
    }

    /// Upload every locus in order
    pub async fn run(&self, work: Vec<LocusWork>) -> UploadOutcome {
        let fresh_total = work
            .iter()
            .filter(|w| w.target == UploadTarget::FreshLocus)
            .count();
        let mut statistics = UploadStatistics::new(work.len(), fresh_total);
        let mut uploads = Vec::with_capacity(work.len());

        tracing::info!(
            loci = work.len(),
            fresh = fresh_total,
            resumed = work.len() - fresh_total,
            "Uploading loci to schema {}",
            self.context.schema.uri
        );

        for (index, locus) in work.iter().enumerate() {
            let upload = self.upload_locus(locus, &mut statistics).await;
            tracing::debug!(
                locus = %upload.locus,
                state = ?upload.state,
                "Locus {}/{} done",
                index + 1,
                work.len()
            );
            uploads.push(upload);
        }

        tracing::info!("{}", statistics.created_display());
        tracing::info!("{}", statistics.species_display(&self.context.species_name));
        tracing::info!("{}", statistics.schema_display(&self.context.schema_description));
        tracing::info!("{}", statistics.transmissions_display());

        UploadOutcome { uploads, statistics }
    }

    async fn upload_locus(&self, work: &LocusWork, statistics: &mut UploadStatistics) -> LocusUpload {
        let mut upload = match &work.target {
            UploadTarget::FreshLocus => LocusUpload::fresh(&work.locus),
            UploadTarget::ResumedLocus { existing_uri, .. } => match locus_id_from_uri(existing_uri) {
                Some(id) => LocusUpload::resumed(&work.locus, existing_uri.clone(), id),
                None => {
                    let mut upload = LocusUpload::fresh(&work.locus);
                    let error = StepError::LocusUri(existing_uri.clone());
                    self.record_failure(&mut upload, &error, statistics);
                    return upload;
                }
            },
        };

        let alleles = work.alleles_to_send();

        while !upload.is_complete() {
            match self.step(&mut upload, work, &alleles).await {
                Ok(Some(transition)) => statistics.record(&transition),
                Ok(None) => break,
                Err(error) => {
                    self.record_failure(&mut upload, &error, statistics);
                    break;
                }
            }
        }

        upload
    }

    fn record_failure(&self, upload: &mut LocusUpload, error: &StepError, statistics: &mut UploadStatistics) {
        let reason = error.to_string();
        tracing::warn!(
            locus = %upload.locus,
            state = ?upload.state,
            status = error.status_code(),
            "Could not upload locus: {}",
            reason
        );
        statistics.record_failure(&upload.locus, upload.state, reason.clone());
        upload.fail(reason);
    }

    /// Perform the request that leaves the current state
    async fn step(
        &self,
        upload: &mut LocusUpload,
        work: &LocusWork,
        alleles: &[&str],
    ) -> Result<Option<StateTransition>, StepError> {
        let schema = &self.context.schema;

        let locus_id = match upload.state {
            UploadState::New => return self.create_locus(upload, work).await,
            UploadState::LengthsSent => return Ok(None),
            _ => upload
                .locus_id
                .ok_or_else(|| StepError::LocusUri(upload.locus_uri.clone().unwrap_or_default()))?,
        };

        match upload.state {
            UploadState::Created => {
                self.registry
                    .link_locus_to_species(&schema.species_id, locus_id)
                    .await?;
            }
            UploadState::LinkedToSpecies => {
                self.registry.link_locus_to_schema(schema, locus_id).await?;
            }
            UploadState::LinkedToSchema => {
                let locus_uri = upload.locus_uri.as_deref().unwrap_or_default();
                let archive = payloads::allele_archive(
                    locus_uri,
                    &self.context.species_name,
                    &self.context.user_id,
                    alleles,
                )?;
                let filename = payloads::archive_file_name(schema, locus_id);
                if let Some(dir) = &self.context.work_dir {
                    tokio::fs::write(dir.join(&filename), &archive).await?;
                }

                let payload = payloads::allele_payload(filename, &archive);
                self.registry.upload_alleles(schema, locus_id, &payload).await?;
                tracing::debug!(locus = %work.locus, alleles = alleles.len(), "Sent alleles");
            }
            UploadState::AllelesSent => {
                let lengths = payloads::lengths_payload(locus_id, alleles);
                self.registry.upload_lengths(schema, locus_id, &lengths).await?;
            }
            UploadState::New | UploadState::LengthsSent => return Ok(None),
        }

        Ok(upload.advance())
    }

    async fn create_locus(
        &self,
        upload: &mut LocusUpload,
        work: &LocusWork,
    ) -> Result<Option<StateTransition>, StepError> {
        let new_locus = NewLocus {
            prefix: self.context.prefix.clone(),
            uniprot_name: work.annotation.name().to_string(),
            uniprot_label: work.annotation.label().to_string(),
            uniprot_uri: work.annotation.uri().to_string(),
            locus_ori_name: work.locus.clone(),
        };

        let uri = self.registry.create_locus(&new_locus).await?;
        let id = locus_id_from_uri(&uri).ok_or_else(|| StepError::LocusUri(uri.clone()))?;

        tracing::info!(
            locus = %work.locus,
            ns_id = %payloads::ns_locus_id(&self.context.prefix, id),
            "Created locus {}",
            uri
        );

        Ok(upload.created(uri, id))
    }

    /// Send the gene prediction training file; returns the registry message
    pub async fn upload_training_file(&self, training_file: &TrainingFile) -> Result<String, StepError> {
        let payload = payloads::training_file_payload(training_file)?;
        let message = self
            .registry
            .upload_training_file(&self.context.schema, &payload)
            .await?;
        Ok(message)
    }
}
