//! In-memory registry
//!
//! Records every write, assigns sequential locus ids and fails selected
//! operations on request.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use nsup_load::services::ns_client::{
    Binding, CurrentUser, FilePayload, NewLocus, RegistryApi, RegistryError, RegistryOperation,
    RemoteLocusEntry, SchemaInfo, SchemaRef, SchemaSummary, Species, OPEN_SCHEMA_MARKER,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Mutex;

pub const BASE: &str = "http://ns.test/api";
pub const SPECIES_ID: &str = "1";
pub const SPECIES_NAME: &str = "Streptococcus pneumoniae";

/// Write request received by the registry
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryWrite {
    CreateSchema { description: String },
    CreateLocus { locus_ori_name: String, uniprot_name: String },
    LinkToSpecies { locus_id: u64 },
    LinkToSchema { locus_id: u64 },
    Alleles { locus_id: u64, sequences: Vec<String> },
    Lengths { locus_id: u64, body: Value },
    TrainingFile { filename: String },
}

#[derive(Debug, Clone)]
struct StoredLocus {
    original_name: String,
    sequences: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    schemas: Vec<SchemaSummary>,
    loci: BTreeMap<u64, StoredLocus>,
    /// Locus ids linked to the schema
    schema_loci: Vec<u64>,
    next_locus_id: u64,
    writes: Vec<RegistryWrite>,
    failures: Vec<(RegistryOperation, Option<u64>, u16)>,
}

pub struct MockRegistry {
    pub roles: Vec<String>,
    pub schema_open: bool,
    pub administrated: bool,
    state: Mutex<State>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self {
            roles: vec!["Contributor".to_string()],
            schema_open: true,
            administrated: true,
            state: Mutex::new(State {
                next_locus_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Registry that already holds a partially uploaded schema
    pub fn with_schema(description: &str, loci: &[(&str, &[&str])]) -> Self {
        let registry = Self::new();
        {
            let mut state = registry.state.lock().unwrap();
            state.schemas.push(SchemaSummary {
                id: "1".to_string(),
                uri: format!("{}/species/{}/schemas/1", BASE, SPECIES_ID),
                description: description.to_string(),
            });

            for (name, sequences) in loci {
                let id = state.next_locus_id;
                state.next_locus_id += 1;
                state.loci.insert(
                    id,
                    StoredLocus {
                        original_name: name.to_string(),
                        sequences: sequences.iter().map(|s| s.to_string()).collect(),
                    },
                );
                state.schema_loci.push(id);
            }
        }
        registry
    }

    /// Fail `operation` with `code`, for one locus or for all
    pub fn fail_on(&self, operation: RegistryOperation, locus_id: Option<u64>, code: u16) {
        self.state.lock().unwrap().failures.push((operation, locus_id, code));
    }

    pub fn writes(&self) -> Vec<RegistryWrite> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn locus_id_of(&self, original_name: &str) -> Option<u64> {
        let state = self.state.lock().unwrap();
        state
            .loci
            .iter()
            .find(|(_, l)| l.original_name == original_name)
            .map(|(id, _)| *id)
    }

    /// Sequences the registry holds for a locus
    pub fn sequences_of(&self, original_name: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .loci
            .values()
            .find(|l| l.original_name == original_name)
            .map(|l| l.sequences.clone())
            .unwrap_or_default()
    }

    fn check(&self, operation: RegistryOperation, locus_id: Option<u64>) -> Result<(), RegistryError> {
        let state = self.state.lock().unwrap();
        let failure = state
            .failures
            .iter()
            .find(|(op, id, _)| *op == operation && (id.is_none() || *id == locus_id));

        match failure {
            Some((op, _, code)) => Err(RegistryError::Status {
                code: *code,
                reason: op.failure_reason(*code),
            }),
            None => Ok(()),
        }
    }

    fn record(&self, write: RegistryWrite) {
        self.state.lock().unwrap().writes.push(write);
    }
}

fn locus_uri(id: u64) -> String {
    format!("{}/loci/{}", BASE, id)
}

/// Undo the Latin-1 mapping and gzip of an allele payload
pub fn decode_alleles(payload: &FilePayload) -> Vec<String> {
    let bytes: Vec<u8> = payload.content.chars().map(|c| c as u32 as u8).collect();
    let mut json = String::new();
    GzDecoder::new(bytes.as_slice()).read_to_string(&mut json).unwrap();
    let document: Value = serde_json::from_str(&json).unwrap();

    document["alleles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["sequence"].as_str().unwrap().to_string())
        .collect()
}

#[async_trait]
impl RegistryApi for MockRegistry {
    async fn current_user(&self) -> Result<CurrentUser, RegistryError> {
        self.check(RegistryOperation::CurrentUser, None)?;
        Ok(CurrentUser {
            id: "7".to_string(),
            roles: self.roles.clone(),
        })
    }

    async fn species_by_id(&self, species_id: &str) -> Result<Option<Species>, RegistryError> {
        Ok((species_id == SPECIES_ID).then(|| Species {
            id: SPECIES_ID.to_string(),
            name: SPECIES_NAME.to_string(),
        }))
    }

    async fn species_list(&self) -> Result<Vec<Species>, RegistryError> {
        Ok(vec![Species {
            id: SPECIES_ID.to_string(),
            name: SPECIES_NAME.to_string(),
        }])
    }

    async fn list_schemas(&self, _species_id: &str) -> Result<Vec<SchemaSummary>, RegistryError> {
        Ok(self.state.lock().unwrap().schemas.clone())
    }

    async fn get_schema(&self, _species_id: &str, _schema_id: &str) -> Result<SchemaInfo, RegistryError> {
        let value = if self.schema_open {
            OPEN_SCHEMA_MARKER.to_string()
        } else {
            "2020-03-10T15:43:02".to_string()
        };
        Ok(SchemaInfo {
            date_entered: Binding { value },
        })
    }

    async fn schema_administrated(&self, _species_id: &str, _schema_id: &str) -> Result<bool, RegistryError> {
        Ok(self.administrated)
    }

    async fn create_schema(&self, species_id: &str, body: &Value) -> Result<String, RegistryError> {
        self.check(RegistryOperation::CreateSchema, None)?;
        let description = body["SchemaDescription"].as_str().unwrap_or_default().to_string();

        let mut state = self.state.lock().unwrap();
        let id = state.schemas.len() + 1;
        let uri = format!("{}/species/{}/schemas/{}", BASE, species_id, id);
        state.schemas.push(SchemaSummary {
            id: id.to_string(),
            uri: uri.clone(),
            description: description.clone(),
        });
        state.writes.push(RegistryWrite::CreateSchema { description });
        Ok(uri)
    }

    async fn list_schema_loci(&self, _schema: &SchemaRef) -> Result<Vec<RemoteLocusEntry>, RegistryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .schema_loci
            .iter()
            .filter_map(|id| state.loci.get(id).map(|l| (id, l)))
            .map(|(id, l)| RemoteLocusEntry {
                original_name: l.original_name.clone(),
                uri: locus_uri(*id),
                name: format!("SPN-{:06}", id),
            })
            .collect())
    }

    async fn locus_sequences(&self, locus_id: u64) -> Result<Vec<String>, RegistryError> {
        self.check(RegistryOperation::LocusSequences, Some(locus_id))?;
        let state = self.state.lock().unwrap();
        Ok(state
            .loci
            .get(&locus_id)
            .map(|l| l.sequences.clone())
            .unwrap_or_default())
    }

    async fn create_locus(&self, locus: &NewLocus) -> Result<String, RegistryError> {
        self.check(RegistryOperation::CreateLocus, None)?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_locus_id;
        state.next_locus_id += 1;
        state.loci.insert(
            id,
            StoredLocus {
                original_name: locus.locus_ori_name.clone(),
                sequences: Vec::new(),
            },
        );
        state.writes.push(RegistryWrite::CreateLocus {
            locus_ori_name: locus.locus_ori_name.clone(),
            uniprot_name: locus.uniprot_name.clone(),
        });
        Ok(locus_uri(id))
    }

    async fn link_locus_to_species(&self, _species_id: &str, locus_id: u64) -> Result<(), RegistryError> {
        self.check(RegistryOperation::LinkLocusToSpecies, Some(locus_id))?;
        self.record(RegistryWrite::LinkToSpecies { locus_id });
        Ok(())
    }

    async fn link_locus_to_schema(&self, _schema: &SchemaRef, locus_id: u64) -> Result<(), RegistryError> {
        self.check(RegistryOperation::LinkLocusToSchema, Some(locus_id))?;
        let mut state = self.state.lock().unwrap();
        state.schema_loci.push(locus_id);
        state.writes.push(RegistryWrite::LinkToSchema { locus_id });
        Ok(())
    }

    async fn upload_alleles(
        &self,
        _schema: &SchemaRef,
        locus_id: u64,
        payload: &FilePayload,
    ) -> Result<(), RegistryError> {
        self.check(RegistryOperation::UploadAlleles, Some(locus_id))?;
        let sequences = decode_alleles(payload);

        let mut state = self.state.lock().unwrap();
        if let Some(locus) = state.loci.get_mut(&locus_id) {
            locus.sequences.extend(sequences.iter().cloned());
        }
        state.writes.push(RegistryWrite::Alleles { locus_id, sequences });
        Ok(())
    }

    async fn upload_lengths(&self, _schema: &SchemaRef, locus_id: u64, lengths: &Value) -> Result<(), RegistryError> {
        self.check(RegistryOperation::UploadLengths, Some(locus_id))?;
        self.record(RegistryWrite::Lengths {
            locus_id,
            body: lengths.clone(),
        });
        Ok(())
    }

    async fn upload_training_file(&self, _schema: &SchemaRef, payload: &FilePayload) -> Result<String, RegistryError> {
        self.check(RegistryOperation::UploadTrainingFile, None)?;
        self.record(RegistryWrite::TrainingFile {
            filename: payload.filename.clone(),
        });
        Ok("Received training file.".to_string())
    }
}
