//! Nomenclature registry (NS) client
//!
//! [`RegistryApi`] is the registry surface the load workflow consumes;
//! [`NsClient`] implements it over HTTP with a login token and a fixed
//! per-request timeout. Non-2xx responses become [`RegistryError::Status`]
//! carrying the status code and a readable reason for the operation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Registry request errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registry answered with a non-success status
    #[error("{code}: {reason}")]
    Status { code: u16, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl RegistryError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RegistryError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Registry operations, used to word failure reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOperation {
    Login,
    CurrentUser,
    Species,
    ListSchemas,
    GetSchema,
    SchemaAdministrated,
    CreateSchema,
    ListSchemaLoci,
    LocusSequences,
    CreateLocus,
    LinkLocusToSpecies,
    LinkLocusToSchema,
    UploadAlleles,
    UploadLengths,
    UploadTrainingFile,
}

impl RegistryOperation {
    /// Readable reason for a failed request
    pub fn failure_reason(self, code: u16) -> String {
        let reason = match (self, code) {
            (RegistryOperation::Login, _) => "Invalid credentials.",
            (RegistryOperation::CreateSchema, 403) => "No permission to load schema.",
            (RegistryOperation::CreateSchema, 404) => {
                "Cannot upload a schema for a species that is not in NS."
            }
            (RegistryOperation::CreateSchema, 409) => {
                "Cannot upload a schema with the same description as a schema that is in the NS."
            }
            (RegistryOperation::CreateSchema, _) => "Could not insert schema.",
            (RegistryOperation::CreateLocus, 409) => "Locus already exists on NS.",
            (RegistryOperation::CreateLocus, 404) => "Species not found.",
            (RegistryOperation::CreateLocus, 403) => "Unauthorized. No permission to add new locus.",
            (RegistryOperation::CreateLocus, 400) => "Please provide a valid locus prefix.",
            (RegistryOperation::CreateLocus, _) => "Could not create locus.",
            (RegistryOperation::LinkLocusToSpecies, _) => "Failed to link locus to species.",
            (RegistryOperation::LinkLocusToSchema, _) => "Failed to link locus to schema.",
            (_, 400) => "Malformed request.",
            (_, 401) | (_, 403) => "Permission denied.",
            (_, 404) => "Resource not found.",
            (_, 409) => "Duplicate resource.",
            _ => "Request failed.",
        };
        reason.to_string()
    }

    fn error(self, code: u16) -> RegistryError {
        RegistryError::Status {
            code,
            reason: self.failure_reason(code),
        }
    }
}

/// `{"value": ...}` wrapper used by every registry list response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Binding {
    #[serde(default)]
    pub value: String,
}

/// Authenticated user
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl CurrentUser {
    /// Admins and contributors may upload schemas
    pub fn can_upload(&self) -> bool {
        self.roles.iter().any(|r| r == "Admin" || r == "Contributor")
    }
}

fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected user id {}", other))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Species {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct SpeciesEntry {
    #[serde(default)]
    species: Binding,
    name: Binding,
}

/// Schema as listed for a species
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSummary {
    pub id: String,
    pub uri: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct SchemaEntry {
    schemas: Binding,
    name: Binding,
}

/// Registry schema lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// Still accepting loci
    Open,
    Closed,
}

/// Marker `dateEntered` value of a schema that is still being uploaded
pub const OPEN_SCHEMA_MARKER: &str = "singularity";

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaInfo {
    #[serde(rename = "dateEntered")]
    pub date_entered: Binding,
}

impl SchemaInfo {
    pub fn state(&self) -> SchemaState {
        if self.date_entered.value == OPEN_SCHEMA_MARKER {
            SchemaState::Open
        } else {
            SchemaState::Closed
        }
    }
}

/// Everything upload requests need to address a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRef {
    pub species_id: String,
    pub schema_id: String,
    pub uri: String,
}

/// Locus entry of a schema's locus list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocusEntry {
    pub original_name: String,
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct LociList {
    #[serde(rename = "Loci", default)]
    loci: Vec<LocusEntry>,
}

#[derive(Debug, Deserialize)]
struct LocusEntry {
    original_name: Binding,
    locus: Binding,
    #[serde(default)]
    name: Binding,
}

#[derive(Debug, Deserialize)]
struct LocusFasta {
    #[serde(rename = "Fasta", default)]
    fasta: Vec<FastaEntry>,
}

#[derive(Debug, Deserialize)]
struct FastaEntry {
    #[serde(rename = "nucSeq")]
    nuc_seq: Binding,
}

/// Locus creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLocus {
    pub prefix: String,
    #[serde(rename = "UniprotName")]
    pub uniprot_name: String,
    #[serde(rename = "UniprotLabel")]
    pub uniprot_label: String,
    #[serde(rename = "UniprotURI")]
    pub uniprot_uri: String,
    pub locus_ori_name: String,
}

/// File upload body: name plus Latin-1 mapped bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePayload {
    pub filename: String,
    pub content: String,
}

/// Registry surface consumed by the load workflow
#[async_trait]
pub trait RegistryApi: Send + Sync {
    async fn current_user(&self) -> Result<CurrentUser, RegistryError>;

    /// `None` when the registry has no species with this id
    async fn species_by_id(&self, species_id: &str) -> Result<Option<Species>, RegistryError>;

    async fn species_list(&self) -> Result<Vec<Species>, RegistryError>;

    /// Schemas of a species; empty when the species has none yet
    async fn list_schemas(&self, species_id: &str) -> Result<Vec<SchemaSummary>, RegistryError>;

    async fn get_schema(&self, species_id: &str, schema_id: &str) -> Result<SchemaInfo, RegistryError>;

    /// Whether the current user started this schema's upload
    async fn schema_administrated(&self, species_id: &str, schema_id: &str) -> Result<bool, RegistryError>;

    /// Returns the new schema's URI
    async fn create_schema(&self, species_id: &str, body: &Value) -> Result<String, RegistryError>;

    async fn list_schema_loci(&self, schema: &SchemaRef) -> Result<Vec<RemoteLocusEntry>, RegistryError>;

    async fn locus_sequences(&self, locus_id: u64) -> Result<Vec<String>, RegistryError>;

    /// Returns the new locus URI
    async fn create_locus(&self, locus: &NewLocus) -> Result<String, RegistryError>;

    async fn link_locus_to_species(&self, species_id: &str, locus_id: u64) -> Result<(), RegistryError>;

    async fn link_locus_to_schema(&self, schema: &SchemaRef, locus_id: u64) -> Result<(), RegistryError>;

    async fn upload_alleles(
        &self,
        schema: &SchemaRef,
        locus_id: u64,
        payload: &FilePayload,
    ) -> Result<(), RegistryError>;

    async fn upload_lengths(&self, schema: &SchemaRef, locus_id: u64, lengths: &Value) -> Result<(), RegistryError>;

    /// Returns the registry's message
    async fn upload_training_file(&self, schema: &SchemaRef, payload: &FilePayload) -> Result<String, RegistryError>;
}

/// HTTP registry client
pub struct NsClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    user_id: OnceLock<String>,
}

impl NsClient {
    /// Log in and build an authenticated client
    pub async fn login(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let url = format!("{}/auth/login", base_url);

        let response = client
            .post(&url)
            .json(&json!({ "email": username, "password": password }))
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryOperation::Login.error(status.as_u16()));
        }

        #[derive(Deserialize)]
        struct Token {
            access_token: String,
        }

        let token: Token = response
            .json()
            .await
            .map_err(|e| RegistryError::Parse(e.to_string()))?;

        tracing::info!(url = %base_url, "Logged in to registry");

        Ok(Self {
            client,
            base_url,
            token: token.access_token,
            user_id: OnceLock::new(),
        })
    }

    fn url(&self, segments: &[&str]) -> String {
        format!("{}/{}", self.base_url, segments.join("/"))
    }

    async fn get(&self, op: RegistryOperation, url: &str) -> Result<reqwest::Response, RegistryError> {
        tracing::debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;
        check(op, response)
    }

    async fn post<B: Serialize + ?Sized + Sync>(
        &self,
        op: RegistryOperation,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, RegistryError> {
        tracing::debug!(url = %url, "POST");
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body);

        if let Some(user_id) = self.user_id.get() {
            request = request.header("user_id", user_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;
        check(op, response)
    }

    async fn get_json<T: DeserializeOwned>(&self, op: RegistryOperation, url: &str) -> Result<T, RegistryError> {
        parse(self.get(op, url).await?).await
    }
}

fn check(op: RegistryOperation, response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(op.error(status.as_u16()))
    }
}

async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RegistryError> {
    response
        .json::<T>()
        .await
        .map_err(|e| RegistryError::Parse(e.to_string()))
}

/// Last path segment of a registry URI
pub fn last_segment(uri: &str) -> &str {
    uri.trim_end_matches('/').rsplit('/').next().unwrap_or(uri)
}

#[async_trait]
impl RegistryApi for NsClient {
    async fn current_user(&self) -> Result<CurrentUser, RegistryError> {
        let url = self.url(&["user", "current_user"]);
        let user: CurrentUser = self.get_json(RegistryOperation::CurrentUser, &url).await?;
        let _ = self.user_id.set(user.id.clone());
        Ok(user)
    }

    async fn species_by_id(&self, species_id: &str) -> Result<Option<Species>, RegistryError> {
        let url = self.url(&["species", species_id]);
        let entries = match self.get_json::<Vec<SpeciesEntry>>(RegistryOperation::Species, &url).await {
            Ok(entries) => entries,
            Err(RegistryError::Status { code: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(entries.into_iter().next().map(|entry| Species {
            id: species_id.to_string(),
            name: entry.name.value,
        }))
    }

    async fn species_list(&self) -> Result<Vec<Species>, RegistryError> {
        let url = self.url(&["species", "list"]);
        let entries: Vec<SpeciesEntry> = self.get_json(RegistryOperation::Species, &url).await?;

        Ok(entries
            .into_iter()
            .map(|entry| Species {
                id: last_segment(&entry.species.value).to_string(),
                name: entry.name.value,
            })
            .collect())
    }

    async fn list_schemas(&self, species_id: &str) -> Result<Vec<SchemaSummary>, RegistryError> {
        let url = self.url(&["species", species_id, "schemas"]);
        let entries = match self.get_json::<Vec<SchemaEntry>>(RegistryOperation::ListSchemas, &url).await {
            Ok(entries) => entries,
            Err(RegistryError::Status { code: 404, .. }) => {
                tracing::info!("Species still has no schemas.");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        Ok(entries
            .into_iter()
            .map(|entry| SchemaSummary {
                id: last_segment(&entry.schemas.value).to_string(),
                uri: entry.schemas.value,
                description: entry.name.value,
            })
            .collect())
    }

    async fn get_schema(&self, species_id: &str, schema_id: &str) -> Result<SchemaInfo, RegistryError> {
        let url = self.url(&["species", species_id, "schemas", schema_id]);
        let entries: Vec<SchemaInfo> = self.get_json(RegistryOperation::GetSchema, &url).await?;
        entries
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::Parse("empty schema description".to_string()))
    }

    async fn schema_administrated(&self, species_id: &str, schema_id: &str) -> Result<bool, RegistryError> {
        let url = self.url(&["species", species_id, "schemas", schema_id, "administrated"]);
        self.get_json(RegistryOperation::SchemaAdministrated, &url).await
    }

    async fn create_schema(&self, species_id: &str, body: &Value) -> Result<String, RegistryError> {
        #[derive(Deserialize)]
        struct Created {
            url: String,
        }

        let url = self.url(&["species", species_id, "schemas"]);
        let created: Created = parse(self.post(RegistryOperation::CreateSchema, &url, body).await?).await?;
        Ok(created.url)
    }

    async fn list_schema_loci(&self, schema: &SchemaRef) -> Result<Vec<RemoteLocusEntry>, RegistryError> {
        let url = self.url(&["species", &schema.species_id, "schemas", &schema.schema_id, "loci"]);
        let list: LociList = self.get_json(RegistryOperation::ListSchemaLoci, &url).await?;

        Ok(list
            .loci
            .into_iter()
            .map(|entry| RemoteLocusEntry {
                original_name: entry.original_name.value,
                uri: entry.locus.value,
                name: entry.name.value,
            })
            .collect())
    }

    async fn locus_sequences(&self, locus_id: u64) -> Result<Vec<String>, RegistryError> {
        let url = self.url(&["loci", &locus_id.to_string(), "fasta"]);
        let fasta: LocusFasta = self.get_json(RegistryOperation::LocusSequences, &url).await?;
        Ok(fasta.fasta.into_iter().map(|entry| entry.nuc_seq.value).collect())
    }

    async fn create_locus(&self, locus: &NewLocus) -> Result<String, RegistryError> {
        #[derive(Deserialize)]
        struct Created {
            uri: String,
        }

        let url = self.url(&["loci", "list"]);
        let created: Created = parse(self.post(RegistryOperation::CreateLocus, &url, locus).await?).await?;
        Ok(created.uri)
    }

    async fn link_locus_to_species(&self, species_id: &str, locus_id: u64) -> Result<(), RegistryError> {
        let url = self.url(&["species", species_id, "loci"]);
        let body = json!({ "locus_id": locus_id.to_string() });
        self.post(RegistryOperation::LinkLocusToSpecies, &url, &body).await?;
        Ok(())
    }

    async fn link_locus_to_schema(&self, schema: &SchemaRef, locus_id: u64) -> Result<(), RegistryError> {
        let url = format!("{}/loci", schema.uri.trim_end_matches('/'));
        let body = json!({ "loci_id": locus_id.to_string() });
        self.post(RegistryOperation::LinkLocusToSchema, &url, &body).await?;
        Ok(())
    }

    async fn upload_alleles(
        &self,
        schema: &SchemaRef,
        locus_id: u64,
        payload: &FilePayload,
    ) -> Result<(), RegistryError> {
        let locus = locus_id.to_string();
        let url = self.url(&["species", &schema.species_id, "schemas", &schema.schema_id, "loci", &locus, "data"]);
        self.post(RegistryOperation::UploadAlleles, &url, payload).await?;
        Ok(())
    }

    async fn upload_lengths(&self, schema: &SchemaRef, locus_id: u64, lengths: &Value) -> Result<(), RegistryError> {
        let locus = locus_id.to_string();
        let url = self.url(&["species", &schema.species_id, "schemas", &schema.schema_id, "loci", &locus, "lengths"]);
        self.post(RegistryOperation::UploadLengths, &url, lengths).await?;
        Ok(())
    }

    async fn upload_training_file(&self, schema: &SchemaRef, payload: &FilePayload) -> Result<String, RegistryError> {
        let url = self.url(&["species", &schema.species_id, "schemas", &schema.schema_id, "ptf"]);
        let response: Value = parse(self.post(RegistryOperation::UploadTrainingFile, &url, payload).await?).await?;

        let message = match &response {
            Value::Object(map) => map.values().next().and_then(Value::as_str).map(str::to_string),
            Value::String(s) => Some(s.clone()),
            _ => None,
        };
        Ok(message.unwrap_or_else(|| "Training file uploaded.".to_string()))
    }
}
