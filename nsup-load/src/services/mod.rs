//! Service modules for the schema load workflow
//!
//! Components in pipeline order, plus their registry, knowledge-base and
//! sequence-file collaborators.

pub mod annotation_resolver;
pub mod config_validator;
pub mod fasta_reader;
pub mod genetic_code;
pub mod load_workflow;
pub mod ns_client;
pub mod quality_control;
pub mod schema_reconciler;
pub mod schema_scanner;
pub mod sparql_client;
pub mod upload_orchestrator;

pub use fasta_reader::{FastaError, SequenceRecord};
pub use load_workflow::{prepare_local_schema, LoadReport, LoadRequest, LoadWorkflow, LocalSchema};
pub use ns_client::{NsClient, RegistryApi, RegistryError};
pub use schema_reconciler::ReconciliationDelta;
pub use sparql_client::{KnowledgeBase, SparqlError, UniprotClient};
pub use upload_orchestrator::{UploadOrchestrator, UploadStatistics};
