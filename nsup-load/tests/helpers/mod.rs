//! Test Helper Utilities
//!
//! Shared utilities for testing nsup-load

#![allow(dead_code)]

pub mod mock_registry;
pub mod schema_fixture;

pub use mock_registry::{MockRegistry, RegistryWrite, SPECIES_ID, SPECIES_NAME};
pub use schema_fixture::*;

use async_trait::async_trait;
use nsup_load::services::load_workflow::LoadRequest;
use nsup_load::services::sparql_client::{KnowledgeBase, SparqlError, SparqlResults};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Knowledge base answering every query with the same name
pub struct MockKnowledgeBase {
    name: Option<String>,
    calls: AtomicUsize,
}

impl MockKnowledgeBase {
    pub fn answering(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            name: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeBase for MockKnowledgeBase {
    async fn query(&self, _query: &str) -> Result<SparqlResults, SparqlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.name {
            Some(name) => Ok(SparqlResults::from_rows(&[&[
                ("seq", "http://purl.uniprot.org/uniprot/P0A7V0"),
                ("fname", name.as_str()),
                ("label", name.as_str()),
            ]])),
            None => Err(SparqlError::Network("connection refused".to_string())),
        }
    }
}

/// Request against the mock registry's species
pub fn load_request(schema_dir: &Path, continue_up: bool) -> LoadRequest {
    LoadRequest {
        schema_dir: schema_dir.to_path_buf(),
        species: SPECIES_ID.to_string(),
        description: "wgMLST test schema".to_string(),
        prefix: "SPN".to_string(),
        cpu_cores: 2,
        threads: 2,
        continue_up,
        keep_intermediate: false,
    }
}
