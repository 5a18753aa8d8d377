//! Upload run counters
//!
//! Updated at a single aggregation point, after each successful state
//! transition or failed step.

use crate::models::{StateTransition, UploadState};
use serde::Serialize;

/// A locus that stopped before `LengthsSent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocusFailure {
    pub locus: String,
    /// Last state reached
    pub state: UploadState,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadStatistics {
    /// Loci in the batch
    pub total: usize,
    /// Loci that had to be created
    pub fresh_total: usize,
    pub created: usize,
    pub linked_to_species: usize,
    pub linked_to_schema: usize,
    pub alleles_sent: usize,
    pub lengths_sent: usize,
    pub failures: Vec<LocusFailure>,
}

impl UploadStatistics {
    pub fn new(total: usize, fresh_total: usize) -> Self {
        Self {
            total,
            fresh_total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, transition: &StateTransition) {
        match transition.new_state {
            UploadState::New => {}
            UploadState::Created => self.created += 1,
            UploadState::LinkedToSpecies => self.linked_to_species += 1,
            UploadState::LinkedToSchema => self.linked_to_schema += 1,
            UploadState::AllelesSent => self.alleles_sent += 1,
            UploadState::LengthsSent => self.lengths_sent += 1,
        }
    }

    pub fn record_failure(&mut self, locus: &str, state: UploadState, reason: String) {
        self.failures.push(LocusFailure {
            locus: locus.to_string(),
            state,
            reason,
        });
    }

    pub fn completed(&self) -> usize {
        self.lengths_sent
    }

    pub fn created_display(&self) -> String {
        format!("Inserted {}/{} new loci.", self.created, self.fresh_total)
    }

    pub fn species_display(&self, species_name: &str) -> String {
        format!(
            "Linked {}/{} new loci to species \"{}\"",
            self.linked_to_species, self.fresh_total, species_name
        )
    }

    pub fn schema_display(&self, schema_description: &str) -> String {
        format!(
            "Linked {}/{} new loci to schema \"{}\"",
            self.linked_to_schema, self.fresh_total, schema_description
        )
    }

    pub fn transmissions_display(&self) -> String {
        format!(
            "Sent alleles for {}/{} loci (new and resumed), lengths for {}/{} loci (new and resumed)",
            self.alleles_sent, self.total, self.lengths_sent, self.total
        )
    }
}
