//! Per-locus upload state machine
//!
//! New → Created → LinkedToSpecies → LinkedToSchema → AllelesSent → LengthsSent
//!
//! States only advance, one step at a time, and only after the matching
//! registry request succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upload progress of one locus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UploadState {
    New,
    /// Locus registered, id and URI known
    Created,
    LinkedToSpecies,
    LinkedToSchema,
    AllelesSent,
    LengthsSent,
}

impl UploadState {
    pub fn next(self) -> Option<UploadState> {
        match self {
            UploadState::New => Some(UploadState::Created),
            UploadState::Created => Some(UploadState::LinkedToSpecies),
            UploadState::LinkedToSpecies => Some(UploadState::LinkedToSchema),
            UploadState::LinkedToSchema => Some(UploadState::AllelesSent),
            UploadState::AllelesSent => Some(UploadState::LengthsSent),
            UploadState::LengthsSent => None,
        }
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub locus: String,
    pub old_state: UploadState,
    pub new_state: UploadState,
    pub transitioned_at: DateTime<Utc>,
}

/// Upload progress of one locus
#[derive(Debug, Clone)]
pub struct LocusUpload {
    /// Locus file name
    pub locus: String,
    pub state: UploadState,
    pub locus_uri: Option<String>,
    pub locus_id: Option<u64>,
    /// Reason the locus stopped before `LengthsSent`
    pub failure: Option<String>,
}

impl LocusUpload {
    /// Locus that must be created in the registry
    pub fn fresh(locus: impl Into<String>) -> Self {
        Self {
            locus: locus.into(),
            state: UploadState::New,
            locus_uri: None,
            locus_id: None,
            failure: None,
        }
    }

    /// Locus already linked to the schema; creation and linking are skipped
    pub fn resumed(locus: impl Into<String>, uri: impl Into<String>, id: u64) -> Self {
        Self {
            locus: locus.into(),
            state: UploadState::LinkedToSchema,
            locus_uri: Some(uri.into()),
            locus_id: Some(id),
            failure: None,
        }
    }

    /// Record the registry identity returned by locus creation
    pub fn created(&mut self, uri: String, id: u64) -> Option<StateTransition> {
        self.locus_uri = Some(uri);
        self.locus_id = Some(id);
        self.advance()
    }

    /// Advance to the next state
    pub fn advance(&mut self) -> Option<StateTransition> {
        let new_state = self.state.next()?;
        let transition = StateTransition {
            locus: self.locus.clone(),
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        Some(transition)
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
    }

    pub fn is_complete(&self) -> bool {
        self.state == UploadState::LengthsSent
    }

    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }
}
