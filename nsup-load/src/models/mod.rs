//! Data models for nsup-load

pub mod locus;
pub mod schema_params;
pub mod upload_state;

pub use locus::{
    locus_id_from_uri, Annotation, InvalidAllele, LocalLocus, LocusAnnotation, LocusQc, RemoteLocus, UploadTarget,
    NOT_FOUND, NOT_FOUND_URI,
};
pub use schema_params::{Checked, ConfigSnapshot, SchemaParameters, TrainingFile};
pub use upload_state::{LocusUpload, StateTransition, UploadState};
