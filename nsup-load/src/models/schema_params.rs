//! Schema construction parameters
//!
//! The local `.schema_config` snapshot is read into [`ConfigSnapshot`];
//! validation turns it into [`SchemaParameters`], which is immutable for the
//! rest of the run.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Raw snapshot: parameter name to stored values (`None` for null)
pub type ConfigSnapshot = BTreeMap<String, Vec<Option<String>>>;

/// Outcome of validating one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Checked<T> {
    pub name: &'static str,
    /// Canonical value, `None` when invalid
    pub value: Option<T>,
    pub message: String,
}

impl<T> Checked<T> {
    pub fn valid(name: &'static str, value: T, message: impl Into<String>) -> Self {
        Self {
            name,
            value: Some(value),
            message: message.into(),
        }
    }

    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            value: None,
            message: message.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }
}

/// Gene-prediction training file bound to the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingFile {
    pub path: PathBuf,
    /// SHA-256 hex digest of the file content
    pub hash: String,
}

/// Validated schema parameter set
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaParameters {
    /// BLAST score ratio, in (0, 1)
    pub bsr: f64,
    pub minimum_locus_length: u32,
    pub translation_table: u8,
    /// `None` means the schema was built without a size threshold
    pub size_threshold: Option<f64>,
    pub chewbbaca_version: String,
    // clustering parameters, `None` for schemas built without clustering
    pub word_size: Option<u32>,
    pub cluster_sim: Option<f64>,
    pub representative_filter: Option<f64>,
    pub intra_cluster_filter: Option<f64>,
    pub training_file: TrainingFile,
}

impl SchemaParameters {
    /// Body for the schema creation request
    ///
    /// Every value is sent as a string; unset optional values are `"None"`.
    pub fn to_request_body(&self, description: &str) -> Value {
        json!({
            "bsr": format_float(self.bsr),
            "prodigal_training_file": self.training_file.hash,
            "translation_table": self.translation_table.to_string(),
            "minimum_locus_length": self.minimum_locus_length.to_string(),
            "chewBBACA_version": self.chewbbaca_version,
            "size_threshold": optional(self.size_threshold.map(format_float)),
            "word_size": optional(self.word_size.map(|w| w.to_string())),
            "cluster_sim": optional(self.cluster_sim.map(format_float)),
            "representative_filter": optional(self.representative_filter.map(format_float)),
            "intraCluster_filter": optional(self.intra_cluster_filter.map(format_float)),
            "name": description,
            "SchemaDescription": description,
        })
    }
}

/// Float rendering that always keeps a fractional part (`1` -> `1.0`)
pub fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn optional(value: Option<String>) -> String {
    value.unwrap_or_else(|| "None".to_string())
}

/// Convert a parsed snapshot document into [`ConfigSnapshot`]
///
/// Values may be arrays or scalars; numbers and booleans are stringified and
/// `null` becomes `None`. Nested objects are not part of the format.
pub fn snapshot_from_json(document: &Value) -> Result<ConfigSnapshot, String> {
    let object = document
        .as_object()
        .ok_or_else(|| "configuration snapshot must be a JSON object".to_string())?;

    let mut snapshot = ConfigSnapshot::new();
    for (name, raw) in object {
        let values = match raw {
            Value::Array(items) => items
                .iter()
                .map(|item| scalar(name, item))
                .collect::<Result<Vec<_>, _>>()?,
            other => vec![scalar(name, other)?],
        };
        snapshot.insert(name.clone(), values);
    }

    Ok(snapshot)
}

fn scalar(name: &str, value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        _ => Err(format!("unsupported value for parameter '{}'", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SchemaParameters {
        SchemaParameters {
            bsr: 0.6,
            minimum_locus_length: 201,
            translation_table: 11,
            size_threshold: Some(0.2),
            chewbbaca_version: "2.5.0".to_string(),
            word_size: None,
            cluster_sim: None,
            representative_filter: None,
            intra_cluster_filter: None,
            training_file: TrainingFile {
                path: PathBuf::from("/schema/model.trn"),
                hash: "abc123".to_string(),
            },
        }
    }

    #[test]
    fn test_request_body_uses_registry_keys() {
        let body = params().to_request_body("my schema");

        assert_eq!(body["bsr"], "0.6");
        assert_eq!(body["prodigal_training_file"], "abc123");
        assert_eq!(body["translation_table"], "11");
        assert_eq!(body["minimum_locus_length"], "201");
        assert_eq!(body["chewBBACA_version"], "2.5.0");
        assert_eq!(body["size_threshold"], "0.2");
        assert_eq!(body["word_size"], "None");
        assert_eq!(body["intraCluster_filter"], "None");
        assert_eq!(body["name"], "my schema");
    }

    #[test]
    fn test_format_float_keeps_fraction() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.25), "0.25");
    }

    #[test]
    fn test_snapshot_from_json_mixed_values() {
        let document = json!({
            "bsr": [0.6],
            "translation_table": ["11"],
            "size_threshold": [null],
            "chewBBACA_version": "2.5.0"
        });

        let snapshot = snapshot_from_json(&document).unwrap();

        assert_eq!(snapshot["bsr"], vec![Some("0.6".to_string())]);
        assert_eq!(snapshot["translation_table"], vec![Some("11".to_string())]);
        assert_eq!(snapshot["size_threshold"], vec![None]);
        assert_eq!(snapshot["chewBBACA_version"], vec![Some("2.5.0".to_string())]);
    }

    #[test]
    fn test_snapshot_must_be_object() {
        assert!(snapshot_from_json(&json!([1, 2])).is_err());
        assert!(snapshot_from_json(&json!({"bsr": [{"nested": 1}]})).is_err());
    }
}
