//! UniProt SPARQL client
//!
//! Protein annotations are looked up by exact sequence match against the
//! UniProt SPARQL endpoint. The client is shared by every annotation task;
//! timeout, result format and rate limit are fixed when it is built.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

/// Knowledge-base query errors
#[derive(Debug, Error)]
pub enum SparqlError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Endpoint error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// One bound value in a result row
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SparqlTerm {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SparqlBindings {
    #[serde(default)]
    pub bindings: Vec<HashMap<String, SparqlTerm>>,
}

/// SPARQL 1.1 JSON results document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub results: SparqlBindings,
}

impl SparqlResults {
    /// Build a result set from rows of `(variable, value)` pairs
    pub fn from_rows(rows: &[&[(&str, &str)]]) -> Self {
        let bindings = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(var, value)| {
                        (
                            var.to_string(),
                            SparqlTerm {
                                value: value.to_string(),
                            },
                        )
                    })
                    .collect()
            })
            .collect();

        Self {
            results: SparqlBindings { bindings },
        }
    }
}

/// Executes structured queries against an external knowledge base
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn query(&self, query: &str) -> Result<SparqlResults, SparqlError>;
}

/// Name, label and entry URI picked from a result set (possibly empty)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedName {
    pub name: String,
    pub label: String,
    pub uri: String,
}

/// Pick the annotation from a result set
///
/// Rows are scanned in order: the first row carrying a recommended name
/// (`fname`) or else a submitted name (`fname2`) wins. Label and URI track the
/// latest row seen up to and including the chosen one.
pub fn select_name(results: &SparqlResults) -> SelectedName {
    let mut selected = SelectedName::default();

    for row in &results.results.bindings {
        if let Some(label) = row.get("label") {
            selected.label = label.value.clone();
        }
        if let Some(seq) = row.get("seq") {
            selected.uri = seq.value.clone();
        }

        let name = row.get("fname").or_else(|| row.get("fname2"));
        if let Some(name) = name {
            selected.name = name.value.clone();
            break;
        }
    }

    selected
}

/// Exact-sequence UniProt query for one protein
pub fn build_uniprot_query(protein: &str) -> String {
    format!(
        concat!(
            "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> ",
            "PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#> ",
            "PREFIX up: <http://purl.uniprot.org/core/> ",
            "select ?seq ?fname ?fname2 ?label where {{",
            "{{?b a up:Simple_Sequence; rdf:value \"{0}\". ?seq up:sequence ?b. ",
            "OPTIONAL{{?seq up:submittedName ?sname. ?sname up:fullName ?fname2}} ",
            "OPTIONAL{{?seq up:recommendedName ?rname. ?rname up:fullName ?fname}} }}",
            "UNION{{?seq a up:Sequence; rdf:value \"{0}\"; rdfs:label ?label. }}}}"
        ),
        protein
    )
}

type DirectLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// UniProt SPARQL endpoint client
pub struct UniprotClient {
    client: reqwest::Client,
    endpoint: String,
    rate_limiter: DirectLimiter,
}

impl UniprotClient {
    pub fn new(endpoint: &str, timeout: Duration, requests_per_second: u32) -> Result<Self, SparqlError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| SparqlError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl KnowledgeBase for UniprotClient {
    async fn query(&self, query: &str) -> Result<SparqlResults, SparqlError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("query", query), ("format", "json")])
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .send()
            .await
            .map_err(|e| SparqlError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SparqlError::Status(status.as_u16(), error_text));
        }

        response
            .json::<SparqlResults>()
            .await
            .map_err(|e| SparqlError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_recommended_name() {
        let results = SparqlResults::from_rows(&[
            &[("seq", "http://purl.uniprot.org/uniprot/A0"), ("label", "A0_BACT")],
            &[
                ("seq", "http://purl.uniprot.org/uniprot/P1"),
                ("fname", "DNA gyrase subunit A"),
                ("fname2", "gyrA"),
            ],
            &[("seq", "http://purl.uniprot.org/uniprot/P2"), ("fname", "later name")],
        ]);

        let selected = select_name(&results);
        assert_eq!(selected.name, "DNA gyrase subunit A");
        assert_eq!(selected.label, "A0_BACT");
        assert_eq!(selected.uri, "http://purl.uniprot.org/uniprot/P1");
    }

    #[test]
    fn test_select_submitted_name_fallback() {
        let results = SparqlResults::from_rows(&[&[
            ("seq", "http://purl.uniprot.org/uniprot/Q9"),
            ("fname2", "hypothetical protein"),
        ]]);
        assert_eq!(select_name(&results).name, "hypothetical protein");
    }

    #[test]
    fn test_select_from_empty_results() {
        assert_eq!(select_name(&SparqlResults::default()), SelectedName::default());
    }

    #[test]
    fn test_results_deserialize() {
        let json = r#"{"head":{"vars":["seq","fname"]},"results":{"bindings":[
            {"seq":{"type":"uri","value":"http://purl.uniprot.org/uniprot/P1"},
             "fname":{"type":"literal","value":"Name"}}]}}"#;
        let results: SparqlResults = serde_json::from_str(json).unwrap();
        assert_eq!(select_name(&results).name, "Name");
    }

    #[test]
    fn test_query_embeds_protein() {
        let query = build_uniprot_query("MKVL");
        assert_eq!(query.matches("\"MKVL\"").count(), 2);
        assert!(query.contains("up:recommendedName"));
        assert!(query.starts_with("PREFIX"));
    }

    #[test]
    fn test_client_creation() {
        let client = UniprotClient::new("https://sparql.uniprot.org/sparql", Duration::from_secs(10), 0);
        assert!(client.is_ok());
    }
}
