//! Best-effort locus annotation
//!
//! Each locus gets one query per distinct protein. Queries run in order until
//! an informative name is accepted or the attempt budget is spent; failed
//! queries count as attempts and are otherwise ignored.

use crate::models::{Annotation, LocusAnnotation, LocusQc};
use crate::services::quality_control::load_proteins;
use crate::services::sparql_client::{build_uniprot_query, select_name, KnowledgeBase, SelectedName};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Maximum queries issued per locus
pub const MAX_ATTEMPTS: usize = 10;

/// Uninformative names, replaced whenever a better one turns up
pub const UNPREFERRED_NAMES: &[&str] = &["Uncharacterized protein", "hypothetical protein", "DUF", ""];

pub fn is_unpreferred(name: &str) -> bool {
    UNPREFERRED_NAMES.contains(&name)
}

/// Lookup queries for a classified locus, one per distinct protein
///
/// Proteins come from the persisted translation file when quality control
/// wrote one, else from memory.
pub fn build_queries(qc: &LocusQc) -> std::io::Result<Vec<String>> {
    let proteins: Vec<String> = match &qc.proteins_file {
        Some(path) => load_proteins(path)?.into_iter().map(|e| e.protein).collect(),
        None => qc.proteins.clone(),
    };

    Ok(distinct_in_order(&proteins)
        .into_iter()
        .map(build_uniprot_query)
        .collect())
}

fn distinct_in_order(proteins: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    proteins
        .iter()
        .map(String::as_str)
        .filter(|p| seen.insert(*p))
        .collect()
}

/// Resolve the annotation for one locus
///
/// Issues at most `min(MAX_ATTEMPTS, queries.len())` queries.
pub async fn resolve_locus(knowledge_base: &dyn KnowledgeBase, queries: &[String]) -> Annotation {
    let mut accepted: Option<SelectedName> = None;

    for (attempt, query) in queries.iter().take(MAX_ATTEMPTS).enumerate() {
        let candidate = match knowledge_base.query(query).await {
            Ok(results) => select_name(&results),
            Err(e) => {
                tracing::debug!(attempt = attempt + 1, "Annotation query failed: {}", e);
                continue;
            }
        };

        let replace = match &accepted {
            None => !candidate.name.is_empty(),
            Some(current) => is_unpreferred(&current.name) && !is_unpreferred(&candidate.name),
        };
        if replace {
            accepted = Some(candidate);
        }

        if accepted.as_ref().is_some_and(|a| !is_unpreferred(&a.name)) {
            break;
        }
    }

    match accepted {
        Some(SelectedName { name, label, uri }) => Annotation::Found { name, label, uri },
        None => Annotation::NotFound,
    }
}

/// Resolve annotations for many loci with `threads` concurrent tasks
///
/// Results are returned sorted by locus.
pub async fn resolve_all(
    knowledge_base: Arc<dyn KnowledgeBase>,
    work: Vec<(String, Vec<String>)>,
    threads: usize,
) -> Vec<LocusAnnotation> {
    let total = work.len();
    let resolved = Arc::new(AtomicUsize::new(0));

    tracing::info!(loci = total, threads, "Searching UniProt for annotations");

    let mut annotations: Vec<LocusAnnotation> = stream::iter(work)
        .map(|(locus, queries)| {
            let knowledge_base = knowledge_base.clone();
            let resolved = resolved.clone();

            async move {
                let annotation = resolve_locus(knowledge_base.as_ref(), &queries).await;

                let done = resolved.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::info!("Found annotations for {}/{} loci.", done, total);
                tracing::debug!(locus = %locus, name = annotation.name(), "Resolved annotation");

                LocusAnnotation { locus, annotation }
            }
        })
        .buffer_unordered(threads.max(1))
        .collect()
        .await;

    annotations.sort_by(|a, b| a.locus.cmp(&b.locus));
    annotations
}
