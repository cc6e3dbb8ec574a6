//! Lightweight project summary assembled from the index itself.

use serde::Serialize;

use recall_core::{Result, SearchResult};

use crate::embedding::Embedder;
use crate::search::RetrievalEngine;
use crate::store::VectorStore;

const SUMMARY_QUERY: &str = "project summary";
const SUMMARY_MAX_CHARS: usize = 3000;

/// A project summary: joined representative chunks plus the chunks
/// themselves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub summary: String,
    pub chunks: Vec<SearchResult>,
}

/// Query the index with a generic overview query and join the top chunk
/// texts, truncated to a safety bound.
///
/// # Errors
///
/// Returns an error if embedding fails or the store is not initialized. An
/// unindexed workspace yields an empty summary, not an error.
pub async fn project_summary(
    store: &VectorStore,
    embedder: &Embedder,
    k: usize,
) -> Result<ProjectSummary> {
    let engine = RetrievalEngine::new(store, embedder);
    let chunks = engine.query(SUMMARY_QUERY, k).await?;

    let joined = chunks
        .iter()
        .map(|r| r.snippet.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let summary = truncate_chars(&joined, SUMMARY_MAX_CHARS);

    Ok(ProjectSummary { summary, chunks })
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}
