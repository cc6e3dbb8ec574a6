//! Free-text notes ("remember this") saved into the per-workspace notes
//! store and searchable by plain vector similarity.
//!
//! Notes share the chunk store machinery but live in their own collection
//! file, so indexing a workspace never touches saved notes and vice versa.

use chrono::Utc;
use serde::Serialize;

use recall_core::Result;

use crate::embedding::Embedder;
use crate::store::{ItemMetadata, StoredItem, VectorStore};

const TAGS_KEY: &str = "tags";

/// A note returned from [`search_notes`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteHit {
    pub id: String,
    pub text: String,
    pub score: f64,
    pub tags: Vec<String>,
}

/// Embed and save a note.
///
/// The id is the caller's `key` when given, otherwise a generated
/// `note_<millis>` key. Saving under an existing key does not replace the
/// earlier note — duplicates coexist, like any other store insert.
///
/// # Errors
///
/// Returns an error if embedding or the store insert fails.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use recall_core::EmbeddingConfig;
/// use recall_engine::embedding::Embedder;
/// use recall_engine::notes::save_note;
/// use recall_engine::store::VectorStore;
///
/// # async fn example() {
/// let mut store = VectorStore::notes(Path::new("."));
/// let embedder = Embedder::from_config(&EmbeddingConfig::default());
/// let id = save_note(&mut store, &embedder, "the staging db lives on port 5433", &[], None)
///     .await
///     .unwrap();
/// println!("saved {id}");
/// # }
/// ```
pub async fn save_note(
    store: &mut VectorStore,
    embedder: &Embedder,
    text: &str,
    tags: &[String],
    key: Option<&str>,
) -> Result<String> {
    store.initialize()?;

    let id = match key {
        Some(key) => key.to_string(),
        None => format!("note_{}", Utc::now().timestamp_millis()),
    };
    let embedding = embedder.embed_document(text).await?;

    let mut metadata = ItemMetadata::default();
    if !tags.is_empty() {
        metadata.extra.insert(TAGS_KEY.into(), tags.join(","));
    }

    store.insert(StoredItem {
        id: id.clone(),
        text: text.to_string(),
        embedding,
        metadata,
    })?;

    Ok(id)
}

/// Search saved notes by vector similarity. No reranking: notes are short
/// free text, so raw cosine order is already the right order.
///
/// # Errors
///
/// Returns an error if embedding fails or the store is not initialized.
pub async fn search_notes(
    store: &VectorStore,
    embedder: &Embedder,
    query: &str,
    k: usize,
) -> Result<Vec<NoteHit>> {
    let embedding = embedder.embed_query(query).await?;
    let hits = store.search(&embedding, k)?;

    Ok(hits
        .into_iter()
        .map(|hit| {
            let tags = hit
                .metadata
                .extra
                .get(TAGS_KEY)
                .map(|joined| joined.split(',').map(str::to_string).collect())
                .unwrap_or_default();
            NoteHit {
                id: hit.id,
                text: hit.text,
                score: hit.score,
                tags,
            }
        })
        .collect())
}
