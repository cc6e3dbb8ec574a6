//! Ingestion orchestrator: walk, segment, embed, insert.
//!
//! Files are processed one at a time, and chunks within a file one at a
//! time; the embedding call is the only suspension point. A failing file is
//! logged and skipped, never aborting the run. Each insert rewrites the
//! persisted collection, so writes stay single-writer by construction.

use std::path::Path;

use serde::Serialize;

use recall_core::{RecallError, Result, SegmenterConfig};

use crate::embedding::Embedder;
use crate::segmenter::segment_file;
use crate::store::{ItemMetadata, StoredItem, VectorStore};
use crate::walker::{walk_workspace, WorkspaceFile};

/// Outcome of an ingestion run.
///
/// # Examples
///
/// ```
/// use recall_engine::ingest::IngestReport;
///
/// let report = IngestReport::default();
/// assert_eq!(report.files_failed, 0);
/// ```
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Files discovered by the walker.
    pub files_seen: usize,
    /// Files fully segmented, embedded, and stored.
    pub files_indexed: usize,
    /// Files skipped after an error (logged, not fatal).
    pub files_failed: usize,
    /// Chunks inserted into the store (or already present when reused).
    pub chunks_indexed: usize,
    /// True when a populated store was left untouched (no `force`).
    pub reused_existing: bool,
}

/// Index a workspace into its vector store.
///
/// Policy for repeat runs: `force` resets the store and rebuilds from
/// scratch; without `force`, a populated store is left untouched and the
/// report says so. There is no incremental diffing — a rebuild reprocesses
/// every file.
///
/// # Errors
///
/// Returns an error only for store-level failures on the happy path
/// (initialize/reset). Per-file segmentation, embedding, and insert errors
/// are logged and counted in the report instead.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use recall_core::{EmbeddingConfig, SegmenterConfig};
/// use recall_engine::embedding::Embedder;
/// use recall_engine::ingest::ingest_workspace;
/// use recall_engine::store::VectorStore;
///
/// # async fn example() {
/// let root = Path::new(".");
/// let mut store = VectorStore::open(root);
/// let embedder = Embedder::from_config(&EmbeddingConfig::default());
/// let report = ingest_workspace(&mut store, &embedder, &SegmenterConfig::default(), root, false)
///     .await
///     .unwrap();
/// println!("indexed {} chunks", report.chunks_indexed);
/// # }
/// ```
pub async fn ingest_workspace(
    store: &mut VectorStore,
    embedder: &Embedder,
    segmenter: &SegmenterConfig,
    root: &Path,
    force: bool,
) -> Result<IngestReport> {
    store.initialize()?;

    let mut report = IngestReport::default();

    if force {
        store.reset()?;
    } else if !store.is_empty() {
        tracing::debug!(items = store.len(), "store already populated, reusing");
        report.reused_existing = true;
        report.chunks_indexed = store.len();
        return Ok(report);
    }

    let files = walk_workspace(root)?;
    report.files_seen = files.len();
    tracing::debug!(files = files.len(), root = %root.display(), "ingesting workspace");

    for file in &files {
        match ingest_file(store, embedder, segmenter, file).await {
            Ok(chunks) => {
                report.files_indexed += 1;
                report.chunks_indexed += chunks;
                tracing::debug!(file = %file.path.display(), chunks, "indexed");
            }
            Err(err) => {
                tracing::warn!(file = %file.path.display(), %err, "skipping file");
                report.files_failed += 1;
            }
        }
    }

    Ok(report)
}

async fn ingest_file(
    store: &mut VectorStore,
    embedder: &Embedder,
    segmenter: &SegmenterConfig,
    file: &WorkspaceFile,
) -> Result<usize> {
    let chunks = segment_file(&file.path, &file.content, segmenter);
    let path_str = file.path.to_string_lossy().replace('\\', "/");

    for (i, chunk) in chunks.iter().enumerate() {
        let embedding = embedder.embed_document(&chunk.text).await?;
        let item = StoredItem {
            id: format!("{path_str}#{i}"),
            text: chunk.text.clone(),
            embedding,
            metadata: ItemMetadata {
                file_path: path_str.clone(),
                kind: Some(chunk.kind),
                symbol_name: chunk.symbol_name.clone(),
                language: Some(chunk.language.clone()),
                start_line: Some(chunk.start_line),
                end_line: Some(chunk.end_line),
                extra: Default::default(),
            },
        };
        if let Err(err) = store.insert(item) {
            match err {
                // The item is in memory; the write-through will catch up on
                // the next successful persist.
                RecallError::Persistence(_) => {
                    tracing::warn!(file = %file.path.display(), %err, "continuing after persistence failure");
                }
                other => return Err(other),
            }
        }
    }

    Ok(chunks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::EmbeddingConfig;
    use std::fs;

    fn hashing_embedder() -> Embedder {
        Embedder::from_config(&EmbeddingConfig {
            provider: "hashing".into(),
            ..EmbeddingConfig::default()
        })
    }

    fn seed_workspace(root: &Path) {
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(
            root.join("src/auth.rs"),
            "pub fn validate_token(token: &str) -> bool {\n    !token.is_empty()\n}\n",
        )
        .unwrap();
        fs::write(root.join("README.md"), "# Demo\n\nA demo workspace.\n").unwrap();
    }

    #[tokio::test]
    async fn ingest_indexes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        seed_workspace(dir.path());

        let mut store = VectorStore::open(dir.path());
        let embedder = hashing_embedder();
        let report = ingest_workspace(
            &mut store,
            &embedder,
            &SegmenterConfig::default(),
            dir.path(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(report.files_seen, 2);
        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.files_failed, 0);
        assert!(report.chunks_indexed >= 2);
        assert!(!report.reused_existing);
        assert_eq!(store.len(), report.chunks_indexed);
    }

    #[tokio::test]
    async fn chunk_ids_carry_path_and_index() {
        let dir = tempfile::tempdir().unwrap();
        seed_workspace(dir.path());

        let mut store = VectorStore::open(dir.path());
        let embedder = hashing_embedder();
        ingest_workspace(
            &mut store,
            &embedder,
            &SegmenterConfig::default(),
            dir.path(),
            false,
        )
        .await
        .unwrap();

        let query = embedder.embed_query("validate token").await.unwrap();
        let hits = store.search(&query, 10).unwrap();
        assert!(hits.iter().any(|h| h.id.starts_with("src/auth.rs#")));
    }

    #[tokio::test]
    async fn second_run_without_force_reuses_the_index() {
        let dir = tempfile::tempdir().unwrap();
        seed_workspace(dir.path());

        let embedder = hashing_embedder();
        let mut store = VectorStore::open(dir.path());
        let first = ingest_workspace(
            &mut store,
            &embedder,
            &SegmenterConfig::default(),
            dir.path(),
            false,
        )
        .await
        .unwrap();

        let mut store = VectorStore::open(dir.path());
        let second = ingest_workspace(
            &mut store,
            &embedder,
            &SegmenterConfig::default(),
            dir.path(),
            false,
        )
        .await
        .unwrap();

        assert!(second.reused_existing);
        assert_eq!(second.chunks_indexed, first.chunks_indexed);
        assert_eq!(store.len(), first.chunks_indexed);
    }

    #[tokio::test]
    async fn force_rebuild_resets_instead_of_duplicating() {
        let dir = tempfile::tempdir().unwrap();
        seed_workspace(dir.path());

        let embedder = hashing_embedder();
        let mut store = VectorStore::open(dir.path());
        let first = ingest_workspace(
            &mut store,
            &embedder,
            &SegmenterConfig::default(),
            dir.path(),
            false,
        )
        .await
        .unwrap();

        let mut store = VectorStore::open(dir.path());
        let rebuilt = ingest_workspace(
            &mut store,
            &embedder,
            &SegmenterConfig::default(),
            dir.path(),
            true,
        )
        .await
        .unwrap();

        assert!(!rebuilt.reused_existing);
        assert_eq!(rebuilt.chunks_indexed, first.chunks_indexed);
        assert_eq!(store.len(), first.chunks_indexed);
    }

    #[tokio::test]
    async fn empty_workspace_ingests_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(dir.path());
        let embedder = hashing_embedder();
        let report = ingest_workspace(
            &mut store,
            &embedder,
            &SegmenterConfig::default(),
            dir.path(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(report.files_seen, 0);
        assert_eq!(report.chunks_indexed, 0);
        assert!(store.is_empty());
    }
}
