//! Per-workspace vector storage with brute-force cosine search.
//!
//! Each workspace root owns one logical store backed by a JSON file under a
//! hidden `.recall/` directory. The whole collection is mirrored in memory
//! and rewritten in full on every insert — write-through, not batched, not
//! transactional. Search is `O(n·d)` per query with no index structure; that
//! is an accepted scaling limit for a single local workspace, not a defect.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use recall_core::{ChunkKind, RecallError, Result};

/// Hidden directory under the workspace root that holds store files.
pub const STORE_DIR: &str = ".recall";
/// File name of the chunk index collection.
pub const INDEX_FILE: &str = "index.json";
/// File name of the notes collection.
pub const NOTES_FILE: &str = "notes.json";

/// Metadata attached to a stored item: a fixed core schema plus an open
/// string-keyed extension map (flattened into the same JSON object).
///
/// # Examples
///
/// ```
/// use recall_engine::store::ItemMetadata;
///
/// let meta = ItemMetadata {
///     file_path: "src/main.rs".into(),
///     ..ItemMetadata::default()
/// };
/// assert!(meta.kind.is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    /// Source file path, relative to the workspace root. Empty for notes.
    #[serde(default)]
    pub file_path: String,
    /// Chunk kind, when the item came from the segmenter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChunkKind>,
    /// Captured symbol name, when the chunk is a symbol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,
    /// Language tag of the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// First line of the chunk in its file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    /// Last line of the chunk in its file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    /// Open extension map for callers that need extra fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// A persisted record: id, original text, embedding, metadata.
///
/// Ids are caller-supplied (`path#index` for chunks, a note key for notes)
/// and are not checked for collisions — duplicates coexist. Items are
/// immutable once inserted and removed only by a full store [`reset`].
///
/// [`reset`]: VectorStore::reset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredItem {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: ItemMetadata,
}

/// A scored record returned from [`VectorStore::search`]. Computed per
/// query, never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    /// Cosine similarity of the normalized query and item vectors.
    pub score: f64,
    pub metadata: ItemMetadata,
}

/// Store health, surfaced instead of silently swallowing I/O trouble.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub initialized: bool,
    /// True when the last persistence attempt failed; the in-memory
    /// collection keeps working.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub items: usize,
}

#[derive(Debug, Default, Deserialize)]
struct StoreFile {
    #[serde(default)]
    items: Vec<StoredItem>,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    items: &'a [StoredItem],
}

/// A per-workspace vector store handle.
///
/// Constructed cheaply with a workspace root; [`initialize`] must be called
/// before [`insert`] or [`search`], which otherwise return
/// [`RecallError::StoreNotInitialized`].
///
/// [`initialize`]: VectorStore::initialize
/// [`insert`]: VectorStore::insert
/// [`search`]: VectorStore::search
///
/// # Examples
///
/// ```
/// use tempfile::tempdir;
/// use recall_engine::store::VectorStore;
///
/// let dir = tempdir().unwrap();
/// let mut store = VectorStore::open(dir.path());
/// store.initialize().unwrap();
/// assert!(store.is_empty());
/// ```
#[derive(Debug)]
pub struct VectorStore {
    path: PathBuf,
    items: Vec<StoredItem>,
    initialized: bool,
    degraded: bool,
    note: Option<String>,
}

impl VectorStore {
    /// Handle for the workspace's chunk index (`.recall/index.json`).
    pub fn open(workspace_root: &Path) -> Self {
        Self::with_file(workspace_root, INDEX_FILE)
    }

    /// Handle for the workspace's notes collection (`.recall/notes.json`).
    pub fn notes(workspace_root: &Path) -> Self {
        Self::with_file(workspace_root, NOTES_FILE)
    }

    /// Handle for an arbitrary collection file under the store directory.
    pub fn with_file(workspace_root: &Path, file_name: &str) -> Self {
        Self {
            path: workspace_root.join(STORE_DIR).join(file_name),
            items: Vec::new(),
            initialized: false,
            degraded: false,
            note: None,
        }
    }

    /// Load the persisted collection, or start empty.
    ///
    /// Idempotent. A missing file is a new store; an unreadable or corrupt
    /// file is logged and treated as empty rather than aborting. Storage
    /// errors degrade the store to in-memory-only and are surfaced through
    /// [`status`](VectorStore::status).
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; the `Result` is part of the store
    /// boundary contract so callers are ready for stricter policies.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        if let Some(dir) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), %err, "store directory unavailable, running in-memory only");
                self.degraded = true;
                self.note = Some(format!("store directory unavailable: {err}"));
            }
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<StoreFile>(&content) {
                Ok(file) => {
                    self.items = file.items;
                }
                Err(err) => {
                    // Corruption resets to empty; the next insert rewrites.
                    let reason =
                        RecallError::MalformedStore(format!("{}: {err}", self.path.display()));
                    tracing::warn!(%reason, "starting with an empty store");
                    self.note = Some(reason.to_string());
                    self.items = Vec::new();
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.items = Vec::new();
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "store unreadable, starting empty");
                self.degraded = true;
                self.note = Some(format!("store unreadable: {err}"));
                self.items = Vec::new();
            }
        }

        self.initialized = true;
        Ok(())
    }

    /// Append an item and rewrite the persisted collection.
    ///
    /// No id-collision check: inserting a record with a previously used id
    /// produces two coexisting entries.
    ///
    /// # Errors
    ///
    /// [`RecallError::StoreNotInitialized`] before [`initialize`], or
    /// [`RecallError::Persistence`] when the rewrite fails — the item is
    /// still in memory, so ingestion may log and continue while API callers
    /// propagate.
    ///
    /// [`initialize`]: VectorStore::initialize
    pub fn insert(&mut self, item: StoredItem) -> Result<()> {
        if !self.initialized {
            return Err(RecallError::StoreNotInitialized);
        }
        self.items.push(item);
        self.persist()
    }

    /// Find the `k` nearest stored items by cosine similarity.
    ///
    /// The query vector and every stored vector are L2-normalized
    /// independently (an all-zero vector stays zero), and the dot product
    /// runs over the shorter of the two vectors, so records of mixed
    /// dimensionality coexist rather than erroring.
    ///
    /// # Errors
    ///
    /// [`RecallError::StoreNotInitialized`] before
    /// [`initialize`](VectorStore::initialize). An empty store returns an
    /// empty list, never an error.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if !self.initialized {
            return Err(RecallError::StoreNotInitialized);
        }

        let query = l2_normalize(query);
        let mut scored: Vec<(f64, &StoredItem)> = self
            .items
            .iter()
            .map(|item| {
                let normalized = l2_normalize(&item.embedding);
                (prefix_dot(&query, &normalized), item)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, item)| SearchHit {
                id: item.id.clone(),
                text: item.text.clone(),
                score,
                metadata: item.metadata.clone(),
            })
            .collect())
    }

    /// Clear the collection and rewrite the empty file — the only removal
    /// mechanism; there is no delete-by-id or stale-entry eviction.
    ///
    /// # Errors
    ///
    /// Same contract as [`insert`](VectorStore::insert).
    pub fn reset(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(RecallError::StoreNotInitialized);
        }
        self.items.clear();
        self.persist()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no items are stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current health of the store.
    pub fn status(&self) -> StoreStatus {
        StoreStatus {
            initialized: self.initialized,
            degraded: self.degraded,
            note: self.note.clone(),
            items: self.items.len(),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&mut self) -> Result<()> {
        let body = serde_json::to_string(&StoreFileRef { items: &self.items })?;
        match fs::write(&self.path, body) {
            Ok(()) => {
                self.degraded = false;
                self.note = None;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "failed to persist store, keeping in-memory state");
                self.degraded = true;
                let message = format!("{}: {err}", self.path.display());
                self.note = Some(message.clone());
                Err(RecallError::Persistence(message))
            }
        }
    }
}

fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector
        .iter()
        .map(|v| (*v as f64) * (*v as f64))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| (*v as f64 / norm) as f32).collect()
}

/// Dot product over the overlapping prefix of two vectors.
fn prefix_dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}
