//! The Recall retrieval engine: segmentation, embedding, storage, and
//! hybrid search for one workspace at a time.
//!
//! Pipeline: `file -> segmenter -> chunks -> embedder -> vectors ->
//! store.insert`; queries go `query -> embedder -> store.search(wide-k) ->
//! rerank -> top-k`, deduplicated to one chunk per file.

pub mod embedding;
pub mod ingest;
pub mod notes;
pub mod search;
pub mod segmenter;
pub mod store;
pub mod summary;
pub mod walker;
