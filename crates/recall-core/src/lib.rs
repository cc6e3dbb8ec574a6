//! Core types, configuration, and error handling for Recall.
//!
//! This crate provides the shared foundation used by the other Recall crates:
//! - [`RecallError`] — unified error type using `thiserror`
//! - [`RecallConfig`] — configuration loaded from `.recall.toml`
//! - Shared types: [`ChunkKind`], [`SearchResult`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{EmbeddingConfig, RecallConfig, SegmenterConfig};
pub use error::RecallError;
pub use types::{ChunkKind, OutputFormat, SearchResult};

/// A convenience `Result` type for Recall operations.
pub type Result<T> = std::result::Result<T, RecallError>;
