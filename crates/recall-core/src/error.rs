/// Errors that can occur across the Recall pipeline.
///
/// Each variant wraps a specific failure domain. Library crates use this type
/// directly; the binary crate converts to `miette` diagnostics at the boundary.
///
/// # Examples
///
/// ```
/// use recall_core::RecallError;
///
/// let err = RecallError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RecallError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Insert or search was called on a store before `initialize`.
    #[error("store not initialized: call initialize before insert or search")]
    StoreNotInitialized,

    /// The store could not persist its collection to disk. The in-memory
    /// collection is still intact; callers may log and continue.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The persisted collection could not be decoded. Recovery is to start
    /// from an empty store, so this surfaces as a status, not an abort.
    #[error("malformed store data: {0}")]
    MalformedStore(String),

    /// Embedding provider failure (API error, bad response).
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
