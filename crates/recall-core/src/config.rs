use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RecallError;

/// Top-level configuration loaded from `.recall.toml`.
///
/// Every section has serde defaults, so a missing or empty file yields a
/// fully working offline configuration.
///
/// # Examples
///
/// ```
/// use recall_core::RecallConfig;
///
/// let config = RecallConfig::default();
/// assert_eq!(config.segmenter.max_tokens, 320);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecallConfig {
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Segmentation thresholds.
    #[serde(default)]
    pub segmenter: SegmenterConfig,
}

impl RecallConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RecallError::Io`] if the file cannot be read, or
    /// [`RecallError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use recall_core::RecallConfig;
    /// use std::path::Path;
    ///
    /// let config = RecallConfig::from_file(Path::new(".recall.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, RecallError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`RecallError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use recall_core::RecallConfig;
    ///
    /// let toml = r#"
    /// [segmenter]
    /// max_tokens = 400
    /// "#;
    /// let config = RecallConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.segmenter.max_tokens, 400);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, RecallError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Configuration for the embedding provider.
///
/// `provider = "voyage"` uses the remote HTTP provider (requires an API key
/// in config or `VOYAGE_API_KEY`); `provider = "hashing"` selects the
/// deterministic offline embedder.
///
/// # Examples
///
/// ```
/// use recall_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.provider, "voyage");
/// assert_eq!(config.model, "voyage-code-3");
/// assert_eq!(config.dimensions, 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding provider (default: `"voyage"`).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// API key for the remote provider.
    pub api_key: Option<String>,
    /// Model name (default: `"voyage-code-3"`).
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimensions of the remote model (default: 1024).
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_provider() -> String {
    "voyage".into()
}

fn default_embedding_model() -> String {
    "voyage-code-3".into()
}

fn default_embedding_dimensions() -> usize {
    1024
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
        }
    }
}

/// Segmentation thresholds, in whitespace-delimited tokens.
///
/// A free-form block closes on a blank line only once it has reached
/// `min_tokens`; any segment over `max_tokens` is split at line granularity.
///
/// # Examples
///
/// ```
/// use recall_core::SegmenterConfig;
///
/// let config = SegmenterConfig::default();
/// assert_eq!(config.min_tokens, 160);
/// assert_eq!(config.max_tokens, 320);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Minimum tokens before a blank line may close a block (default: 160).
    #[serde(default = "default_min_tokens")]
    pub min_tokens: usize,
    /// Maximum tokens per chunk before the split pass applies (default: 320).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_min_tokens() -> usize {
    160
}

fn default_max_tokens() -> usize {
    320
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_tokens: default_min_tokens(),
            max_tokens: default_max_tokens(),
        }
    }
}
