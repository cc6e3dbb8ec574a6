//! Embedding providers: a remote Voyage-style HTTP client and a
//! deterministic offline hashing embedder.
//!
//! Both live behind the [`Embedder`] interface and are selected by
//! configuration, not by runtime try/catch: `provider = "voyage"` uses the
//! remote client when an API key is available and otherwise falls back to
//! hashing (recorded in the status), `provider = "hashing"` opts into the
//! offline embedder directly.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use recall_core::{EmbeddingConfig, RecallError, Result};

const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";
const BATCH_SIZE: usize = 64;
const BATCH_DELAY_MS: u64 = 200;

/// Dimensionality of the deterministic hashing embedder.
pub const HASHING_DIMENSIONS: usize = 128;

/// Provider status for diagnostics.
///
/// # Examples
///
/// ```
/// use recall_core::EmbeddingConfig;
/// use recall_engine::embedding::Embedder;
///
/// let config = EmbeddingConfig {
///     provider: "hashing".into(),
///     ..EmbeddingConfig::default()
/// };
/// let status = Embedder::from_config(&config).status();
/// assert_eq!(status.provider, "hashing");
/// assert!(!status.fallback);
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingStatus {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub dimensions: usize,
    /// True when the remote provider was configured but unusable and the
    /// hashing embedder took over.
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// An embedding capability: `text -> fixed-length vector`.
///
/// Two implementations of one interface, chosen by configuration. Vectors
/// from different implementations have different dimensionality; the vector
/// store compares only the overlapping prefix, so mixed stores degrade
/// gracefully instead of erroring.
pub enum Embedder {
    Remote(RemoteEmbedder),
    Hashing(HashingEmbedder),
}

impl Embedder {
    /// Build a provider from configuration.
    ///
    /// `"hashing"` selects the offline embedder. Anything else is treated as
    /// the remote provider; if no API key is available (config or
    /// `VOYAGE_API_KEY`), the hashing embedder is used instead and the
    /// status records the fallback.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        if config.provider == "hashing" {
            return Embedder::Hashing(HashingEmbedder::new(HASHING_DIMENSIONS));
        }
        match RemoteEmbedder::with_config(config) {
            Ok(remote) => Embedder::Remote(remote),
            Err(err) => {
                tracing::warn!(%err, "remote embedding provider unavailable, using hashing fallback");
                Embedder::Hashing(HashingEmbedder::fallback(HASHING_DIMENSIONS, err.to_string()))
            }
        }
    }

    /// Embed one chunk of document text.
    ///
    /// # Errors
    ///
    /// Returns [`RecallError::Embedding`] if the remote API call fails. The
    /// hashing embedder never fails.
    pub async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            Embedder::Remote(remote) => remote.embed(text, "document").await,
            Embedder::Hashing(hashing) => Ok(hashing.embed(text)),
        }
    }

    /// Embed a search query.
    ///
    /// # Errors
    ///
    /// Returns [`RecallError::Embedding`] if the remote API call fails.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            Embedder::Remote(remote) => remote.embed(text, "query").await,
            Embedder::Hashing(hashing) => Ok(hashing.embed(text)),
        }
    }

    /// Embed a batch of document texts, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`RecallError::Embedding`] if any remote API call fails.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            Embedder::Remote(remote) => remote.embed_batch(texts).await,
            Embedder::Hashing(hashing) => Ok(texts.iter().map(|t| hashing.embed(t)).collect()),
        }
    }

    /// Exercise the provider once so the first real call is not the probe.
    ///
    /// # Errors
    ///
    /// Returns [`RecallError::Embedding`] if the probe call fails.
    pub async fn warmup(&self) -> Result<()> {
        self.embed_query("warmup probe").await.map(|_| ())
    }

    /// Expected vector dimensionality of this provider.
    pub fn dimensions(&self) -> usize {
        match self {
            Embedder::Remote(remote) => remote.dimensions,
            Embedder::Hashing(hashing) => hashing.dimensions,
        }
    }

    /// Current provider status for diagnostics.
    pub fn status(&self) -> EmbeddingStatus {
        match self {
            Embedder::Remote(remote) => EmbeddingStatus {
                provider: remote.provider.clone(),
                model: Some(remote.model.clone()),
                dimensions: remote.dimensions,
                fallback: false,
                last_error: remote.last_error.lock().ok().and_then(|e| e.clone()),
            },
            Embedder::Hashing(hashing) => EmbeddingStatus {
                provider: "hashing".into(),
                model: None,
                dimensions: hashing.dimensions,
                fallback: hashing.fallback,
                last_error: hashing.fallback_reason.clone(),
            },
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
    input_type: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
}

/// Voyage-style HTTP embedding client.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    provider: String,
    model: String,
    dimensions: usize,
    last_error: Mutex<Option<String>>,
}

impl std::fmt::Debug for RemoteEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl RemoteEmbedder {
    /// Create a client from configuration.
    ///
    /// Falls back to the `VOYAGE_API_KEY` env var if the config has no key.
    ///
    /// # Errors
    ///
    /// Returns [`RecallError::Config`] if no API key is available.
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("VOYAGE_API_KEY").ok())
            .ok_or_else(|| {
                RecallError::Config(
                    "embedding API key not found: set embedding.api_key in .recall.toml or VOYAGE_API_KEY env var".into(),
                )
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            provider: config.provider.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            last_error: Mutex::new(None),
        })
    }

    async fn embed(&self, text: &str, input_type: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()], input_type).await?;
        vectors
            .pop()
            .ok_or_else(|| self.record(RecallError::Embedding("empty response from embedding API".into())))
    }

    /// Embed texts in sub-batches with a short pause between calls for rate
    /// limiting.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(BATCH_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(BATCH_DELAY_MS)).await;
            }
            all.extend(self.request(batch, "document").await?);
        }
        Ok(all)
    }

    async fn request(&self, texts: &[String], input_type: &str) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
            input_type: input_type.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.record(RecallError::Embedding(format!("HTTP request failed: {e}"))))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(self.record(RecallError::Embedding(format!(
                "embedding API returned {status}: {body}"
            ))));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| self.record(RecallError::Embedding(format!("failed to parse response: {e}"))))?;

        if let Ok(mut last) = self.last_error.lock() {
            *last = None;
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn record(&self, err: RecallError) -> RecallError {
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(err.to_string());
        }
        err
    }

    #[cfg(test)]
    fn build_request(&self, texts: &[String], input_type: &str) -> EmbedRequest {
        EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
            input_type: input_type.to_string(),
        }
    }
}

/// Deterministic offline embedder: tokens hashed into sign-carrying buckets,
/// then L2-normalized.
///
/// Stable across runs and platforms, so cosine comparison stays meaningful
/// without any model or network.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    fallback: bool,
    fallback_reason: Option<String>,
}

impl HashingEmbedder {
    /// Offline embedder selected deliberately by configuration.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fallback: false,
            fallback_reason: None,
        }
    }

    /// Offline embedder standing in for an unusable remote provider.
    pub fn fallback(dimensions: usize, reason: String) -> Self {
        Self {
            dimensions,
            fallback: true,
            fallback_reason: Some(reason),
        }
    }

    /// Embed text into a fixed-length vector. Total and deterministic.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut hash_bytes = [0u8; 8];
            hash_bytes.copy_from_slice(&digest[..8]);
            let hash = u64::from_le_bytes(hash_bytes);

            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashing() -> HashingEmbedder {
        HashingEmbedder::new(HASHING_DIMENSIONS)
    }

    #[test]
    fn hashing_embedder_is_deterministic() {
        let a = hashing().embed("fn register_command(id: &str)");
        let b = hashing().embed("fn register_command(id: &str)");
        assert_eq!(a, b);
    }

    #[test]
    fn hashing_embedder_output_is_unit_length() {
        let v = hashing().embed("some text with several distinct tokens");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm: {norm}");
    }

    #[test]
    fn hashing_embedder_empty_text_is_zero_vector() {
        let v = hashing().embed("");
        assert_eq!(v.len(), HASHING_DIMENSIONS);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn similar_texts_score_closer_than_unrelated_ones() {
        let e = hashing();
        let base = e.embed("initialize the vector store for a workspace");
        let close = e.embed("initialize the vector store");
        let far = e.embed("parse markdown headings into chunks");

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&base, &close) > dot(&base, &far));
    }

    #[test]
    fn config_selects_hashing_provider() {
        let config = EmbeddingConfig {
            provider: "hashing".into(),
            ..EmbeddingConfig::default()
        };
        let embedder = Embedder::from_config(&config);
        assert!(matches!(embedder, Embedder::Hashing(_)));
        assert!(!embedder.status().fallback);
        assert_eq!(embedder.dimensions(), HASHING_DIMENSIONS);
    }

    #[test]
    fn remote_with_key_in_config_is_selected() {
        let config = EmbeddingConfig {
            api_key: Some("vk-test".into()),
            ..EmbeddingConfig::default()
        };
        let embedder = Embedder::from_config(&config);
        assert!(matches!(embedder, Embedder::Remote(_)));
        let status = embedder.status();
        assert_eq!(status.provider, "voyage");
        assert_eq!(status.model.as_deref(), Some("voyage-code-3"));
        assert_eq!(status.dimensions, 1024);
    }

    #[test]
    fn remote_request_format_is_correct() {
        let config = EmbeddingConfig {
            api_key: Some("vk-test".into()),
            ..EmbeddingConfig::default()
        };
        let remote = RemoteEmbedder::with_config(&config).unwrap();
        let request =
            remote.build_request(&["fn main() {}".to_string(), "struct Foo;".to_string()], "document");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "voyage-code-3");
        assert_eq!(json["input_type"], "document");
        assert_eq!(json["input"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn remote_response_parsing_works() {
        let json = r#"{
            "data": [
                {"embedding": [0.1, 0.2, 0.3]},
                {"embedding": [0.4, 0.5, 0.6]}
            ]
        }"#;
        let response: EmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].embedding, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn batch_splitting_calculates_correctly() {
        let texts: Vec<String> = (0..150).map(|i| format!("text {i}")).collect();
        let batches: Vec<&[String]> = texts.chunks(BATCH_SIZE).collect();
        assert_eq!(batches.len(), 3); // 64 + 64 + 22
        assert_eq!(batches[0].len(), 64);
        assert_eq!(batches[2].len(), 22);
    }

    #[tokio::test]
    async fn hashing_batch_preserves_order() {
        let config = EmbeddingConfig {
            provider: "hashing".into(),
            ..EmbeddingConfig::default()
        };
        let embedder = Embedder::from_config(&config);
        let texts = vec!["first text".to_string(), "second text".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed_document("first text").await.unwrap());
        assert_eq!(batch[1], embedder.embed_document("second text").await.unwrap());
    }
}
