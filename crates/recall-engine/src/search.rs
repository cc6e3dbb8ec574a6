//! Hybrid retrieval: vector similarity blended with lexical signals.
//!
//! Pure cosine similarity under-performs on exact-identifier and "where is X
//! registered" questions, so candidates are over-fetched from the store and
//! rescored with cheap lexical overlap, keyword coverage, and query-intent
//! heuristics, then deduplicated to one chunk per file. No inverted index is
//! involved; everything here is a pure function over the candidate set.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use recall_core::{ChunkKind, Result, SearchResult};

use crate::embedding::Embedder;
use crate::store::{SearchHit, VectorStore};

/// Tokens too generic to count as significant query terms.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "is", "it",
    "of", "on", "or", "that", "the", "this", "to", "what", "where", "which", "with", "class",
    "command", "function", "implementation", "implemented", "register", "registered",
];

/// Boilerplate query prefixes stripped before scoring, in order.
const QUERY_PREFIXES: &[(&str, &str)] = &[
    ("search this codebase for ", ""),
    ("search the codebase for ", ""),
    ("find where ", "where "),
    ("answer from codebase: ", ""),
];

/// Code file extensions, for intent-based boosts.
const CODE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "py", "java", "kt", "go", "rs", "c", "cpp", "h", "cs", "rb",
    "php", "swift", "scala", "sh", "json", "yml", "yaml", "xml",
];

/// Prose/documentation file extensions.
const DOC_EXTENSIONS: &[&str] = &["md", "txt"];

static REGISTER_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"registerCommand|registerTool|register\(").expect("register pattern"));

static COMMAND_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"registerCommand|register\(").expect("command pattern"));

static SYMBOL_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)register|open|command").expect("symbol hint pattern"));

/// Retrieval engine over one workspace store and an embedding provider.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use recall_core::EmbeddingConfig;
/// use recall_engine::embedding::Embedder;
/// use recall_engine::search::RetrievalEngine;
/// use recall_engine::store::VectorStore;
///
/// # async fn example() {
/// let mut store = VectorStore::open(Path::new("."));
/// store.initialize().unwrap();
/// let embedder = Embedder::from_config(&EmbeddingConfig::default());
/// let engine = RetrievalEngine::new(&store, &embedder);
/// let results = engine.query("where is the command registered", 5).await.unwrap();
/// # }
/// ```
pub struct RetrievalEngine<'a> {
    store: &'a VectorStore,
    embedder: &'a Embedder,
}

impl<'a> RetrievalEngine<'a> {
    /// Create an engine borrowing a store and an embedder.
    pub fn new(store: &'a VectorStore, embedder: &'a Embedder) -> Self {
        Self { store, embedder }
    }

    /// Answer a natural-language query with up to `k` results, one chunk per
    /// distinct file, in descending score order.
    ///
    /// # Errors
    ///
    /// Returns [`recall_core::RecallError`] if the query embedding fails or
    /// the store is not initialized. Zero candidates is an empty result, not
    /// an error.
    pub async fn query(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let normalized = normalize_query(query);
        let embedding = self.embedder.embed_query(&normalized).await?;

        // Over-fetch wide so dedup and intent penalties cannot starve top-k.
        let candidate_k = (k.saturating_mul(25)).clamp(80, 600);
        let candidates = self.store.search(&embedding, candidate_k)?;
        tracing::debug!(
            candidates = candidates.len(),
            candidate_k,
            "reranking candidates"
        );

        Ok(rerank(&normalized, candidates, k))
    }
}

/// Lowercase the query and strip wrapper phrasing so the heuristics see the
/// user's intent.
fn normalize_query(query: &str) -> String {
    let mut q = query.to_lowercase().trim().to_string();
    for (prefix, replacement) in QUERY_PREFIXES {
        if let Some(rest) = q.strip_prefix(prefix) {
            q = format!("{replacement}{rest}");
        }
    }
    q
}

/// Lowercase alphanumeric/underscore runs of length > 1.
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
    tokens.retain(|t| t.len() > 1);
    tokens
}

fn significant_tokens(query: &str) -> Vec<String> {
    tokenize(query)
        .into_iter()
        .filter(|t| t.len() > 2 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Fraction of query tokens present verbatim in the text.
fn overlap_score(query: &str, text: &str) -> f64 {
    let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let text_tokens: HashSet<String> = tokenize(text).into_iter().collect();
    let matches = query_tokens.intersection(&text_tokens).count();
    matches as f64 / query_tokens.len() as f64
}

/// Fraction of significant query tokens found in the text, counting partial
/// identifier matches (substring in either direction) for tokens of length
/// ≥ 4 — "welcome" finds `openWelcome`.
fn keyword_coverage(query: &str, text: &str) -> f64 {
    let significant = significant_tokens(query);
    if significant.is_empty() {
        return 0.0;
    }
    let text_tokens = tokenize(text);
    let text_set: HashSet<&str> = text_tokens.iter().map(String::as_str).collect();

    let mut matches = 0usize;
    for token in &significant {
        if text_set.contains(token.as_str()) {
            matches += 1;
            continue;
        }
        if token.len() >= 4
            && text_tokens
                .iter()
                .any(|tt| tt.contains(token.as_str()) || token.contains(tt.as_str()))
        {
            matches += 1;
        }
    }
    matches as f64 / significant.len() as f64
}

fn is_code_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CODE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_doc_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DOC_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_readme_like(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| {
            let s = s.to_lowercase();
            s == "readme" || s == "changelog"
        })
        .unwrap_or(false)
}

fn is_implementation_intent(query: &str) -> bool {
    ["where", "implemented", "implementation", "register", "command", "function", "class"]
        .iter()
        .any(|needle| query.contains(needle))
}

fn is_doc_intent(query: &str) -> bool {
    ["readme", "docs", "documentation"]
        .iter()
        .any(|needle| query.contains(needle))
}

/// Blend raw similarity with lexical signals and intent heuristics, then
/// deduplicate to the best chunk per file.
fn rerank(query: &str, candidates: Vec<SearchHit>, k: usize) -> Vec<SearchResult> {
    let impl_intent = is_implementation_intent(query);
    let doc_intent = is_doc_intent(query);
    let query_tokens = tokenize(query);
    let significant = significant_tokens(query);
    let asks_for_command = query_tokens.iter().any(|t| t == "command");
    let asks_for_register = query_tokens
        .iter()
        .any(|t| t == "register" || t == "registered");

    let mut scored: Vec<(f64, SearchHit)> = candidates
        .into_iter()
        .map(|hit| {
            let path = PathBuf::from(&hit.metadata.file_path);
            let haystack = format!("{}\n{}", hit.metadata.file_path, hit.text);
            let lexical = overlap_score(query, &haystack);
            let coverage = keyword_coverage(query, &haystack);

            let mut score = hit.score * 0.72 + lexical * 0.10 + coverage * 0.45;

            // Generic bonus when most significant query terms appear together.
            if significant.len() >= 2 && coverage >= 0.66 {
                score += 0.12;
            }

            // Prefer source code for "where/how implemented" questions.
            if impl_intent {
                if is_code_path(&path) {
                    score += 0.12;
                }
                if is_doc_path(&path) {
                    score -= 0.45;
                }
                if asks_for_command && coverage > 0.0 && COMMAND_CALL.is_match(&hit.text) {
                    score += 0.22;
                }
                if asks_for_register && REGISTER_CALL.is_match(&hit.text) {
                    score += 0.10;
                }
                match hit.metadata.kind {
                    Some(ChunkKind::Symbol) => score += 0.10,
                    Some(ChunkKind::Heading) | Some(ChunkKind::Comment) => score -= 0.08,
                    _ => {}
                }
                if let Some(symbol) = &hit.metadata.symbol_name {
                    if SYMBOL_HINT.is_match(symbol) {
                        score += 0.06;
                    }
                }
                let normalized_path = hit.metadata.file_path.replace('\\', "/");
                if normalized_path.starts_with("src/") || normalized_path.contains("/src/") {
                    score += 0.05;
                }
                if is_readme_like(&path) {
                    score -= 0.20;
                }
            }

            // Prefer docs for explicit docs/readme questions.
            if doc_intent {
                if is_doc_path(&path) {
                    score += 0.15;
                }
                if is_code_path(&path) {
                    score -= 0.05;
                }
            }

            (score, hit)
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen_files: HashSet<String> = HashSet::new();
    let mut results = Vec::with_capacity(k);
    for (score, hit) in scored {
        if !seen_files.insert(hit.metadata.file_path.clone()) {
            continue;
        }
        results.push(SearchResult {
            file_path: PathBuf::from(&hit.metadata.file_path),
            line_start: hit.metadata.start_line.unwrap_or(0),
            line_end: hit.metadata.end_line.unwrap_or(0),
            snippet: hit.text,
            score,
            language: hit.metadata.language,
        });
        if results.len() >= k {
            break;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ItemMetadata;

    fn hit(
        file_path: &str,
        text: &str,
        score: f64,
        kind: Option<ChunkKind>,
        symbol_name: Option<&str>,
    ) -> SearchHit {
        SearchHit {
            id: format!("{file_path}#0"),
            text: text.into(),
            score,
            metadata: ItemMetadata {
                file_path: file_path.into(),
                kind,
                symbol_name: symbol_name.map(str::to_string),
                language: None,
                start_line: Some(1),
                end_line: Some(5),
                extra: Default::default(),
            },
        }
    }

    #[test]
    fn normalize_strips_boilerplate_prefixes() {
        assert_eq!(
            normalize_query("Search this codebase for token parsing"),
            "token parsing"
        );
        assert_eq!(
            normalize_query("find where sessions expire"),
            "where sessions expire"
        );
        assert_eq!(
            normalize_query("Answer from codebase: how are errors logged"),
            "how are errors logged"
        );
        assert_eq!(normalize_query("plain query"), "plain query");
    }

    #[test]
    fn tokenize_keeps_identifier_runs() {
        let tokens = tokenize("Where is registerCommand(x) called?");
        assert_eq!(tokens, ["where", "is", "registercommand", "called"]);
    }

    #[test]
    fn overlap_score_is_fraction_of_query_tokens() {
        let score = overlap_score("token parser", "the token stream feeds the parser");
        assert!((score - 1.0).abs() < 1e-9);
        let score = overlap_score("token parser", "only token here");
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn keyword_coverage_counts_partial_identifier_matches() {
        // "welcome" is found inside "openwelcome" via substring containment.
        let score = keyword_coverage("open the welcome panel", "function openWelcome() {}");
        assert!(score > 0.5, "score: {score}");
    }

    #[test]
    fn no_significant_tokens_disables_coverage() {
        // Every token is a stop word or too short.
        assert_eq!(keyword_coverage("where is the", "anything at all"), 0.0);
    }

    #[test]
    fn rerank_dedupes_by_file_and_caps_at_k() {
        let candidates = vec![
            hit("src/a.rs", "fn one() {}", 0.9, Some(ChunkKind::Symbol), None),
            hit("src/a.rs", "fn two() {}", 0.8, Some(ChunkKind::Symbol), None),
            hit("src/b.rs", "fn three() {}", 0.7, Some(ChunkKind::Symbol), None),
            hit("src/c.rs", "fn four() {}", 0.6, Some(ChunkKind::Symbol), None),
        ];
        let results = rerank("plain unrelated words", candidates, 2);

        assert_eq!(results.len(), 2);
        let files: HashSet<_> = results.iter().map(|r| r.file_path.clone()).collect();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn rerank_returns_empty_for_no_candidates() {
        let results = rerank("anything", Vec::new(), 5);
        assert!(results.is_empty());
    }

    #[test]
    fn scores_descend_across_results() {
        let candidates = vec![
            hit("src/a.rs", "alpha beta", 0.2, None, None),
            hit("src/b.rs", "gamma delta", 0.9, None, None),
            hit("src/c.rs", "epsilon zeta", 0.5, None, None),
        ];
        let results = rerank("unrelated", candidates, 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn symbol_chunk_with_literal_match_outranks_higher_similarity_readme() {
        let candidates = vec![
            hit(
                "README.md",
                "# Commands\n\nThis extension registers several commands for searching.",
                0.9,
                Some(ChunkKind::Heading),
                None,
            ),
            hit(
                "src/extension.ts",
                "export function activate() {\n  vscode.commands.registerCommand('demo.open', run);\n}",
                0.5,
                Some(ChunkKind::Symbol),
                Some("activate"),
            ),
        ];
        let results = rerank("where is registercommand implemented", candidates, 2);
        assert_eq!(results[0].file_path, PathBuf::from("src/extension.ts"));
    }

    #[test]
    fn doc_intent_prefers_documentation_files() {
        let candidates = vec![
            hit("src/lib.rs", "pub fn setup() {}", 0.6, Some(ChunkKind::Symbol), None),
            hit("docs/guide.md", "Setup instructions for the project.", 0.55, None, None),
        ];
        let results = rerank("docs about setup", candidates, 2);
        assert_eq!(results[0].file_path, PathBuf::from("docs/guide.md"));
    }

    #[test]
    fn strong_coverage_bonus_requires_two_significant_tokens() {
        let one_token = rerank(
            "parser",
            vec![hit("src/p.rs", "the parser module", 0.5, None, None)],
            1,
        );
        let two_tokens = rerank(
            "parser module",
            vec![hit("src/p.rs", "the parser module", 0.5, None, None)],
            1,
        );
        assert!(two_tokens[0].score > one_token[0].score);
    }

    #[test]
    fn engine_query_is_end_to_end_with_hashing_embedder() {
        use crate::embedding::Embedder;
        use crate::store::{StoredItem, VectorStore};
        use recall_core::EmbeddingConfig;

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let embedder = Embedder::from_config(&EmbeddingConfig {
                provider: "hashing".into(),
                ..EmbeddingConfig::default()
            });

            let mut store = VectorStore::open(dir.path());
            store.initialize().unwrap();
            for (path, text) in [
                ("src/auth.rs", "pub fn validate_token(token: &str) -> bool { !token.is_empty() }"),
                ("src/db.rs", "pub fn connect(url: &str) -> Connection { Connection::open(url) }"),
            ] {
                let embedding = embedder.embed_document(text).await.unwrap();
                store
                    .insert(StoredItem {
                        id: format!("{path}#0"),
                        text: text.into(),
                        embedding,
                        metadata: ItemMetadata {
                            file_path: path.into(),
                            kind: Some(ChunkKind::Symbol),
                            ..ItemMetadata::default()
                        },
                    })
                    .unwrap();
            }

            let engine = RetrievalEngine::new(&store, &embedder);
            let results = engine.query("where is validate_token implemented", 2).await.unwrap();

            assert!(!results.is_empty());
            assert_eq!(results[0].file_path, PathBuf::from("src/auth.rs"));
        });
    }
}
