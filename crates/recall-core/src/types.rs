use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of a segmented chunk.
///
/// Symbol detection is best-effort pattern matching: a missed declaration
/// degrades a would-be `Symbol` chunk to a `Block` chunk, nothing more.
///
/// # Examples
///
/// ```
/// use recall_core::ChunkKind;
///
/// let kind = ChunkKind::Symbol;
/// assert_eq!(kind.to_string(), "symbol");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// A function/class/type declaration and the lines that follow it.
    Symbol,
    /// A markdown-style heading line.
    Heading,
    /// A run of comment lines.
    Comment,
    /// Free-form content with no recognized structure.
    Block,
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkKind::Symbol => write!(f, "symbol"),
            ChunkKind::Heading => write!(f, "heading"),
            ChunkKind::Comment => write!(f, "comment"),
            ChunkKind::Block => write!(f, "block"),
        }
    }
}

/// A result from a semantic workspace search.
///
/// # Examples
///
/// ```
/// use recall_core::SearchResult;
/// use std::path::PathBuf;
///
/// let result = SearchResult {
///     file_path: PathBuf::from("src/db.rs"),
///     line_start: 10,
///     line_end: 25,
///     snippet: "fn connect() { ... }".into(),
///     score: 0.92,
///     language: Some("rust".into()),
/// };
/// assert!(result.score > 0.9);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Path to the file containing the match, relative to the workspace root.
    pub file_path: PathBuf,
    /// First line of the matched chunk.
    pub line_start: u32,
    /// Last line of the matched chunk.
    pub line_end: u32,
    /// The matched chunk text.
    pub snippet: String,
    /// Blended relevance score (descending across a result set).
    pub score: f64,
    /// Language tag of the chunk.
    pub language: Option<String>,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument
/// parsing.
///
/// # Examples
///
/// ```
/// use recall_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
