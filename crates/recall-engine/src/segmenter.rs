//! Heuristic line-based segmentation of source and prose files.
//!
//! Walks a file's lines, classifying each as a heading, a symbol-definition
//! start, a comment, or free-form block content, then closes segments at
//! logical boundaries instead of arbitrary cut points. A split pass caps
//! oversized segments at line granularity and a merge pass coalesces small
//! adjacent blocks. Token counts are whitespace word counts, a cheap proxy
//! for model tokenization.
//!
//! Symbol detection is an ordered table of best-effort regex rules, not a
//! parser: a missed declaration degrades a `symbol` chunk to a `block` chunk
//! and nothing else changes.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use recall_core::{ChunkKind, SegmenterConfig};

/// A contiguous, kind-tagged span of a file's lines sized for embedding.
///
/// # Examples
///
/// ```
/// use recall_core::ChunkKind;
/// use recall_engine::segmenter::Chunk;
///
/// let chunk = Chunk {
///     text: "fn main() {}".into(),
///     start_line: 1,
///     end_line: 1,
///     kind: ChunkKind::Symbol,
///     symbol_name: Some("main".into()),
///     language: "rust".into(),
/// };
/// assert_eq!(chunk.symbol_name.as_deref(), Some("main"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Trimmed chunk text.
    pub text: String,
    /// First line of the chunk (1-indexed).
    pub start_line: u32,
    /// Last line of the chunk (1-indexed).
    pub end_line: u32,
    /// Structural kind of the chunk.
    pub kind: ChunkKind,
    /// Captured symbol name, when a symbol rule matched with a name group.
    pub symbol_name: Option<String>,
    /// Language tag detected from the file extension.
    pub language: String,
}

/// Detect a language tag from a file extension.
///
/// Static mapping; unknown extensions map to `"text"`. The tag is carried as
/// chunk metadata and selects which symbol rules apply — it does not change
/// the segmentation algorithm itself.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use recall_engine::segmenter::language_tag;
///
/// assert_eq!(language_tag(Path::new("src/main.rs")), "rust");
/// assert_eq!(language_tag(Path::new("README.md")), "markdown");
/// assert_eq!(language_tag(Path::new("notes.unknown")), "text");
/// ```
pub fn language_tag(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match ext {
        "rs" => "rust",
        "py" => "python",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "scala" => "scala",
        "sh" | "bash" => "shell",
        "md" | "markdown" => "markdown",
        "json" => "json",
        "yml" | "yaml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "sql" => "sql",
        _ => "text",
    }
}

/// One entry in the ordered symbol-detection table.
///
/// An empty `languages` slice applies the rule everywhere. Capture group 1,
/// when present and matched, is the symbol name. Adding a language means
/// adding rules here, never touching the segmentation walk.
struct SymbolRule {
    languages: &'static [&'static str],
    pattern: Regex,
}

static SYMBOL_RULES: LazyLock<Vec<SymbolRule>> = LazyLock::new(|| {
    let rule = |languages: &'static [&'static str], pattern: &str| SymbolRule {
        languages,
        pattern: Regex::new(pattern).expect("symbol rule pattern"),
    };
    vec![
        rule(
            &["rust"],
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)",
        ),
        rule(
            &["rust"],
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+([A-Za-z_][A-Za-z0-9_]*)",
        ),
        rule(
            &["rust"],
            r"^\s*impl(?:<[^>]*>)?\s+(?:[\w:<>,&'\s]+\s+for\s+)?([A-Za-z_][A-Za-z0-9_]*)",
        ),
        rule(
            &["javascript", "typescript", "php"],
            r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][A-Za-z0-9_$]*)",
        ),
        rule(
            &["javascript", "typescript"],
            r"^\s*(?:export\s+)?const\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:async\s+)?\(",
        ),
        rule(
            &["typescript"],
            r"^\s*(?:export\s+)?type\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=",
        ),
        rule(
            &["python", "ruby"],
            r"^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)",
        ),
        rule(
            &["go", "swift"],
            r"^\s*func\s+(?:\([^)]*\)\s*)?([A-Za-z_][A-Za-z0-9_]*)",
        ),
        rule(
            &["java", "csharp", "scala", "kotlin"],
            r"^\s*(?:public|private|protected|internal)\s+(?:static\s+)?(?:final\s+)?[\w<>\[\],\s]+\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(",
        ),
        rule(&["ruby"], r"^\s*module\s+([A-Z][A-Za-z0-9_]*)"),
        // Generic fallbacks shared across languages.
        rule(
            &[],
            r"^\s*(?:export\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)",
        ),
        rule(
            &[],
            r"^\s*(?:export\s+)?interface\s+([A-Za-z_$][A-Za-z0-9_$]*)",
        ),
    ]
});

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+\S").expect("heading pattern"));

enum LineClass {
    Heading,
    Symbol(Option<String>),
    Comment,
    Blank,
    Plain,
}

fn classify(line: &str, language: &str) -> LineClass {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineClass::Blank;
    }
    if HEADING.is_match(trimmed) {
        return LineClass::Heading;
    }
    for rule in SYMBOL_RULES.iter() {
        if !rule.languages.is_empty() && !rule.languages.contains(&language) {
            continue;
        }
        if let Some(caps) = rule.pattern.captures(line) {
            let name = caps.get(1).map(|m| m.as_str().to_string());
            return LineClass::Symbol(name);
        }
    }
    if trimmed.starts_with("//")
        || trimmed.starts_with('#')
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*')
        || trimmed.starts_with("--")
    {
        return LineClass::Comment;
    }
    LineClass::Plain
}

fn count_tokens(line: &str) -> usize {
    line.split_whitespace().count()
}

#[derive(Debug, Clone)]
struct Segment {
    kind: ChunkKind,
    symbol_name: Option<String>,
    start_line: u32,
    lines: Vec<String>,
    tokens: usize,
}

impl Segment {
    fn open(kind: ChunkKind, symbol_name: Option<String>, start_line: u32, line: &str) -> Self {
        Self {
            kind,
            symbol_name,
            start_line,
            lines: vec![line.to_string()],
            tokens: count_tokens(line),
        }
    }

    fn push(&mut self, line: &str) {
        self.tokens += count_tokens(line);
        self.lines.push(line.to_string());
    }

    fn end_line(&self) -> u32 {
        self.start_line + self.lines.len() as u32 - 1
    }
}

fn close(open: &mut Option<Segment>, segments: &mut Vec<Segment>) {
    if let Some(seg) = open.take() {
        segments.push(seg);
    }
}

/// First pass: one segment per logical region, partitioning the file's lines
/// exactly (no gaps, no overlaps).
fn raw_segments(lines: &[&str], language: &str, config: &SegmenterConfig) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut open: Option<Segment> = None;

    for (idx, line) in lines.iter().enumerate() {
        let lineno = idx as u32 + 1;
        match classify(line, language) {
            LineClass::Heading => {
                close(&mut open, &mut segments);
                // Headings are single-line: the following text opens a fresh
                // segment so a title never swallows its section body.
                segments.push(Segment::open(ChunkKind::Heading, None, lineno, line));
            }
            LineClass::Symbol(name) => {
                close(&mut open, &mut segments);
                open = Some(Segment::open(ChunkKind::Symbol, name, lineno, line));
            }
            LineClass::Blank => {
                let mut should_close = false;
                if let Some(seg) = open.as_mut() {
                    seg.push(line);
                    should_close =
                        seg.kind == ChunkKind::Block && seg.tokens >= config.min_tokens;
                } else {
                    open = Some(Segment::open(ChunkKind::Block, None, lineno, line));
                }
                if should_close {
                    close(&mut open, &mut segments);
                }
            }
            LineClass::Comment => {
                if let Some(seg) = open.as_mut() {
                    seg.push(line);
                } else {
                    open = Some(Segment::open(ChunkKind::Comment, None, lineno, line));
                }
            }
            LineClass::Plain => {
                if let Some(seg) = open.as_mut() {
                    seg.push(line);
                } else {
                    open = Some(Segment::open(ChunkKind::Block, None, lineno, line));
                }
            }
        }
    }

    close(&mut open, &mut segments);
    segments
}

/// Split any segment over `max_tokens` into consecutive line-granular
/// sub-segments, each at most `max_tokens`, preserving kind and symbol tag.
/// A single line that alone exceeds the maximum stays one oversized segment.
fn split_pass(segments: Vec<Segment>, max_tokens: usize) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());

    for seg in segments {
        if seg.tokens <= max_tokens {
            out.push(seg);
            continue;
        }

        let mut sub = Segment::open(
            seg.kind,
            seg.symbol_name.clone(),
            seg.start_line,
            &seg.lines[0],
        );
        for (i, line) in seg.lines.iter().enumerate().skip(1) {
            let tokens = count_tokens(line);
            if sub.tokens + tokens > max_tokens {
                let next = Segment::open(
                    seg.kind,
                    seg.symbol_name.clone(),
                    seg.start_line + i as u32,
                    line,
                );
                out.push(std::mem::replace(&mut sub, next));
            } else {
                sub.push(line);
            }
        }
        out.push(sub);
    }

    out
}

/// Merge consecutive `block` segments whose combined token count stays within
/// `max_tokens`. Never merges across a symbol/heading/comment boundary, and
/// by construction never re-exceeds the maximum.
fn merge_pass(segments: Vec<Segment>, max_tokens: usize) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());

    for seg in segments {
        if let Some(last) = out.last_mut() {
            if last.kind == ChunkKind::Block
                && seg.kind == ChunkKind::Block
                && last.tokens + seg.tokens <= max_tokens
            {
                last.tokens += seg.tokens;
                last.lines.extend(seg.lines);
                continue;
            }
        }
        out.push(seg);
    }

    out
}

/// Segment a file into embedding-sized chunks.
///
/// The path is used only for language-tag lookup; segmentation itself is
/// language-independent apart from which symbol rules apply. Chunks are
/// returned in ascending line order; chunks whose text is empty after
/// trimming are dropped.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use recall_core::{ChunkKind, SegmenterConfig};
/// use recall_engine::segmenter::segment_file;
///
/// let chunks = segment_file(
///     Path::new("src/auth.rs"),
///     "pub fn validate(token: &str) -> bool {\n    !token.is_empty()\n}\n",
///     &SegmenterConfig::default(),
/// );
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].kind, ChunkKind::Symbol);
/// assert_eq!(chunks[0].symbol_name.as_deref(), Some("validate"));
/// ```
pub fn segment_file(path: &Path, content: &str, config: &SegmenterConfig) -> Vec<Chunk> {
    let language = language_tag(path);
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let segments = raw_segments(&lines, language, config);
    let segments = split_pass(segments, config.max_tokens);
    let segments = merge_pass(segments, config.max_tokens);

    segments
        .into_iter()
        .filter_map(|seg| {
            let end_line = seg.end_line();
            let text = seg.lines.join("\n");
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(Chunk {
                text: trimmed.to_string(),
                start_line: seg.start_line,
                end_line,
                kind: seg.kind,
                symbol_name: seg.symbol_name,
                language: language.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> SegmenterConfig {
        SegmenterConfig {
            min_tokens: 5,
            max_tokens: 20,
        }
    }

    #[test]
    fn raw_segments_partition_the_file_exactly() {
        let content = "\
# Title

fn alpha() {
    body();
}
// trailing comment
plain text tail";
        let lines: Vec<&str> = content.lines().collect();
        let segments = raw_segments(&lines, "rust", &tiny_config());

        // Ranges are ascending, adjacent, and cover every line once.
        let mut expected_start = 1;
        for seg in &segments {
            assert_eq!(seg.start_line, expected_start);
            expected_start = seg.end_line() + 1;
        }
        assert_eq!(expected_start, lines.len() as u32 + 1);

        // Joining segment lines reconstructs the original content.
        let rejoined: Vec<String> = segments
            .iter()
            .flat_map(|s| s.lines.iter().cloned())
            .collect();
        assert_eq!(rejoined.join("\n"), content);
    }

    #[test]
    fn markdown_heading_and_paragraph_make_two_chunks() {
        let paragraph = "lorem ipsum dolor sit amet\n".repeat(9);
        let content = format!("# Heading\n{paragraph}");
        let chunks = segment_file(
            Path::new("README.md"),
            &content,
            &SegmenterConfig::default(),
        );

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Heading);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 1));
        assert_eq!(chunks[1].kind, ChunkKind::Block);
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (2, 10));
    }

    #[test]
    fn symbol_rules_capture_names_across_languages() {
        let cases = [
            ("a.rs", "pub async fn fetch_user(id: u64) {}", "fetch_user"),
            ("a.rs", "struct Config {", "Config"),
            ("a.py", "def process(data):", "process"),
            (
                "a.go",
                "func (s *Server) Handle(w http.ResponseWriter) {",
                "Handle",
            ),
            (
                "a.ts",
                "export function registerCommand(id: string) {",
                "registerCommand",
            ),
            ("a.ts", "export const openWelcome = async () => {", "openWelcome"),
            ("a.java", "public static void main(String[] args) {", "main"),
            ("a.js", "class EventBus {", "EventBus"),
        ];
        for (file, line, expected) in cases {
            let chunks = segment_file(Path::new(file), line, &SegmenterConfig::default());
            assert_eq!(chunks.len(), 1, "line: {line}");
            assert_eq!(chunks[0].kind, ChunkKind::Symbol, "line: {line}");
            assert_eq!(
                chunks[0].symbol_name.as_deref(),
                Some(expected),
                "line: {line}"
            );
        }
    }

    #[test]
    fn unmatched_declaration_degrades_to_block() {
        // A declaration shape no rule covers stays a well-formed block chunk.
        let chunks = segment_file(
            Path::new("a.zig"),
            "pub fn weird() void {}",
            &SegmenterConfig::default(),
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Block);
        assert!(chunks[0].symbol_name.is_none());
    }

    #[test]
    fn blank_line_closes_block_only_past_min_tokens() {
        let config = tiny_config();

        // Two words before the blank: below min_tokens, blank is absorbed.
        let small = "alpha beta\n\ngamma delta\n";
        let chunks = segment_file(Path::new("a.txt"), small, &config);
        assert_eq!(chunks.len(), 1);

        // Eleven words per paragraph: past min_tokens the blank closes, and
        // 11 + 11 > max_tokens keeps the merge pass from re-joining them.
        let para = "one two three four five six seven eight nine ten eleven";
        let big = format!("{para}\n\n{para}\n");
        let chunks = segment_file(Path::new("a.txt"), &big, &config);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn small_blocks_merge_back_within_max_tokens() {
        let config = tiny_config();
        // Paragraphs of 6 tokens close on blanks but re-merge while the
        // combined count stays within max_tokens.
        let content = "one two three four five six\n\nseven eight nine ten eleven twelve\n";
        let chunks = segment_file(Path::new("a.txt"), content, &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Block);
    }

    #[test]
    fn split_pass_caps_segments_at_max_tokens() {
        let config = tiny_config();
        // 12 lines of 4 tokens each = 48 tokens in one block, max is 20.
        let content = "tok tok tok tok\n".repeat(12);
        let lines: Vec<&str> = content.lines().collect();
        let segments = split_pass(raw_segments(&lines, "text", &config), config.max_tokens);

        assert!(segments.len() > 1);
        for seg in &segments {
            assert!(seg.tokens <= config.max_tokens, "tokens: {}", seg.tokens);
        }
    }

    #[test]
    fn split_preserves_symbol_tag_and_line_ranges() {
        let config = tiny_config();
        let body = "    call(one, two, three);\n".repeat(10);
        let content = format!("fn big_function() {{\n{body}}}\n");
        let chunks = segment_file(Path::new("a.rs"), &content, &config);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.kind, ChunkKind::Symbol);
            assert_eq!(chunk.symbol_name.as_deref(), Some("big_function"));
        }
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_line, pair[0].end_line + 1);
        }
    }

    #[test]
    fn single_overlong_line_stays_one_chunk() {
        let config = tiny_config();
        let long_line = "word ".repeat(50);
        let chunks = segment_file(Path::new("a.txt"), long_line.trim_end(), &config);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn merge_pass_is_maximal_for_adjacent_blocks() {
        let config = tiny_config();
        // Five 6-token paragraphs close on blanks; the merge pass coalesces
        // runs of them up to max_tokens, so any two adjacent survivors must
        // jointly exceed it.
        let content = "one two three four five six\n\n".repeat(5);
        let chunks = segment_file(Path::new("a.txt"), &content, &config);

        assert!(chunks.len() >= 2);
        for pair in chunks.windows(2) {
            let combined = pair[0].text.split_whitespace().count()
                + pair[1].text.split_whitespace().count();
            assert!(combined > config.max_tokens, "combined: {combined}");
        }
    }

    #[test]
    fn merge_never_crosses_symbol_or_heading_boundaries() {
        let config = tiny_config();
        let content = "intro words here\n# Title\nmore words after\n";
        let chunks = segment_file(Path::new("a.md"), content, &config);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].kind, ChunkKind::Heading);
    }

    #[test]
    fn empty_file_produces_no_chunks() {
        let chunks = segment_file(Path::new("a.rs"), "", &SegmenterConfig::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn whitespace_only_file_produces_no_chunks() {
        let chunks = segment_file(Path::new("a.txt"), "\n\n   \n", &SegmenterConfig::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn comment_run_opens_a_comment_chunk() {
        let content = "// first line\n// second line\nfn after() {}\n";
        let chunks = segment_file(Path::new("a.rs"), content, &SegmenterConfig::default());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Comment);
        assert_eq!(chunks[1].kind, ChunkKind::Symbol);
    }

    #[test]
    fn language_tag_is_attached_to_chunks() {
        let chunks = segment_file(
            Path::new("script.py"),
            "def run():\n    pass\n",
            &SegmenterConfig::default(),
        );
        assert_eq!(chunks[0].language, "python");
    }
}
