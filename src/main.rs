use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use recall_core::OutputFormat;
use recall_engine::embedding::Embedder;
use recall_engine::ingest::ingest_workspace;
use recall_engine::notes::{save_note, search_notes};
use recall_engine::search::RetrievalEngine;
use recall_engine::store::VectorStore;
use recall_engine::summary::project_summary;

#[derive(Parser)]
#[command(
    name = "recall",
    version,
    about = "Local semantic code memory for your workspace",
    long_about = "Recall indexes a workspace's code and prose into a local vector store and\n\
                   answers plain-English questions about it. Everything stays on disk under\n\
                   the workspace's .recall/ directory; no service, no database.\n\n\
                   Examples:\n  \
                     recall index --path .             Build the workspace index\n  \
                     recall search 'where is auth'     Ask where something lives\n  \
                     recall remember 'staging db is on port 5433'\n  \
                     recall summary                    Skim representative chunks\n  \
                     recall status                     Check setup and index health"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .recall.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Build the semantic index for a workspace
    #[command(long_about = "Build the semantic index for a workspace.\n\n\
        Walks text and code files (gitignore-aware), segments them into chunks,\n\
        embeds each chunk, and writes the index under <path>/.recall/index.json.\n\
        A populated index is left untouched unless --force rebuilds it.\n\n\
        Examples:\n  recall index\n  recall index --path ../other --force")]
    Index {
        /// Workspace root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Reset the index and rebuild from scratch
        #[arg(long)]
        force: bool,
    },
    /// Search the workspace semantically
    #[command(long_about = "Search the workspace with a plain-English query.\n\n\
        Blends vector similarity with lexical and intent signals, then returns\n\
        the best chunk per file. Index the workspace first with 'recall index'.\n\n\
        Examples:\n  recall search 'where is the token validated'\n  recall search 'docs about configuration' --limit 3")]
    Search {
        /// Search query
        query: String,

        /// Workspace root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Maximum results to return (default: 5)
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Save a free-text note into the workspace memory
    #[command(long_about = "Save a free-text note into the workspace memory.\n\n\
        Notes live in their own collection (.recall/notes.json) and are searched\n\
        with 'recall notes'. A --key makes the note addressable; otherwise a\n\
        timestamp key is generated.\n\n\
        Examples:\n  recall remember 'auth tokens rotate monthly' --tag infra\n  recall remember 'deploy window is friday' --key deploy-policy")]
    Remember {
        /// Note text
        note: String,

        /// Tag the note (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Explicit note key (default: generated timestamp key)
        #[arg(long)]
        key: Option<String>,

        /// Workspace root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Search saved notes
    #[command(long_about = "Search saved notes by similarity.\n\n\
        Examples:\n  recall notes 'database port'\n  recall notes 'deploy policy' --limit 3")]
    Notes {
        /// Search query
        query: String,

        /// Workspace root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Maximum notes to return (default: 5)
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Summarize the indexed workspace from representative chunks
    #[command(long_about = "Summarize the indexed workspace.\n\n\
        Queries the index with a generic overview query and joins the top\n\
        chunks into a short digest.\n\n\
        Example:\n  recall summary --chunks 8")]
    Summary {
        /// Workspace root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Number of chunks to draw from (default: 5)
        #[arg(long, default_value = "5")]
        chunks: usize,
    },
    /// Check your Recall setup, index, and embedding provider
    #[command(long_about = "Check your Recall setup and environment.\n\n\
        Reports config file, embedding provider and key, index and notes store\n\
        health, and the active embedding runtime. Use --warmup to exercise the\n\
        provider once, and --format json for machine-readable output.")]
    Status {
        /// Workspace root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Exercise the embedding provider before reporting
        #[arg(long)]
        warmup: bool,
    },
    /// Create a default .recall.toml configuration file
    #[command(long_about = "Create a default .recall.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .recall.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!(
            "\x1b[1m\x1b[35m◆\x1b[0m \x1b[1mrecall\x1b[0m v{version} — local semantic memory for your workspace\n"
        );

        println!("Quick start:");
        println!("  \x1b[36mrecall index\x1b[0m                    Build the workspace index");
        println!("  \x1b[36mrecall search 'where is auth'\x1b[0m   Ask where something lives");
        println!("  \x1b[36mrecall status\x1b[0m                   Check setup and index health\n");

        println!("All commands:");
        println!("  \x1b[32mindex\x1b[0m     Segment, embed, and store the workspace");
        println!("  \x1b[32msearch\x1b[0m    Hybrid semantic + lexical search");
        println!("  \x1b[32mremember\x1b[0m  Save a free-text note");
        println!("  \x1b[32mnotes\x1b[0m     Search saved notes");
        println!("  \x1b[32msummary\x1b[0m   Digest of representative chunks");
        println!("  \x1b[32mstatus\x1b[0m    Check setup and environment");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("recall v{version} — local semantic memory for your workspace\n");

        println!("Quick start:");
        println!("  recall index                    Build the workspace index");
        println!("  recall search 'where is auth'   Ask where something lives");
        println!("  recall status                   Check setup and index health\n");

        println!("All commands:");
        println!("  index     Segment, embed, and store the workspace");
        println!("  search    Hybrid semantic + lexical search");
        println!("  remember  Save a free-text note");
        println!("  notes     Search saved notes");
        println!("  summary   Digest of representative chunks");
        println!("  status    Check setup and environment");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'recall <command> --help' for details.");
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

async fn run_status(
    config: &recall_core::RecallConfig,
    path: &std::path::Path,
    warmup: bool,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. Config file
    let config_path = std::path::Path::new(".recall.toml");
    if config_path.exists() {
        checks.push(CheckResult::pass("config_file", ".recall.toml found"));
    } else {
        checks.push(CheckResult::fail(
            "config_file",
            ".recall.toml not found",
            "run 'recall init' to create a default config",
        ));
    }

    // 2. Embedding provider + key
    let provider = &config.embedding.provider;
    if provider == "hashing" {
        checks.push(CheckResult::pass(
            "embedding_provider",
            "hashing (offline, deterministic)",
        ));
    } else {
        checks.push(CheckResult::pass(
            "embedding_provider",
            format!("{provider} (model: {})", config.embedding.model),
        ));
        if config.embedding.api_key.is_some() || std::env::var("VOYAGE_API_KEY").is_ok() {
            checks.push(CheckResult::pass("embedding_api_key", "VOYAGE_API_KEY set"));
        } else {
            checks.push(CheckResult::fail(
                "embedding_api_key",
                "VOYAGE_API_KEY not set",
                "export VOYAGE_API_KEY=... or set api_key in .recall.toml [embedding]; the hashing fallback is used meanwhile",
            ));
        }
    }

    // 3. Index store
    let mut index = VectorStore::open(path);
    index.initialize().into_diagnostic()?;
    let index_status = index.status();
    if index_status.items > 0 {
        checks.push(CheckResult::pass(
            "index_store",
            format!("{} chunks indexed", index_status.items),
        ));
    } else {
        checks.push(CheckResult::info(
            "index_store",
            "empty (run 'recall index' to build)",
        ));
    }
    if index_status.degraded {
        checks.push(CheckResult::fail(
            "index_persistence",
            index_status
                .note
                .unwrap_or_else(|| "persistence degraded".into()),
            "check permissions on the .recall directory",
        ));
    }

    // 4. Notes store
    let mut notes = VectorStore::notes(path);
    notes.initialize().into_diagnostic()?;
    let notes_count = notes.len();
    if notes_count > 0 {
        checks.push(CheckResult::pass(
            "notes_store",
            format!("{notes_count} notes saved"),
        ));
    } else {
        checks.push(CheckResult::info("notes_store", "no notes saved"));
    }

    // 5. Embedding runtime
    let embedder = Embedder::from_config(&config.embedding);
    if warmup {
        match embedder.warmup().await {
            Ok(()) => checks.push(CheckResult::pass("embedding_warmup", "probe succeeded")),
            Err(err) => checks.push(CheckResult::fail(
                "embedding_warmup",
                format!("probe failed: {err}"),
                "check the API key and network, or switch provider to 'hashing'",
            )),
        }
    }
    let status = embedder.status();
    let mut detail = format!("provider={} dim={}", status.provider, status.dimensions);
    if let Some(model) = &status.model {
        detail.push_str(&format!(" model={model}"));
    }
    if status.fallback {
        detail.push_str(" fallback=active");
    }
    if status.last_error.is_some() {
        detail.push_str(" lastError=present");
    }
    checks.push(CheckResult::info("embedding_runtime", detail));

    // Output
    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "embedding": embedder.status(),
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            let version = env!("CARGO_PKG_VERSION");
            println!("Recall v{version} — Environment Check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<20} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

fn ingest_spinner() -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::with_template("{spinner:.magenta} {msg} ({elapsed})")
            .expect("spinner template"),
    );
    pb.set_message("Indexing workspace...");
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn print_search_results(results: &[recall_core::SearchResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(results).into_diagnostic()?
            );
        }
        OutputFormat::Markdown => {
            if results.is_empty() {
                println!("No results found.");
            } else {
                println!("# Search Results\n");
                for (i, r) in results.iter().enumerate() {
                    let lang = r.language.as_deref().unwrap_or("text");
                    println!(
                        "## {}. `{}:{}–{}` (score: {:.4})\n\n```{lang}\n{}\n```\n",
                        i + 1,
                        r.file_path.display(),
                        r.line_start,
                        r.line_end,
                        r.score,
                        r.snippet,
                    );
                }
            }
        }
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No results found.");
            } else {
                for (i, r) in results.iter().enumerate() {
                    println!(
                        "{}. {}:{}–{} (score: {:.4})",
                        i + 1,
                        r.file_path.display(),
                        r.line_start,
                        r.line_end,
                        r.score,
                    );
                    // Show a snippet preview (first 3 lines)
                    let preview: String = r
                        .snippet
                        .lines()
                        .take(3)
                        .map(|l| format!("   {l}"))
                        .collect::<Vec<_>>()
                        .join("\n");
                    println!("{preview}\n");
                }
            }
        }
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Recall Configuration
# See: https://github.com/recall-dev/recall

[embedding]
# provider = "voyage"        # "voyage" (remote) or "hashing" (offline, deterministic)
# model = "voyage-code-3"
# dimensions = 1024
# api_key = "..."            # or set VOYAGE_API_KEY

[segmenter]
# min_tokens = 160           # blank lines close a block only past this
# max_tokens = 320           # larger segments are split at line granularity
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        "recall=debug,recall_engine=debug,recall_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => recall_core::RecallConfig::from_file(path).into_diagnostic()?,
        None => {
            let default_path = std::path::Path::new(".recall.toml");
            if default_path.exists() {
                recall_core::RecallConfig::from_file(default_path).into_diagnostic()?
            } else {
                recall_core::RecallConfig::default()
            }
        }
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Index { ref path, force }) => {
            let embedder = Embedder::from_config(&config.embedding);
            let mut store = VectorStore::open(path);

            let spinner = ingest_spinner();
            let report =
                ingest_workspace(&mut store, &embedder, &config.segmenter, path, force).await;
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }
            let report = report.into_diagnostic()?;

            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&report).into_diagnostic()?
                    );
                }
                _ => {
                    if report.reused_existing {
                        println!(
                            "Index already holds {} chunks — use --force to rebuild.",
                            report.chunks_indexed
                        );
                    } else {
                        println!(
                            "Indexed {} chunks from {} files ({} failed, {} seen).",
                            report.chunks_indexed,
                            report.files_indexed,
                            report.files_failed,
                            report.files_seen,
                        );
                    }
                    let status = embedder.status();
                    if status.fallback {
                        println!("Note: embedding fallback active (hashing); set an API key for better results.");
                    }
                }
            }
        }
        Some(Command::Search {
            ref query,
            ref path,
            limit,
        }) => {
            let embedder = Embedder::from_config(&config.embedding);
            let mut store = VectorStore::open(path);
            store.initialize().into_diagnostic()?;

            let engine = RetrievalEngine::new(&store, &embedder);
            let results = engine.query(query, limit).await.into_diagnostic()?;
            print_search_results(&results, cli.format)?;
        }
        Some(Command::Remember {
            ref note,
            ref tags,
            ref key,
            ref path,
        }) => {
            let embedder = Embedder::from_config(&config.embedding);
            let mut store = VectorStore::notes(path);
            let id = save_note(&mut store, &embedder, note, tags, key.as_deref())
                .await
                .into_diagnostic()?;

            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({ "id": id }))
                            .into_diagnostic()?
                    );
                }
                _ => println!("Saved note {id}"),
            }
        }
        Some(Command::Notes {
            ref query,
            ref path,
            limit,
        }) => {
            let embedder = Embedder::from_config(&config.embedding);
            let mut store = VectorStore::notes(path);
            store.initialize().into_diagnostic()?;

            let notes = search_notes(&store, &embedder, query, limit)
                .await
                .into_diagnostic()?;
            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&notes).into_diagnostic()?
                    );
                }
                _ => {
                    if notes.is_empty() {
                        println!("No notes found.");
                    } else {
                        for (i, n) in notes.iter().enumerate() {
                            let tags = if n.tags.is_empty() {
                                String::new()
                            } else {
                                format!(" [{}]", n.tags.join(", "))
                            };
                            println!("{}. {} (score: {:.4}){tags}", i + 1, n.id, n.score);
                            println!("   {}\n", n.text);
                        }
                    }
                }
            }
        }
        Some(Command::Summary { ref path, chunks }) => {
            let embedder = Embedder::from_config(&config.embedding);
            let mut store = VectorStore::open(path);
            store.initialize().into_diagnostic()?;

            let summary = project_summary(&store, &embedder, chunks)
                .await
                .into_diagnostic()?;
            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&summary).into_diagnostic()?
                    );
                }
                OutputFormat::Markdown => {
                    println!("# Project Summary\n");
                    if summary.summary.is_empty() {
                        println!("The index is empty — run `recall index` first.");
                    } else {
                        println!("{}\n", summary.summary);
                        println!("_Drawn from {} chunks._", summary.chunks.len());
                    }
                }
                OutputFormat::Text => {
                    if summary.summary.is_empty() {
                        println!("The index is empty — run 'recall index' first.");
                    } else {
                        println!("{}", summary.summary);
                        println!("\n(drawn from {} chunks)", summary.chunks.len());
                    }
                }
            }
        }
        Some(Command::Status { ref path, warmup }) => {
            run_status(&config, path, warmup, cli.format, use_color).await?;
        }
        Some(Command::Init) => {
            let path = std::path::Path::new(".recall.toml");
            if path.exists() {
                miette::bail!(".recall.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .recall.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "recall", &mut std::io::stdout());
        }
    }

    Ok(())
}
