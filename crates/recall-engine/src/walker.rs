//! Workspace file discovery for ingestion.
//!
//! Walks the workspace honoring `.gitignore`, keeping only known text
//! extensions and skipping binaries, oversized files, lockfiles, and the
//! store directory itself.

use std::path::{Path, PathBuf};

use recall_core::Result;

use crate::store::STORE_DIR;

/// Maximum file size to ingest (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

/// Number of bytes to check for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// Extensions considered indexable text: code plus prose and config formats.
const TEXT_EXTENSIONS: &[&str] = &[
    "rs", "py", "ts", "tsx", "js", "jsx", "mjs", "cjs", "go", "java", "kt", "kts", "c", "h",
    "cpp", "cc", "cxx", "hpp", "cs", "rb", "php", "swift", "scala", "sh", "bash", "md", "txt",
    "json", "yml", "yaml", "toml", "xml", "sql",
];

/// File names never worth embedding.
const SKIP_FILE_NAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    ".DS_Store",
];

/// A file discovered during the workspace walk.
#[derive(Debug, Clone)]
pub struct WorkspaceFile {
    /// Path relative to the workspace root.
    pub path: PathBuf,
    /// Full file content.
    pub content: String,
}

/// Walk a workspace, returning ingestable text files.
///
/// Respects `.gitignore` and skips hidden entries (which also keeps the
/// `.recall` store directory out of its own index), binary content, files
/// larger than 1 MB, and lockfiles. Returned paths are relative to `root`.
///
/// # Errors
///
/// Currently always returns `Ok`; unreadable entries are skipped, matching
/// the per-file isolation the ingestion pipeline guarantees.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use recall_engine::walker::walk_workspace;
///
/// let files = walk_workspace(Path::new(".")).unwrap();
/// for f in &files {
///     println!("{}", f.path.display());
/// }
/// ```
pub fn walk_workspace(root: &Path) -> Result<Vec<WorkspaceFile>> {
    let walker = ignore::WalkBuilder::new(root).build();
    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if SKIP_FILE_NAMES.contains(&name) {
            continue;
        }

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !TEXT_EXTENSIONS.contains(&ext) {
            continue;
        }

        // Defensive double-check: hidden-entry filtering already skips the
        // store directory unless the user walks it directly.
        if path.components().any(|c| c.as_os_str() == STORE_DIR) {
            continue;
        }

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if metadata.len() > MAX_FILE_SIZE {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => continue,
        };

        let check_len = content.len().min(BINARY_CHECK_SIZE);
        if content.as_bytes()[..check_len].contains(&0) {
            continue;
        }

        let relative = match path.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => path.to_path_buf(),
        };

        files.push(WorkspaceFile {
            path: relative,
            content,
        });
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walk_finds_text_files_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("README.md"), "# Hello").unwrap();
        fs::write(root.join("notes.txt"), "plain notes").unwrap();
        fs::write(root.join("photo.png"), [0x89u8, 0x50, 0x4e, 0x47]).unwrap();
        fs::write(root.join("no_extension"), "skipped").unwrap();

        let files = walk_workspace(root).unwrap();
        let mut paths: Vec<String> = files
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect();
        paths.sort();

        assert_eq!(paths, ["README.md", "notes.txt", "src/main.rs"]);
    }

    #[test]
    fn walk_skips_store_directory_and_lockfiles() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join(STORE_DIR)).unwrap();
        fs::write(root.join(STORE_DIR).join("index.json"), "{}").unwrap();
        fs::write(root.join("Cargo.lock"), "[[package]]").unwrap();
        fs::write(root.join("lib.rs"), "pub fn ok() {}").unwrap();

        let files = walk_workspace(root).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("lib.rs"));
    }

    #[test]
    fn walk_respects_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        // The ignore crate needs a .git dir to recognize .gitignore files.
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("build/out.rs"), "fn ignored() {}").unwrap();
        fs::write(root.join(".gitignore"), "build/\n").unwrap();
        fs::write(root.join("kept.rs"), "fn kept() {}").unwrap();

        let files = walk_workspace(root).unwrap();
        for f in &files {
            assert!(
                !f.path.starts_with("build"),
                "gitignored file should be skipped: {}",
                f.path.display()
            );
        }
    }

    #[test]
    fn walk_skips_binary_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let mut binary_content = b"fn main() { ".to_vec();
        binary_content.push(0);
        binary_content.extend_from_slice(b" }");
        fs::write(root.join("binary.rs"), &binary_content).unwrap();

        fs::write(root.join("huge.md"), "x".repeat(1_048_577)).unwrap();
        fs::write(root.join("ok.rs"), "fn ok() {}").unwrap();

        let files = walk_workspace(root).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("ok.rs"));
    }
}
