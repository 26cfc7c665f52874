//! Read-only access to the target codebase for the analysis agents.
//!
//! Everything returned here is model-facing text; failures are reported as
//! `Error: ...` strings rather than Rust errors.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use regex::RegexBuilder;
use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

const ALWAYS_IGNORE: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".next",
    ".nuxt",
    "dist",
    "build",
    ".cache",
    ".turbo",
    "coverage",
    ".pytest_cache",
    ".mypy_cache",
    ".venv",
    "venv",
    "target",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "avif", "woff", "woff2", "ttf", "eot",
    "otf", "zip", "tar", "gz", "br", "mp4", "webm", "mp3", "wav", "pdf", "doc", "docx", "pyc",
    "pyo", "so", "dll", "dylib", "lock",
];

const MANIFESTS: &[&str] = &[
    "package.json",
    "pyproject.toml",
    "Cargo.toml",
    "go.mod",
    "composer.json",
    "Gemfile",
    "pom.xml",
    "build.gradle",
];

/// Files larger than this are never read (1 MB)
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;
pub const MAX_READ_LINES: usize = 500;
pub const MAX_SEARCH_RESULTS: usize = 15;
pub const TREE_DEPTH: usize = 3;
const MAX_MATCH_LINE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub file: String,
    pub line_number: String,
    pub line: String,
}

/// Gitignore-aware reader rooted at one directory.
#[derive(Debug)]
pub struct CodebaseReader {
    root: PathBuf,
    gitignore: Gitignore,
}

fn rel_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Root `.gitignore` rules; an unreadable or invalid file ignores nothing.
fn load_gitignore(root: &Path) -> Gitignore {
    let path = root.join(".gitignore");
    if !path.is_file() {
        return Gitignore::empty();
    }
    let mut builder = GitignoreBuilder::new(root);
    if let Some(e) = builder.add(&path) {
        warn!(error = %e, "Skipping unreadable .gitignore lines");
    }
    match builder.build() {
        Ok(gitignore) => gitignore,
        Err(e) => {
            warn!(error = %e, "Failed to load .gitignore");
            Gitignore::empty()
        }
    }
}

fn is_binary(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| BINARY_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl CodebaseReader {
    pub fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            bail!("Codebase root is not a directory: {}", root.display());
        }
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", root.display()))?;
        let gitignore = load_gitignore(&root);
        Ok(Self { root, gitignore })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_ignored(&self, rel: &Path, is_dir: bool) -> bool {
        if rel.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|name| ALWAYS_IGNORE.contains(&name))
        }) {
            return true;
        }
        self.gitignore
            .matched_path_or_any_parents(rel, is_dir)
            .is_ignore()
    }

    /// Resolve a model-supplied relative path, refusing anything outside the root.
    fn resolve(&self, subpath: &str) -> Result<PathBuf, String> {
        let candidate = Path::new(subpath.trim());
        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
            || candidate.is_absolute()
        {
            return Err("Error: path escapes codebase root".to_string());
        }
        let joined = self.root.join(candidate);
        match joined.canonicalize() {
            Ok(canon) if canon.starts_with(&self.root) => Ok(canon),
            Ok(_) => Err("Error: path escapes codebase root".to_string()),
            Err(_) => Ok(joined),
        }
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    /// Immediate children of a directory, directories suffixed with `/`.
    pub fn list_directory(&self, subpath: &str) -> Vec<String> {
        let target = match self.resolve(subpath) {
            Ok(t) => t,
            Err(e) => return vec![e],
        };
        if !target.is_dir() {
            return vec![format!("Error: not a directory: {}", subpath)];
        }
        let mut entries: Vec<_> = match fs::read_dir(&target) {
            Ok(entries) => entries.filter_map(|e| e.ok()).collect(),
            Err(e) => return vec![format!("Error: {}", e)],
        };
        entries.sort_by_key(|e| e.file_name());

        entries
            .into_iter()
            .filter_map(|entry| {
                let path = entry.path();
                let is_dir = path.is_dir();
                if self.is_ignored(self.relative(&path), is_dir) {
                    return None;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                Some(if is_dir { format!("{}/", name) } else { name })
            })
            .collect()
    }

    /// File contents, capped at `MAX_READ_LINES` lines.
    pub fn read_file(&self, subpath: &str) -> String {
        let target = match self.resolve(subpath) {
            Ok(t) => t,
            Err(e) => return e,
        };
        if !target.is_file() {
            return format!("Error: not a file: {}", subpath);
        }
        if self.is_ignored(self.relative(&target), false) {
            return format!("Error: path is ignored: {}", subpath);
        }
        if is_binary(&target) {
            let ext = target
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default();
            return format!("[binary file: .{}]", ext);
        }
        let size = fs::metadata(&target).map(|m| m.len()).unwrap_or(0);
        if size > MAX_FILE_SIZE {
            return format!("[file too large: {} bytes]", size);
        }

        match fs::read(&target) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let total = text.lines().count();
                if total > MAX_READ_LINES {
                    let kept: Vec<&str> = text.lines().take(MAX_READ_LINES).collect();
                    format!(
                        "{}\n\n[... truncated, {} more lines]",
                        kept.join("\n"),
                        total - MAX_READ_LINES
                    )
                } else {
                    text.into_owned()
                }
            }
            Err(e) => format!("Error reading file: {}", e),
        }
    }

    /// Non-ignored files under the root, in path order.
    fn walk_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_dir();
                !self.is_ignored(self.relative(entry.path()), is_dir)
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
    }

    /// Case-insensitive regex search; an invalid regex is searched literally.
    pub fn search_code(&self, pattern: &str) -> Vec<SearchHit> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&regex::escape(pattern))
                    .case_insensitive(true)
                    .build()
            });
        let Ok(regex) = regex else {
            return Vec::new();
        };

        let mut hits = Vec::new();
        for path in self.walk_files() {
            if is_binary(&path) {
                continue;
            }
            if fs::metadata(&path).map(|m| m.len()).unwrap_or(u64::MAX) > MAX_FILE_SIZE {
                continue;
            }
            let Ok(bytes) = fs::read(&path) else {
                continue;
            };
            let text = String::from_utf8_lossy(&bytes);
            for (i, line) in text.lines().enumerate() {
                if regex.is_match(line) {
                    hits.push(SearchHit {
                        file: rel_string(self.relative(&path)),
                        line_number: (i + 1).to_string(),
                        line: line.trim_end().chars().take(MAX_MATCH_LINE_CHARS).collect(),
                    });
                    if hits.len() >= MAX_SEARCH_RESULTS {
                        return hits;
                    }
                }
            }
        }
        hits
    }

    /// Search results formatted for the model.
    pub fn search_code_text(&self, pattern: &str) -> String {
        let hits = self.search_code(pattern);
        if hits.is_empty() {
            return "No matches found.".to_string();
        }
        serde_json::to_string_pretty(&hits).unwrap_or_else(|e| format!("Error: {}", e))
    }

    /// Indented directory tree, `TREE_DEPTH` levels below the root.
    pub fn get_tree(&self) -> String {
        let mut lines = Vec::new();
        self.build_tree(&self.root, 0, &mut lines);
        lines.join("\n")
    }

    fn build_tree(&self, dir: &Path, depth: usize, lines: &mut Vec<String>) {
        if depth > TREE_DEPTH {
            return;
        }
        let mut entries: Vec<_> = match fs::read_dir(dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).collect(),
            Err(_) => return,
        };
        entries.sort_by_key(|e| e.path());

        let indent = "  ".repeat(depth);
        for entry in entries {
            let path = entry.path();
            let is_dir = path.is_dir();
            if self.is_ignored(self.relative(&path), is_dir) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_dir {
                lines.push(format!("{}{}/", indent, name));
                self.build_tree(&path, depth + 1, lines);
            } else {
                lines.push(format!("{}{}", indent, name));
            }
        }
    }

    /// Concatenated project manifests found at the root.
    pub fn read_manifest(&self) -> String {
        let found: Vec<String> = MANIFESTS
            .iter()
            .filter_map(|name| {
                let bytes = fs::read(self.root.join(name)).ok()?;
                Some(format!(
                    "=== {} ===\n{}",
                    name,
                    String::from_utf8_lossy(&bytes)
                ))
            })
            .collect();
        if found.is_empty() {
            "No manifest file found.".to_string()
        } else {
            found.join("\n\n")
        }
    }
}
