//! Repository ingest: the flat file list the chunker consumes.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::languages::extension_of;

/// Extensions (without the dot) fetched by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "cpp", "c", "h", "cs", "php", "rb", "go", "rs",
    "swift", "kt", "scala", "html", "css", "scss", "sass", "vue", "svelte", "sql", "md", "yml",
    "yaml", "json", "xml", "toml", "ini",
];

/// Files at or above this size are skipped (1 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_000_000;

/// Branch assumed when none is given.
pub const DEFAULT_BRANCH: &str = "main";

/// One fetched source file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Repository-relative path with `/` separators.
    pub path: String,
    pub content: String,
    pub size: u64,
    /// Lowercased extension with the leading dot, e.g. `.py`; empty when absent.
    pub extension: String,
    /// blake3 hex digest of `content`.
    pub sha: String,
}

impl SourceFile {
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let content = content.into();
        let extension = extension_of(&path)
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        Self {
            sha: blake3::hash(content.as_bytes()).to_hex().to_string(),
            size: u64::try_from(content.len()).unwrap_or(u64::MAX),
            extension,
            path,
            content,
        }
    }
}

/// A file left out of a fetch, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Result of a fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchedFiles {
    pub files: Vec<SourceFile>,
    pub skipped: Vec<SkippedFile>,
}

/// Supplies the files of one repository at one branch.
pub trait SourceProvider: Send + Sync {
    /// Fetch every indexable file.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Fetch`] when the repository itself cannot be read.
    /// Individual unreadable files are reported in [`FetchedFiles::skipped`].
    fn fetch(&self) -> impl Future<Output = Result<FetchedFiles>> + Send;
}

/// Scope string for a repository at a branch: the repository name for the
/// default branch, `repo@branch` otherwise.
#[must_use]
pub fn repository_tag(repository: &str, branch: Option<&str>, default_branch: &str) -> String {
    match branch.map(str::trim).filter(|b| !b.is_empty()) {
        Some(branch) if branch != default_branch => format!("{repository}@{branch}"),
        _ => repository.to_owned(),
    }
}

/// Walks a local checkout, honoring `.gitignore` and skipping hidden files.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
    extensions: Vec<String>,
    max_file_size: u64,
}

impl LocalSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|&e| e.to_owned()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Replace the extension allow-list. Leading dots and case are ignored.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SourceProvider for LocalSource {
    async fn fetch(&self) -> Result<FetchedFiles> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.walk()).await?
    }
}

impl LocalSource {
    fn walk(&self) -> Result<FetchedFiles> {
        if !self.root.is_dir() {
            return Err(IndexError::Fetch(format!(
                "{} is not a readable directory",
                self.root.display()
            )));
        }

        let mut fetched = FetchedFiles::default();
        let walker = ignore::WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .require_git(false)
            .sort_by_file_name(std::ffi::OsStr::cmp)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("walk error: {e}");
                    fetched.skipped.push(SkippedFile {
                        path: String::new(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let rel_path = relative_path(&self.root, entry.path());
            let Some(ext) = extension_of(&rel_path) else {
                continue;
            };
            if !self.extensions.iter().any(|e| *e == ext) {
                continue;
            }

            match self.read(entry.path()) {
                Ok(content) => fetched.files.push(SourceFile::new(rel_path, content)),
                Err(reason) => {
                    tracing::warn!(file = %rel_path, %reason, "skipping file");
                    fetched.skipped.push(SkippedFile {
                        path: rel_path,
                        reason,
                    });
                }
            }
        }

        tracing::debug!(
            root = %self.root.display(),
            files = fetched.files.len(),
            skipped = fetched.skipped.len(),
            "local walk finished"
        );
        Ok(fetched)
    }

    fn read(&self, path: &Path) -> std::result::Result<String, String> {
        let size = std::fs::metadata(path)
            .map_err(|e| format!("unreadable: {e}"))?
            .len();
        if size >= self.max_file_size {
            return Err(format!("too large: {size} bytes"));
        }
        let bytes = std::fs::read(path).map_err(|e| format!("unreadable: {e}"))?;
        String::from_utf8(bytes).map_err(|_| "not valid UTF-8".to_owned())
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// A file list fetched elsewhere, e.g. from a hosting provider's API.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    files: Vec<SourceFile>,
}

impl StaticSource {
    #[must_use]
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self { files }
    }
}

impl FromIterator<SourceFile> for StaticSource {
    fn from_iter<T: IntoIterator<Item = SourceFile>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl SourceProvider for StaticSource {
    async fn fetch(&self) -> Result<FetchedFiles> {
        Ok(FetchedFiles {
            files: self.files.clone(),
            skipped: Vec::new(),
        })
    }
}
