//! Source file → ordered, semantically bounded chunks.
//!
//! Three paths, tried in order:
//!
//! 1. **structural**: tree-sitter walk for languages with a grammar
//! 2. **heuristic**: signature regexes plus brace counting for other brace languages
//! 3. **generic**: fixed-size line windows
//!
//! A structural parse with syntax errors drops to the heuristic path; a heuristic
//! scan with no signatures (or a clean parse with no definitions) drops to generic.

mod generic;
mod heuristic;
mod structural;

use std::collections::HashSet;

use crate::languages::{detect_language, extension_of};
use crate::source::SourceFile;

pub use generic::generic_chunks;

/// Kind-specific metadata attached to a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkKind {
    Function {
        arguments: Vec<String>,
        decorators: Vec<String>,
    },
    Class {
        base_types: Vec<String>,
        decorators: Vec<String>,
    },
    Module {
        imports: Vec<String>,
    },
    Generic {
        index: usize,
    },
}

impl ChunkKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function { .. } => "function",
            Self::Class { .. } => "class",
            Self::Module { .. } => "module",
            Self::Generic { .. } => "generic",
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chunk of source code. Line numbers are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChunk {
    pub kind: ChunkKind,
    pub name: String,
    pub content: String,
    /// Leading documentation; for module chunks, the module documentation.
    pub docstring: Option<String>,
    pub file_path: String,
    pub line_start: usize,
    pub line_end: usize,
}

impl CodeChunk {
    /// Id of the index entry this chunk is stored under for `repository`.
    #[must_use]
    pub fn entry_id(&self, repository: &str) -> String {
        forklift_store::entry_id(repository, &self.file_path, self.line_start)
    }
}

/// Chunker configuration.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Character threshold at which a generic chunk is closed (default: 1000).
    pub generic_chunk_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            generic_chunk_size: 1000,
        }
    }
}

/// Split `file` into chunks. Never fails: every file yields zero or more
/// well-formed chunks.
#[must_use]
pub fn chunk_file(file: &SourceFile, config: &ChunkerConfig) -> Vec<CodeChunk> {
    let content = file.content.as_str();
    let path = file.path.as_str();
    if content.trim().is_empty() {
        return Vec::new();
    }

    let grammar = detect_language(path).and_then(|lang| Some((lang, lang.grammar()?)));
    let chunks = match grammar {
        Some((lang, grammar)) => match structural::chunk(content, path, lang, &grammar) {
            Some(chunks) if chunks.is_empty() => {
                tracing::debug!(path, "no definitions found, using line windows");
                generic_chunks(content, path, config.generic_chunk_size)
            }
            Some(chunks) => chunks,
            None => {
                tracing::debug!(path, %lang, "syntax errors, falling back to signature scan");
                heuristic_or_generic(content, path, config)
            }
        },
        None => heuristic_or_generic(content, path, config),
    };

    dedup_line_starts(chunks)
}

fn heuristic_or_generic(content: &str, path: &str, config: &ChunkerConfig) -> Vec<CodeChunk> {
    let extension = extension_of(path);
    let chunks = extension
        .as_deref()
        .and_then(heuristic::patterns_for)
        .map(|patterns| heuristic::chunk(content, path, patterns))
        .unwrap_or_default();
    if chunks.is_empty() {
        generic_chunks(content, path, config.generic_chunk_size)
    } else {
        chunks
    }
}

/// Keep the first chunk for each start line so entry ids stay unique per file.
fn dedup_line_starts(chunks: Vec<CodeChunk>) -> Vec<CodeChunk> {
    let mut seen = HashSet::with_capacity(chunks.len());
    chunks
        .into_iter()
        .filter(|c| seen.insert(c.line_start))
        .collect()
}

/// Source lines `start..=end` (1-based) joined with `\n`.
pub(crate) fn slice_lines(lines: &[&str], start: usize, end: usize) -> String {
    lines[start - 1..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile::new(path, content)
    }

    #[test]
    fn empty_and_whitespace_files_yield_nothing() {
        let config = ChunkerConfig::default();
        assert!(chunk_file(&file("a.py", ""), &config).is_empty());
        assert!(chunk_file(&file("a.txt", "  \n\t\n"), &config).is_empty());
    }

    #[test]
    fn python_add_function() {
        let chunks = chunk_file(
            &file("app.py", "def add(a, b):\n    return a + b\n"),
            &ChunkerConfig::default(),
        );
        assert_eq!(chunks.len(), 1);
        let c = &chunks[0];
        assert_eq!(c.name, "add");
        assert_eq!((c.line_start, c.line_end), (1, 2));
        assert_eq!(c.content, "def add(a, b):\n    return a + b");
        assert_eq!(
            c.kind,
            ChunkKind::Function {
                arguments: vec!["a".into(), "b".into()],
                decorators: vec![],
            }
        );
    }

    #[test]
    fn python_syntax_error_equals_generic() {
        let source = "def broken(:\n    pass\nprint('x')\n";
        let config = ChunkerConfig::default();
        assert_eq!(
            chunk_file(&file("bad.py", source), &config),
            generic_chunks(source, "bad.py", config.generic_chunk_size)
        );
    }

    #[test]
    fn python_without_definitions_uses_generic() {
        let source = "x = 1\ny = 2\n";
        let chunks = chunk_file(&file("vars.py", source), &ChunkerConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Generic { index: 0 });
        assert_eq!(chunks[0].name, "vars.py_chunk_0");
    }

    #[test]
    fn java_uses_heuristic_path() {
        let source = "public class Greeter {\n    public void greet() {\n        System.out.println(\"hi\");\n    }\n}\n";
        let chunks = chunk_file(&file("Greeter.java", source), &ChunkerConfig::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind.as_str(), "class");
        assert_eq!((chunks[0].line_start, chunks[0].line_end), (1, 5));
        assert_eq!(chunks[1].name, "greet");
        assert_eq!((chunks[1].line_start, chunks[1].line_end), (2, 4));
    }

    #[test]
    fn unknown_extension_uses_generic() {
        let chunks = chunk_file(&file("notes.md", "# Title\n\nSome text.\n"), &ChunkerConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].line_start, chunks[0].line_end), (1, 3));
    }

    #[test]
    fn line_starts_are_unique() {
        let source = "class A: pass\nclass B:\n    def f(self): pass\n";
        let chunks = chunk_file(&file("m.py", source), &ChunkerConfig::default());
        let mut starts: Vec<_> = chunks.iter().map(|c| c.line_start).collect();
        let before = starts.len();
        starts.dedup();
        assert_eq!(starts.len(), before);
    }

    #[test]
    fn entry_id_uses_repository_path_and_start_line() {
        let chunks = chunk_file(
            &file("app.py", "def add(a, b):\n    return a + b\n"),
            &ChunkerConfig::default(),
        );
        assert_eq!(
            chunks[0].entry_id("repoX"),
            forklift_store::entry_id("repoX", "app.py", 1)
        );
    }
}
