use std::collections::HashSet;

use forklift_index::chunker::generic_chunks;
use forklift_index::{ChunkKind, ChunkerConfig, CodeChunk, SourceFile, chunk_file};
use proptest::prelude::*;

fn chunk(path: &str, content: &str) -> Vec<CodeChunk> {
    chunk_file(&SourceFile::new(path, content), &ChunkerConfig::default())
}

fn assert_well_formed(path: &str, content: &str, chunks: &[CodeChunk]) {
    let lines: Vec<&str> = content.lines().collect();
    let mut starts = HashSet::new();
    for c in chunks {
        assert!(c.line_start >= 1, "{path}: {c:?}");
        assert!(c.line_start <= c.line_end, "{path}: {c:?}");
        assert!(c.line_end <= lines.len(), "{path}: {c:?}");
        assert!(starts.insert(c.line_start), "{path}: duplicate start {}", c.line_start);
        assert_eq!(c.file_path, path);
        if !matches!(c.kind, ChunkKind::Module { .. }) {
            assert_eq!(c.content, lines[c.line_start - 1..c.line_end].join("\n"));
        }
    }
}

#[test]
fn broken_python_falls_back_to_generic() {
    let source = "def broken(:\n    return\nclass\n";
    assert_eq!(
        chunk("broken.py", source),
        generic_chunks(source, "broken.py", 1000)
    );
}

#[test]
fn broken_javascript_without_signatures_falls_back_to_generic() {
    let source = "let x = ;\n(((\n";
    assert_eq!(
        chunk("broken.js", source),
        generic_chunks(source, "broken.js", 1000)
    );
}

#[test]
fn broken_javascript_with_signatures_uses_heuristics() {
    let source = "function ok(a) {\n  return a;\n}\nlet x = ;\n";
    let chunks = chunk("partial.js", source);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].name, "ok");
    assert_eq!((chunks[0].line_start, chunks[0].line_end), (1, 3));
    assert!(matches!(chunks[0].kind, ChunkKind::Function { .. }));
}

#[test]
fn generic_threshold_is_configurable() {
    let content = "aaaa\nbbbb\ncccc\n";
    let config = ChunkerConfig {
        generic_chunk_size: 8,
    };
    let chunks = chunk_file(&SourceFile::new("x.txt", content), &config);
    assert_eq!(
        chunks
            .iter()
            .map(|c| (c.line_start, c.line_end))
            .collect::<Vec<_>>(),
        vec![(1, 2), (3, 3)]
    );
}

#[test]
fn mixed_repository_is_well_formed() {
    let files = [
        (
            "svc/handler.py",
            "import json\n\nclass Handler:\n    def get(self, req):\n        return json.dumps(req)\n",
        ),
        (
            "src/main.rs",
            "use std::env;\n\nfn main() {\n    let args: Vec<String> = env::args().collect();\n}\n",
        ),
        (
            "web/app.tsx",
            "import React from 'react';\n\nexport const App = () => <div>hi</div>;\n",
        ),
        (
            "cmd/main.go",
            "package main\n\nfunc main() {\n}\n",
        ),
        (
            "lib/util.cpp",
            "#include <vector>\n\nint sum(const std::vector<int>& xs) {\n  int s = 0;\n  for (int x : xs) { s += x; }\n  return s;\n}\n",
        ),
        ("docs/intro.md", "# Intro\n\nText.\n"),
    ];
    for (path, content) in files {
        let chunks = chunk(path, content);
        assert!(!chunks.is_empty(), "{path} produced no chunks");
        assert_well_formed(path, content, &chunks);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arbitrary_input_yields_well_formed_chunks(
        ext in prop::sample::select(vec!["py", "rs", "js", "ts", "go", "java", "c", "txt"]),
        lines in prop::collection::vec(
            prop::sample::select(vec![
                "def f(a, b):",
                "    return a",
                "class C(B):",
                "fn g(x: u8) {",
                "function h(y) {",
                "public void run() {",
                "func k() {",
                "}",
                "{",
                "",
                "   ",
                "import os",
                "// note",
                "x = 1;",
            ]),
            0..40,
        ),
    ) {
        let path = format!("gen.{ext}");
        let content = lines.join("\n");
        let chunks = chunk(&path, &content);
        if content.trim().is_empty() {
            prop_assert!(chunks.is_empty());
        }
        assert_well_formed(&path, &content, &chunks);
    }
}
