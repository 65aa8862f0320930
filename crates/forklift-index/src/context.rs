//! Enhanced embedding text.
//!
//! The text embedded for a chunk (and stored as its document) is the raw code
//! prefixed with a deterministic header naming the file, the chunk kind and,
//! for functions and classes, their signature metadata and documentation.
//! Empty argument and base lists produce no line.

use std::fmt::Write as _;

use crate::chunker::{ChunkKind, CodeChunk};

/// Render the embedding input for `chunk`. Pure: equal chunks give equal text.
#[must_use]
pub fn enhanced_text(chunk: &CodeChunk) -> String {
    let mut text = String::with_capacity(chunk.content.len() + 128);
    let _ = writeln!(text, "File: {}", chunk.file_path);
    let _ = writeln!(text, "Type: {}", chunk.kind);

    match &chunk.kind {
        ChunkKind::Function { arguments, .. } => {
            let _ = writeln!(text, "Function: {}", chunk.name);
            if !arguments.is_empty() {
                let _ = writeln!(text, "Arguments: {}", arguments.join(", "));
            }
            push_documentation(&mut text, chunk.docstring.as_deref());
        }
        ChunkKind::Class { base_types, .. } => {
            let _ = writeln!(text, "Class: {}", chunk.name);
            if !base_types.is_empty() {
                let _ = writeln!(text, "Inherits from: {}", base_types.join(", "));
            }
            push_documentation(&mut text, chunk.docstring.as_deref());
        }
        ChunkKind::Module { .. } | ChunkKind::Generic { .. } => {}
    }

    text.push_str("\nCode:\n");
    text.push_str(&chunk.content);
    text
}

fn push_documentation(text: &mut String, docstring: Option<&str>) {
    if let Some(doc) = docstring.filter(|d| !d.trim().is_empty()) {
        let _ = writeln!(text, "Documentation: {doc}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(kind: ChunkKind, docstring: Option<&str>) -> CodeChunk {
        CodeChunk {
            kind,
            name: "add".into(),
            content: "def add(a, b):\n    return a + b".into(),
            docstring: docstring.map(str::to_owned),
            file_path: "app.py".into(),
            line_start: 1,
            line_end: 2,
        }
    }

    #[test]
    fn function_header() {
        let c = chunk(
            ChunkKind::Function {
                arguments: vec!["a".into(), "b".into()],
                decorators: vec![],
            },
            Some("Sum two numbers."),
        );
        assert_eq!(
            enhanced_text(&c),
            "File: app.py\nType: function\nFunction: add\nArguments: a, b\n\
             Documentation: Sum two numbers.\n\nCode:\ndef add(a, b):\n    return a + b"
        );
    }

    #[test]
    fn class_header_without_docs() {
        let c = chunk(
            ChunkKind::Class {
                base_types: vec!["Base".into(), "Mixin".into()],
                decorators: vec![],
            },
            Some("   "),
        );
        let text = enhanced_text(&c);
        assert!(text.starts_with("File: app.py\nType: class\nClass: add\nInherits from: Base, Mixin\n\nCode:\n"));
        assert!(!text.contains("Documentation:"));
    }

    #[test]
    fn empty_lists_are_omitted() {
        let function = chunk(
            ChunkKind::Function {
                arguments: vec![],
                decorators: vec![],
            },
            None,
        );
        assert!(
            enhanced_text(&function)
                .starts_with("File: app.py\nType: function\nFunction: add\n\nCode:\n")
        );

        let class = chunk(
            ChunkKind::Class {
                base_types: vec![],
                decorators: vec![],
            },
            None,
        );
        let text = enhanced_text(&class);
        assert!(text.starts_with("File: app.py\nType: class\nClass: add\n\nCode:\n"));
        assert!(!text.contains("Inherits from:"));
    }

    #[test]
    fn generic_has_no_kind_lines() {
        let c = chunk(ChunkKind::Generic { index: 3 }, None);
        assert_eq!(
            enhanced_text(&c),
            "File: app.py\nType: generic\n\nCode:\ndef add(a, b):\n    return a + b"
        );
    }

    #[test]
    fn deterministic() {
        let c = chunk(
            ChunkKind::Module {
                imports: vec!["import os".into()],
            },
            Some("Docs."),
        );
        assert_eq!(enhanced_text(&c), enhanced_text(&c.clone()));
        assert!(enhanced_text(&c).starts_with("File: app.py\nType: module\n\nCode:\n"));
    }
}
