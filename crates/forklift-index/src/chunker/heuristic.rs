//! Signature scan with brace counting for languages without a structural parser.

use std::sync::LazyLock;

use regex::Regex;

use super::{ChunkKind, CodeChunk, slice_lines};

/// Class and function signature patterns for one language family. The first
/// participating capture group of a match is the definition name.
pub(super) struct Patterns {
    class: Regex,
    function: Regex,
}

impl Patterns {
    fn new(class: &str, function: &str) -> Self {
        Self {
            class: Regex::new(class).expect("class signature regex is valid"),
            function: Regex::new(function).expect("function signature regex is valid"),
        }
    }
}

static JAVASCRIPT: LazyLock<Patterns> = LazyLock::new(|| {
    Patterns::new(
        r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)",
        concat!(
            r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)",
            r"|^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::\s*[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
            r"|^\s*(?:(?:public|private|protected|static|async|get|set|readonly|override)\s+)*([A-Za-z_$][\w$]*)\s*\([^)]*\)\s*(?::\s*[^{]+)?\{",
        ),
    )
});

static JVM_LIKE: LazyLock<Patterns> = LazyLock::new(|| {
    Patterns::new(
        r"^\s*(?:@\w+\s+)*(?:(?:public|private|protected|internal|static|final|abstract|sealed|partial|open|data|inner|annotation|case|implicit|fileprivate|readonly)\s+)*(?:class|interface|enum|struct|record|object|trait|protocol|extension)\s+([A-Za-z_]\w*)",
        concat!(
            r"^\s*(?:(?:public|private|protected|internal|static|final|abstract|override|open|suspend|inline|operator|infix|tailrec|mutating|fileprivate|async|implicit)\s+)*(?:fun|func|def)\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?([A-Za-z_]\w*)",
            r"|^\s*(?:@\w+\s+)*(?:(?:public|private|protected|internal|static|final|abstract|synchronized|native|virtual|override|sealed|async|extern|unsafe|partial|default|strictfp)\s+)*(?:[\w<>\[\],.?]+\s+)+([A-Za-z_]\w*)\s*\(",
        ),
    )
});

static C_LIKE: LazyLock<Patterns> = LazyLock::new(|| {
    Patterns::new(
        r"^\s*(?:typedef\s+)?(?:template\s*<[^>]*>\s*)?(?:class|struct|union)\s+([A-Za-z_]\w*)\s*(?:final\s*)?(?::[^;{]*)?\{?\s*$",
        r"^\s*(?:(?:static|inline|extern|virtual|explicit|constexpr|const|unsigned|signed|struct|enum|friend)\s+)*(?:[\w:<>,]+[\s*&]+)+([A-Za-z_~][\w:~]*)\s*\([^;]*$",
    )
});

static PHP: LazyLock<Patterns> = LazyLock::new(|| {
    Patterns::new(
        r"^\s*(?:(?:abstract|final|readonly)\s+)*(?:class|interface|trait|enum)\s+([A-Za-z_]\w*)",
        r"^\s*(?:(?:public|private|protected|static|abstract|final)\s+)*function\s+&?\s*([A-Za-z_]\w*)\s*\(",
    )
});

static GO: LazyLock<Patterns> = LazyLock::new(|| {
    Patterns::new(
        r"^\s*type\s+([A-Za-z_]\w*)\s+(?:struct|interface)\b",
        r"^\s*func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)\s*[\[(]",
    )
});

static RUST: LazyLock<Patterns> = LazyLock::new(|| {
    Patterns::new(
        r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?(?:struct|enum|trait|union)\s+([A-Za-z_]\w*)",
        r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:(?:const|async|unsafe|extern(?:\s+"[^"]*")?)\s+)*fn\s+([A-Za-z_]\w*)"#,
    )
});

/// Words that begin statements or expressions, never definitions.
const STATEMENT_STARTS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "else", "do", "try", "using", "foreach", "lock",
    "sizeof", "return", "new", "throw", "await", "yield", "case", "goto", "delete", "typeof",
    "when", "match", "guard", "defer", "echo",
];

/// Captured names that are keywords rather than definitions.
const RESERVED_NAMES: &[&str] = &[
    "if", "for", "while", "switch", "catch", "else", "do", "try", "using", "foreach", "lock",
    "sizeof", "return", "new", "synchronized", "function", "when", "match",
];

/// Signature patterns for a lowercased file extension. Indentation-delimited
/// languages have none.
pub(super) fn patterns_for(extension: &str) -> Option<&'static Patterns> {
    let patterns: &'static LazyLock<Patterns> = match extension {
        "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "mts" | "cts" => &JAVASCRIPT,
        "java" | "cs" | "kt" | "kts" | "scala" | "swift" => &JVM_LIKE,
        "c" | "h" | "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => &C_LIKE,
        "php" => &PHP,
        "go" => &GO,
        "rs" => &RUST,
        _ => return None,
    };
    Some(LazyLock::force(patterns))
}

/// Emit one chunk per signature line. Nested definitions overlap their
/// enclosing chunk.
pub(super) fn chunk(content: &str, path: &str, patterns: &Patterns) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some((name, is_class)) = signature(line, patterns) else {
            continue;
        };
        let line_start = i + 1;
        let line_end = block_end(&lines, i) + 1;
        let kind = if is_class {
            ChunkKind::Class {
                base_types: Vec::new(),
                decorators: Vec::new(),
            }
        } else {
            ChunkKind::Function {
                arguments: Vec::new(),
                decorators: Vec::new(),
            }
        };
        chunks.push(CodeChunk {
            kind,
            name,
            content: slice_lines(&lines, line_start, line_end),
            docstring: None,
            file_path: path.to_owned(),
            line_start,
            line_end,
        });
    }
    chunks
}

/// Definition name on `line`, and whether it is class-like. A class match
/// wins over a function match.
fn signature(line: &str, patterns: &Patterns) -> Option<(String, bool)> {
    let leading = line.split_whitespace().next()?;
    if STATEMENT_STARTS.contains(&leading) {
        return None;
    }
    [(&patterns.class, true), (&patterns.function, false)]
        .into_iter()
        .find_map(|(regex, is_class)| {
            let caps = regex.captures(line)?;
            let name = caps.iter().skip(1).flatten().next()?.as_str();
            (!RESERVED_NAMES.contains(&name)).then(|| (name.to_owned(), is_class))
        })
}

/// Index of the line closing the block opened at or after `start`.
///
/// The chunk closes on the first line where the brace count, having gone
/// above zero, returns to zero or below. A line ending in `;` before any
/// brace opens is a body-less declaration. An unbalanced block runs to the
/// last line.
fn block_end(lines: &[&str], start: usize) -> usize {
    let mut depth: i64 = 0;
    let mut opened = false;
    for (j, line) in lines.iter().enumerate().skip(start) {
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth <= 0 {
            return j;
        }
        if !opened && line.trim_end().ends_with(';') {
            return j;
        }
    }
    lines.len().saturating_sub(1)
}
