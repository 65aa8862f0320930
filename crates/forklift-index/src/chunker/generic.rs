use super::{ChunkKind, CodeChunk, slice_lines};

/// Fixed-size line windows: lines accumulate until their character count
/// reaches `threshold` or the file ends. Windows holding only whitespace are
/// not emitted.
#[must_use]
pub fn generic_chunks(content: &str, path: &str, threshold: usize) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut size = 0;

    for (i, line) in lines.iter().enumerate() {
        size += line.chars().count();
        if size < threshold && i + 1 < lines.len() {
            continue;
        }
        let (line_start, line_end) = (start + 1, i + 1);
        start = i + 1;
        size = 0;
        if lines[line_start - 1..line_end].iter().all(|l| l.trim().is_empty()) {
            continue;
        }
        let index = chunks.len();
        chunks.push(CodeChunk {
            kind: ChunkKind::Generic { index },
            name: format!("{path}_chunk_{index}"),
            content: slice_lines(&lines, line_start, line_end),
            docstring: None,
            file_path: path.to_owned(),
            line_start,
            line_end,
        });
    }
    chunks
}
