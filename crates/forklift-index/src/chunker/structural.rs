//! Tree-sitter walk producing function, class and module chunks.

use tree_sitter::{Language, Node, Parser};

use super::{ChunkKind, CodeChunk, slice_lines};
use crate::languages::Lang;

/// Parse `source` and emit its definitions in source order, followed by the
/// module chunk. Returns `None` when the parse fails or contains error nodes.
pub(super) fn chunk(
    source: &str,
    path: &str,
    lang: Lang,
    grammar: &Language,
) -> Option<Vec<CodeChunk>> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(grammar) {
        tracing::warn!(path, %lang, "grammar rejected: {e}");
        return None;
    }
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let mut walk = Walk {
        source,
        lines: source.lines().collect(),
        path,
        lang,
        chunks: Vec::new(),
    };
    walk.definitions(root);
    walk.module(root);
    Some(walk.chunks)
}

struct Walk<'s> {
    source: &'s str,
    lines: Vec<&'s str>,
    path: &'s str,
    lang: Lang,
    chunks: Vec<CodeChunk>,
}

/// Imports and module documentation collected from top-level nodes.
#[derive(Default)]
struct ModuleParts {
    imports: Vec<String>,
    docs: Vec<String>,
    rows: Option<(usize, usize)>,
}

impl ModuleParts {
    fn cover(&mut self, node: Node<'_>) {
        let (start, end) = (node.start_position().row, last_row(node));
        self.rows = Some(match self.rows {
            Some((s, e)) => (s.min(start), e.max(end)),
            None => (start, end),
        });
    }
}

impl<'s> Walk<'s> {
    fn text(&self, node: Node<'_>) -> &'s str {
        let source = self.source;
        &source[node.byte_range()]
    }

    /// Pre-order traversal; parents are visited before their children.
    fn definitions(&mut self, root: Node<'_>) {
        let mut cursor = root.walk();
        loop {
            let node = cursor.node();
            if node.is_named() {
                match self.lang {
                    Lang::Python => self.python(node),
                    Lang::Rust => self.rust(node),
                    Lang::JavaScript | Lang::TypeScript | Lang::Tsx => self.javascript(node),
                    Lang::Go => self.go(node),
                }
            }
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return;
                }
            }
        }
    }

    fn push(&mut self, node: Node<'_>, kind: ChunkKind, name: String, docstring: Option<String>) {
        let max = self.lines.len().max(1);
        let line_start = (node.start_position().row + 1).min(max);
        let line_end = (last_row(node) + 1).clamp(line_start, max);
        self.chunks.push(CodeChunk {
            kind,
            name,
            content: slice_lines(&self.lines, line_start, line_end),
            docstring,
            file_path: self.path.to_owned(),
            line_start,
            line_end,
        });
    }

    fn module(&mut self, root: Node<'_>) {
        let parts = match self.lang {
            Lang::Python => self.python_module(root),
            Lang::Rust => self.rust_module(root),
            Lang::JavaScript | Lang::TypeScript | Lang::Tsx => self.javascript_module(root),
            Lang::Go => self.go_module(root),
        };
        let docstring = join_doc(parts.docs);
        let Some((first, last)) = parts.rows else {
            return;
        };
        if parts.imports.is_empty() && docstring.is_none() {
            return;
        }

        let max = self.lines.len().max(1);
        let line_start = (first + 1).min(max);
        let line_end = (last + 1).clamp(line_start, max);
        let content = format!(
            "# Imports:\n{}\n\n# Module docstring:\n{}",
            parts.imports.join("\n"),
            docstring.as_deref().unwrap_or_default()
        );
        self.chunks.push(CodeChunk {
            kind: ChunkKind::Module {
                imports: parts.imports,
            },
            name: self.path.to_owned(),
            content,
            docstring,
            file_path: self.path.to_owned(),
            line_start,
            line_end,
        });
    }

    /// Decorator expression without call arguments, e.g. `app.route`.
    fn callee(&self, expr: Node<'_>) -> String {
        if matches!(expr.kind(), "call" | "call_expression")
            && let Some(function) = expr.child_by_field_name("function")
        {
            return self.text(function).to_owned();
        }
        self.text(expr).to_owned()
    }

    // --- Python ---

    fn python(&mut self, node: Node<'_>) {
        let is_class = match node.kind() {
            "function_definition" => false,
            "class_definition" => true,
            _ => return,
        };
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name).to_owned();
        let decorators = node
            .parent()
            .filter(|p| p.kind() == "decorated_definition")
            .map(|p| self.python_decorators(p))
            .unwrap_or_default();
        let docstring = node
            .child_by_field_name("body")
            .and_then(|body| self.python_docstring(body));

        let kind = if is_class {
            ChunkKind::Class {
                base_types: node
                    .child_by_field_name("superclasses")
                    .map(|s| self.python_bases(s))
                    .unwrap_or_default(),
                decorators,
            }
        } else {
            ChunkKind::Function {
                arguments: node
                    .child_by_field_name("parameters")
                    .map(|p| self.python_arguments(p))
                    .unwrap_or_default(),
                decorators,
            }
        };
        self.push(node, kind, name, docstring);
    }

    fn python_decorators(&self, decorated: Node<'_>) -> Vec<String> {
        let mut cursor = decorated.walk();
        decorated
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "decorator")
            .filter_map(|d| {
                let mut inner = d.walk();
                let expr = d.named_children(&mut inner).find(|n| n.kind() != "comment");
                expr.map(|e| self.callee(e))
            })
            .collect()
    }

    /// Positional parameter names, up to the first `*`, `*args` or `**kwargs`.
    fn python_arguments(&self, params: Node<'_>) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let name = match param.kind() {
                "identifier" => Some(param),
                "typed_parameter" => match param.named_child(0) {
                    Some(n) if n.kind() == "identifier" => Some(n),
                    _ => break,
                },
                "default_parameter" | "typed_default_parameter" => {
                    param.child_by_field_name("name")
                }
                "list_splat_pattern" | "dictionary_splat_pattern" | "keyword_separator" => break,
                _ => None,
            };
            if let Some(name) = name {
                out.push(self.text(name).to_owned());
            }
        }
        out
    }

    fn python_bases(&self, args: Node<'_>) -> Vec<String> {
        let mut cursor = args.walk();
        args.named_children(&mut cursor)
            .filter(|n| !matches!(n.kind(), "keyword_argument" | "comment"))
            .map(|n| self.text(n).to_owned())
            .collect()
    }

    fn python_docstring(&self, body: Node<'_>) -> Option<String> {
        let mut cursor = body.walk();
        let first = body
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment")?;
        self.python_string_statement(first)
            .map(|raw| cleandoc(&raw))
            .filter(|doc| !doc.is_empty())
    }

    /// Value of an expression statement consisting of one string literal.
    fn python_string_statement(&self, node: Node<'_>) -> Option<String> {
        if node.kind() != "expression_statement" || node.named_child_count() != 1 {
            return None;
        }
        let string = node.named_child(0).filter(|n| n.kind() == "string")?;
        Some(python_string_value(self.text(string)).to_owned())
    }

    fn python_module(&self, root: Node<'_>) -> ModuleParts {
        let mut parts = ModuleParts::default();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "import_statement" | "import_from_statement" | "future_import_statement" => {
                    parts.imports.push(self.text(child).trim().to_owned());
                    parts.cover(child);
                }
                "expression_statement" if parts.docs.is_empty() => {
                    if let Some(raw) = self.python_string_statement(child) {
                        parts.docs.push(cleandoc(&raw));
                        parts.cover(child);
                    }
                }
                _ => {}
            }
        }
        parts
    }

    // --- Rust ---

    fn rust(&mut self, node: Node<'_>) {
        let kind = node.kind();
        let is_function = match kind {
            "function_item" | "function_signature_item" => true,
            "struct_item" | "enum_item" | "union_item" | "trait_item" => false,
            _ => return,
        };
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name).to_owned();
        let (decorators, docstring) = self.rust_leading(node);

        let kind = if is_function {
            ChunkKind::Function {
                arguments: node
                    .child_by_field_name("parameters")
                    .map(|p| self.rust_arguments(p))
                    .unwrap_or_default(),
                decorators,
            }
        } else {
            let base_types = node
                .child_by_field_name("bounds")
                .map(|bounds| {
                    let mut cursor = bounds.walk();
                    bounds
                        .named_children(&mut cursor)
                        .filter(|n| !n.kind().ends_with("comment"))
                        .map(|n| self.text(n).to_owned())
                        .collect()
                })
                .unwrap_or_default();
            ChunkKind::Class {
                base_types,
                decorators,
            }
        };
        self.push(node, kind, name, docstring);
    }

    fn rust_arguments(&self, params: Node<'_>) -> Vec<String> {
        let mut cursor = params.walk();
        params
            .named_children(&mut cursor)
            .filter_map(|p| match p.kind() {
                "self_parameter" => Some("self".to_owned()),
                "parameter" => p
                    .child_by_field_name("pattern")
                    .map(|pat| self.text(pat).to_owned()),
                _ => None,
            })
            .collect()
    }

    /// Attribute paths and `///` / `/** */` documentation directly above `node`.
    fn rust_leading(&self, node: Node<'_>) -> (Vec<String>, Option<String>) {
        let mut attributes = Vec::new();
        let mut docs = Vec::new();
        for sib in leading_siblings(node, |n| {
            matches!(n.kind(), "attribute_item" | "line_comment" | "block_comment")
        }) {
            let text = self.text(sib).trim();
            match sib.kind() {
                "attribute_item" => {
                    let path = sib
                        .named_child(0)
                        .filter(|a| a.kind() == "attribute")
                        .and_then(|a| a.named_child(0));
                    if let Some(path) = path {
                        attributes.push(self.text(path).to_owned());
                    }
                }
                "line_comment" if text.starts_with("///") && !text.starts_with("////") => {
                    docs.push(strip_line_comment(text, "///").to_owned());
                }
                "block_comment" if text.starts_with("/**") && !text.starts_with("/**/") => {
                    docs.push(strip_block_comment(text));
                }
                _ => {}
            }
        }
        (attributes, join_doc(docs))
    }

    fn rust_module(&self, root: Node<'_>) -> ModuleParts {
        let mut parts = ModuleParts::default();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            let text = self.text(child).trim();
            match child.kind() {
                "use_declaration" => {
                    parts.imports.push(text.to_owned());
                    parts.cover(child);
                }
                "line_comment" if text.starts_with("//!") => {
                    parts.docs.push(strip_line_comment(text, "//!").to_owned());
                    parts.cover(child);
                }
                "block_comment" if text.starts_with("/*!") => {
                    parts.docs.push(strip_block_comment(text));
                    parts.cover(child);
                }
                _ => {}
            }
        }
        parts
    }

    // --- JavaScript / TypeScript ---

    fn javascript(&mut self, node: Node<'_>) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                let arguments = node
                    .child_by_field_name("parameters")
                    .map(|p| self.js_arguments(p))
                    .unwrap_or_default();
                let name = self.text(name).to_owned();
                self.push_js_function(node, export_anchor(node), name, arguments);
            }
            "variable_declarator" => {
                let Some(name) = node
                    .child_by_field_name("name")
                    .filter(|n| n.kind() == "identifier")
                else {
                    return;
                };
                let Some(value) = node.child_by_field_name("value").filter(|v| {
                    matches!(
                        v.kind(),
                        "arrow_function" | "function_expression" | "function" | "generator_function"
                    )
                }) else {
                    return;
                };
                let arguments = match (
                    value.child_by_field_name("parameters"),
                    value.child_by_field_name("parameter"),
                ) {
                    (Some(params), _) => self.js_arguments(params),
                    (None, Some(single)) => vec![self.text(single).to_owned()],
                    (None, None) => Vec::new(),
                };
                let anchor = node.parent().map_or(node, export_anchor);
                let name = self.text(name).to_owned();
                self.push_js_function(node, anchor, name, arguments);
            }
            "class_declaration" | "abstract_class_declaration" | "interface_declaration" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                let name = self.text(name).to_owned();
                let mut cursor = node.walk();
                let base_types = node
                    .named_children(&mut cursor)
                    .find(|n| matches!(n.kind(), "class_heritage" | "extends_type_clause"))
                    .map(|h| split_heritage(self.text(h)))
                    .unwrap_or_default();
                let (decorators, docstring) = self.js_leading(node, export_anchor(node));
                self.push(
                    node,
                    ChunkKind::Class {
                        base_types,
                        decorators,
                    },
                    name,
                    docstring,
                );
            }
            _ => {}
        }
    }

    fn push_js_function(
        &mut self,
        node: Node<'_>,
        anchor: Node<'_>,
        name: String,
        arguments: Vec<String>,
    ) {
        let (decorators, docstring) = self.js_leading(node, anchor);
        self.push(
            node,
            ChunkKind::Function {
                arguments,
                decorators,
            },
            name,
            docstring,
        );
    }

    fn js_arguments(&self, params: Node<'_>) -> Vec<String> {
        let mut cursor = params.walk();
        params
            .named_children(&mut cursor)
            .filter_map(|p| {
                let target = match p.kind() {
                    "identifier" | "object_pattern" | "array_pattern" => Some(p),
                    "assignment_pattern" => p.child_by_field_name("left"),
                    "rest_pattern" => p.named_child(0),
                    "required_parameter" | "optional_parameter" => {
                        p.child_by_field_name("pattern").map(|pat| {
                            if pat.kind() == "rest_pattern" {
                                pat.named_child(0).unwrap_or(pat)
                            } else {
                                pat
                            }
                        })
                    }
                    _ => None,
                };
                target.map(|t| self.text(t).to_owned())
            })
            .collect()
    }

    /// Decorators on `node` (and its export wrapper) plus the comment block
    /// directly above `anchor`.
    fn js_leading(&self, node: Node<'_>, anchor: Node<'_>) -> (Vec<String>, Option<String>) {
        let mut decorators = Vec::new();
        let mut docs = Vec::new();
        for sib in leading_siblings(anchor, |n| matches!(n.kind(), "comment" | "decorator")) {
            if sib.kind() == "comment" {
                docs.push(strip_comment(self.text(sib)));
            } else if let Some(expr) = sib.named_child(0) {
                decorators.push(self.callee(expr));
            }
        }
        let mut owners = vec![anchor];
        if anchor.id() != node.id() {
            owners.push(node);
        }
        for owner in owners {
            let mut cursor = owner.walk();
            for decorator in owner.children_by_field_name("decorator", &mut cursor) {
                if let Some(expr) = decorator.named_child(0) {
                    decorators.push(self.callee(expr));
                }
            }
        }
        (decorators, join_doc(docs))
    }

    /// A leading comment block counts as module documentation when a blank
    /// line separates it from the first statement.
    fn javascript_module(&self, root: Node<'_>) -> ModuleParts {
        let mut parts = ModuleParts::default();
        let mut cursor = root.walk();
        let children: Vec<Node<'_>> = root
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "hash_bang_line")
            .collect();

        let mut block_end = 0;
        while block_end < children.len()
            && children[block_end].kind() == "comment"
            && (block_end == 0
                || children[block_end].start_position().row
                    <= last_row(children[block_end - 1]) + 1)
        {
            block_end += 1;
        }
        let detached = block_end > 0
            && children.get(block_end).is_none_or(|next| {
                next.start_position().row > last_row(children[block_end - 1]) + 1
            });
        if detached {
            for comment in &children[..block_end] {
                parts.docs.push(strip_comment(self.text(*comment)));
                parts.cover(*comment);
            }
        }

        for child in &children {
            if child.kind() == "import_statement" {
                parts.imports.push(self.text(*child).trim().to_owned());
                parts.cover(*child);
            }
        }
        parts
    }

    // --- Go ---

    fn go(&mut self, node: Node<'_>) {
        match node.kind() {
            "function_declaration" | "method_declaration" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                let name = self.text(name).to_owned();
                let arguments = node
                    .child_by_field_name("parameters")
                    .map(|p| self.go_arguments(p))
                    .unwrap_or_default();
                let docstring = self.go_docs(node);
                self.push(
                    node,
                    ChunkKind::Function {
                        arguments,
                        decorators: Vec::new(),
                    },
                    name,
                    docstring,
                );
            }
            "type_spec" => {
                let (Some(name), Some(ty)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("type"),
                ) else {
                    return;
                };
                let base_types = match ty.kind() {
                    "struct_type" => self.go_embedded_fields(ty),
                    "interface_type" => self.go_embedded_interfaces(ty),
                    _ => return,
                };
                // `type Foo struct` spans its whole declaration; grouped specs stand alone.
                let anchor = node
                    .parent()
                    .filter(|p| {
                        p.kind() == "type_declaration"
                            && p.start_position().row == node.start_position().row
                    })
                    .unwrap_or(node);
                let name = self.text(name).to_owned();
                let docstring = self.go_docs(anchor);
                self.push(
                    anchor,
                    ChunkKind::Class {
                        base_types,
                        decorators: Vec::new(),
                    },
                    name,
                    docstring,
                );
            }
            _ => {}
        }
    }

    fn go_arguments(&self, params: Node<'_>) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if matches!(
                param.kind(),
                "parameter_declaration" | "variadic_parameter_declaration"
            ) {
                let mut inner = param.walk();
                out.extend(
                    param
                        .children_by_field_name("name", &mut inner)
                        .map(|n| self.text(n).to_owned()),
                );
            }
        }
        out
    }

    fn go_embedded_fields(&self, struct_type: Node<'_>) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = struct_type.walk();
        for list in struct_type
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "field_declaration_list")
        {
            let mut inner = list.walk();
            for field in list.named_children(&mut inner) {
                if field.kind() == "field_declaration"
                    && field.child_by_field_name("name").is_none()
                    && let Some(ty) = field.child_by_field_name("type")
                {
                    out.push(self.text(ty).to_owned());
                }
            }
        }
        out
    }

    fn go_embedded_interfaces(&self, interface: Node<'_>) -> Vec<String> {
        let mut cursor = interface.walk();
        interface
            .named_children(&mut cursor)
            .filter(|n| !matches!(n.kind(), "method_elem" | "method_spec" | "comment"))
            .map(|n| self.text(n).trim().to_owned())
            .collect()
    }

    fn go_docs(&self, anchor: Node<'_>) -> Option<String> {
        join_doc(
            leading_siblings(anchor, |n| n.kind() == "comment")
                .into_iter()
                .map(|c| strip_comment(self.text(c)))
                .collect(),
        )
    }

    fn go_module(&self, root: Node<'_>) -> ModuleParts {
        let mut parts = ModuleParts::default();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_clause" => {
                    for comment in leading_siblings(child, |n| n.kind() == "comment") {
                        parts.docs.push(strip_comment(self.text(comment)));
                        parts.cover(comment);
                    }
                }
                "import_declaration" => {
                    let mut inner = child.walk();
                    for spec in child.named_children(&mut inner) {
                        match spec.kind() {
                            "import_spec" => parts.imports.push(self.text(spec).trim().to_owned()),
                            "import_spec_list" => {
                                let mut list_cursor = spec.walk();
                                parts.imports.extend(
                                    spec.named_children(&mut list_cursor)
                                        .filter(|n| n.kind() == "import_spec")
                                        .map(|n| self.text(n).trim().to_owned()),
                                );
                            }
                            _ => {}
                        }
                    }
                    parts.cover(child);
                }
                _ => {}
            }
        }
        parts
    }
}

/// Last row (0-based) holding text of `node`; a node ending at column 0
/// ends on the previous row.
fn last_row(node: Node<'_>) -> usize {
    let end = node.end_position();
    if end.column == 0 && end.row > node.start_position().row {
        end.row - 1
    } else {
        end.row
    }
}

/// Siblings directly above `node` accepted by `accept`, with no blank line in
/// between, in source order.
fn leading_siblings<'t>(node: Node<'t>, accept: impl Fn(Node<'t>) -> bool) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut next_row = node.start_position().row;
    let mut current = node.prev_named_sibling();
    while let Some(sib) = current {
        if !accept(sib) || last_row(sib) + 1 < next_row {
            break;
        }
        next_row = sib.start_position().row;
        out.push(sib);
        current = sib.prev_named_sibling();
    }
    out.reverse();
    out
}

fn export_anchor(node: Node<'_>) -> Node<'_> {
    node.parent()
        .filter(|p| p.kind() == "export_statement")
        .unwrap_or(node)
}

/// `extends A<B, C> implements D, E` -> `["A<B, C>", "D", "E"]`.
fn split_heritage(text: &str) -> Vec<String> {
    split_top_level(text, |c| c == ',')
        .into_iter()
        .flat_map(|part| split_top_level(part, char::is_whitespace))
        .filter(|word| !matches!(*word, "extends" | "implements"))
        .map(str::to_owned)
        .collect()
}

/// Split on `is_sep` outside of `<>`, `()`, `[]` and `{}`; empty pieces are dropped.
fn split_top_level(text: &str, is_sep: impl Fn(char) -> bool) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' | '[' | '{' => depth += 1,
            '>' | ')' | ']' | '}' => depth = depth.saturating_sub(1),
            c if depth == 0 && is_sep(c) => {
                out.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(text[start..].trim());
    out.retain(|s| !s.is_empty());
    out
}

fn strip_line_comment<'a>(text: &'a str, marker: &str) -> &'a str {
    let text = text.trim();
    let text = text.strip_prefix(marker).unwrap_or(text);
    text.strip_prefix(' ').unwrap_or(text).trim_end()
}

fn strip_block_comment(text: &str) -> String {
    let text = text.trim();
    let inner = ["/**", "/*!", "/*"]
        .iter()
        .find_map(|open| text.strip_prefix(open))
        .unwrap_or(text);
    let inner = inner.strip_suffix("*/").unwrap_or(inner);
    let lines: Vec<&str> = inner
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line.strip_prefix('*').unwrap_or(line);
            line.strip_prefix(' ').unwrap_or(line)
        })
        .collect();
    trim_blank_edges(&lines).join("\n")
}

fn strip_comment(text: &str) -> String {
    if text.trim_start().starts_with("/*") {
        strip_block_comment(text)
    } else {
        strip_line_comment(text, "//").to_owned()
    }
}

fn join_doc(parts: Vec<String>) -> Option<String> {
    let doc = parts.join("\n");
    let doc = doc.trim();
    (!doc.is_empty()).then(|| doc.to_owned())
}

fn trim_blank_edges<'a, 'b>(lines: &'b [&'a str]) -> &'b [&'a str] {
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(start, |i| i + 1);
    &lines[start..end]
}

/// Body of a Python string literal with prefix and quotes removed.
fn python_string_value(raw: &str) -> &str {
    let body = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| body.strip_prefix(q).and_then(|b| b.strip_suffix(q)))
        .unwrap_or(body)
}

/// Docstring normalization: first line left-trimmed, common indentation of
/// the remaining lines removed, blank leading and trailing lines dropped.
fn cleandoc(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let dedented: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                return line.trim();
            }
            let indent = line.len() - line.trim_start().len();
            let cut = indent.min(margin);
            let cut = if line.is_char_boundary(cut) { cut } else { indent };
            line[cut..].trim_end()
        })
        .collect();
    trim_blank_edges(&dedented).join("\n")
}
