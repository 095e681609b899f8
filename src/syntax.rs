//! Owned syntax tree of one document version plus position arithmetic
//!
//! Tree-sitter reports byte offsets while LSP positions count UTF-16 code
//! units per line, so every range handed to the client goes through the
//! line index kept here.

use lsp_types::{Position, Range};
use tree_sitter::{Node, Tree};

use crate::language::METHOD_KINDS;
use crate::procedure::{clean_name, AlVariable};

/// A `[Name(arguments)]` attribute attached to a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Text between the parentheses, `None` for attributes without them
    pub arguments: Option<String>,
    /// Byte offset of the first character inside the parentheses
    pub arguments_offset: usize,
}

/// Parsed AL document
pub struct SyntaxTree {
    tree: Tree,
    source: String,
    line_starts: Vec<usize>,
}

impl SyntaxTree {
    pub fn new(tree: Tree, source: String) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            tree,
            source,
            line_starts,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Get the text of a node
    pub fn text(&self, node: &Node) -> &str {
        &self.source[node.byte_range()]
    }

    /// Text of a line without its line terminator
    pub fn line_text(&self, line: u32) -> &str {
        let Some(&start) = self.line_starts.get(line as usize) else {
            return "";
        };
        let end = self
            .line_starts
            .get(line as usize + 1)
            .copied()
            .unwrap_or(self.source.len());
        self.source[start..end].trim_end_matches(['\n', '\r'])
    }

    /// `\r\n` if the document uses it, `\n` otherwise
    pub fn line_ending(&self) -> &'static str {
        if self.source.contains("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }

    pub fn offset_to_position(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.source.len());
        while !self.source.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let character = self.source[self.line_starts[line]..offset]
            .encode_utf16()
            .count();
        Position {
            line: line as u32,
            character: character as u32,
        }
    }

    /// Byte offset of an LSP position; clamps past the end of the line or document
    pub fn position_to_offset(&self, position: Position) -> usize {
        let Some(&start) = self.line_starts.get(position.line as usize) else {
            return self.source.len();
        };
        let line = self.line_text(position.line);
        let mut units = 0u32;
        for (i, c) in line.char_indices() {
            if units >= position.character {
                return start + i;
            }
            units += c.len_utf16() as u32;
        }
        start + line.len()
    }

    pub fn byte_range_to_range(&self, start: usize, end: usize) -> Range {
        Range {
            start: self.offset_to_position(start),
            end: self.offset_to_position(end),
        }
    }

    /// Convert a tree-sitter node to LSP Range
    pub fn range_of(&self, node: &Node) -> Range {
        self.byte_range_to_range(node.start_byte(), node.end_byte())
    }

    /// Smallest node spanning the position
    pub fn node_at(&self, position: Position) -> Option<Node<'_>> {
        let offset = self.position_to_offset(position);
        self.root().descendant_for_byte_range(offset, offset)
    }

    /// The object declaration of the document (first top-level declaration)
    pub fn object_declaration(&self) -> Option<Node<'_>> {
        let root = self.root();
        let mut cursor = root.walk();
        let found = root
            .named_children(&mut cursor)
            .find(|child| child.kind().ends_with("_declaration"));
        found
    }

    /// All procedures and triggers in document order
    pub fn methods(&self) -> Vec<Node<'_>> {
        let mut methods = Vec::new();
        collect_nodes(self.root(), METHOD_KINDS, &mut methods);
        methods
    }

    /// The procedure or trigger spanning the byte offset
    pub fn containing_method(&self, offset: usize) -> Option<Node<'_>> {
        self.methods()
            .into_iter()
            .find(|m| m.start_byte() <= offset && offset < m.end_byte())
    }

    /// The `name` node of a procedure or trigger declaration
    pub fn method_name_node<'t>(&self, method: &Node<'t>) -> Option<Node<'t>> {
        match method.kind() {
            "procedure" | "trigger_declaration" | "named_trigger" | "onrun_trigger" => {
                method.child_by_field_name("name")
            }
            _ => None,
        }
    }

    /// Name of a procedure or trigger
    pub fn method_name(&self, method: &Node) -> Option<String> {
        if let Some(name_node) = self.method_name_node(method) {
            return Some(clean_name(self.text(&name_node)));
        }
        trigger_name_from_text(self.text(method))
    }

    /// Attributes declared on a method
    pub fn attributes(&self, method: &Node) -> Vec<Attribute> {
        let mut cursor = method.walk();
        method
            .children(&mut cursor)
            .filter(|child| child.kind() == "attribute_item")
            .filter_map(|item| parse_attribute(self.text(&item), item.start_byte()))
            .collect()
    }

    /// Variables and parameters visible at the byte offset: locals and
    /// parameters of the containing method first, then globals
    pub fn variables_in_scope(&self, offset: usize) -> Vec<AlVariable> {
        let mut variables = Vec::new();

        let method = self.containing_method(offset);
        if let Some(method) = method {
            let mut locals = Vec::new();
            collect_nodes(method, &["parameter", "variable_declaration"], &mut locals);
            for node in locals {
                variables.extend(self.declared_variables(&node));
            }
        }

        let mut all = Vec::new();
        collect_nodes(self.root(), &["variable_declaration"], &mut all);
        for node in all {
            let inside_method = self
                .containing_method(node.start_byte())
                .is_some();
            if !inside_method {
                variables.extend(self.declared_variables(&node));
            }
        }

        variables
    }

    fn declared_variables(&self, node: &Node) -> Vec<AlVariable> {
        let text = self.text(node);
        let by_ref = node.kind() == "parameter" && starts_with_keyword(text.trim_start(), "var");

        let Some(type_text) = extract_var_type(node, self) else {
            return Vec::new();
        };

        extract_var_names(node, self)
            .into_iter()
            .map(|name| AlVariable {
                name,
                type_text: type_text.clone(),
                by_ref,
            })
            .collect()
    }
}

/// Recursively collect nodes whose kind is one of `kinds`
pub fn collect_nodes<'t>(node: Node<'t>, kinds: &[&str], out: &mut Vec<Node<'t>>) {
    if kinds.contains(&node.kind()) {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_nodes(child, kinds, out);
    }
}

/// Extract variable names from a declaration node
fn extract_var_names(node: &Node, tree: &SyntaxTree) -> Vec<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        return vec![clean_name(tree.text(&name_node))];
    }
    // Comma-separated declarations: "a, b: Integer"
    if let Some(names_node) = node.child_by_field_name("names") {
        let mut cursor = names_node.walk();
        return names_node
            .children(&mut cursor)
            .filter(|c| c.kind() == "identifier" || c.kind() == "quoted_identifier")
            .map(|c| clean_name(tree.text(&c)))
            .collect();
    }
    // Fall back to the text before the colon
    let text = tree.text(node).trim_start();
    let text = strip_keyword(text, "var");
    match split_at_colon(text) {
        Some((names, _)) => names
            .split(',')
            .map(clean_name)
            .filter(|n| !n.is_empty())
            .collect(),
        None => Vec::new(),
    }
}

/// Extract variable type text from a declaration node
fn extract_var_type(node: &Node, tree: &SyntaxTree) -> Option<String> {
    if let Some(type_node) = node.child_by_field_name("type") {
        return Some(tidy_type(tree.text(&type_node)));
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(child.kind(), "type_specification" | "basic_type") {
            return Some(tidy_type(tree.text(&child)));
        }
    }
    split_at_colon(tree.text(node))
        .map(|(_, ty)| tidy_type(ty))
        .filter(|ty| !ty.is_empty())
}

fn tidy_type(text: &str) -> String {
    text.trim().trim_end_matches(';').trim().to_string()
}

/// Split a declaration at the first colon outside quotes
fn split_at_colon(text: &str) -> Option<(&str, &str)> {
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => return Some((&text[..i], &text[i + 1..])),
            _ => {}
        }
    }
    None
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.get(..keyword.len())
        .map(|head| head.eq_ignore_ascii_case(keyword))
        .unwrap_or(false)
        && text[keyword.len()..].starts_with(char::is_whitespace)
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> &'a str {
    if starts_with_keyword(text, keyword) {
        text[keyword.len()..].trim_start()
    } else {
        text
    }
}

/// Parse `[Name(arguments)]`; `start` is the byte offset of `text` in the document
fn parse_attribute(text: &str, start: usize) -> Option<Attribute> {
    let open_bracket = text.find('[')?;
    let inner = &text[open_bracket + 1..];
    let inner_start = start + open_bracket + 1;

    let leading = inner.len() - inner.trim_start().len();
    let body = &inner[leading..];
    let name_len = body
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(body.len());
    if name_len == 0 {
        return None;
    }
    let name = body[..name_len].to_string();

    let after_name = &body[name_len..];
    let gap = after_name.len() - after_name.trim_start().len();
    let after_name = &after_name[gap..];
    if !after_name.starts_with('(') {
        return Some(Attribute {
            name,
            arguments: None,
            arguments_offset: inner_start + leading + name_len,
        });
    }

    let close = matching_paren(after_name, 0)?;
    let arguments_offset = inner_start + leading + name_len + gap + 1;
    Some(Attribute {
        name,
        arguments: Some(after_name[1..close].to_string()),
        arguments_offset,
    })
}

/// Index of the parenthesis closing the one at `open`, skipping string literals
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut in_quoted_identifier = false;
    for (i, c) in text[open..].char_indices() {
        match c {
            '\'' if !in_quoted_identifier => in_string = !in_string,
            '"' if !in_string => in_quoted_identifier = !in_quoted_identifier,
            '(' if !in_string && !in_quoted_identifier => depth += 1,
            ')' if !in_string && !in_quoted_identifier => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Name following the `trigger` keyword, e.g. "trigger OnRun()" -> "OnRun"
fn trigger_name_from_text(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let keyword = lower.find("trigger")?;
    let rest = text[keyword + "trigger".len()..].trim_start();
    let end = rest
        .find(|c: char| c == '(' || c.is_whitespace())
        .unwrap_or(rest.len());
    let name = clean_name(&rest[..end]);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
