//! Source navigation helpers over one AL document: method lookup,
//! insertion points for new procedures and invocation analysis.

use lsp_types::{Position, Range};
use tree_sitter::Node;

use crate::procedure::clean_name;
use crate::syntax::{matching_paren, SyntaxTree};

/// Keywords after which a call result is used as a condition
const BOOLEAN_CONTEXT_KEYWORDS: &[&str] = &["if", "not", "while", "until", "and", "or", "xor"];

/// Where a new procedure goes and how it is separated from its surroundings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionPoint {
    /// Right after an existing member
    AfterMember(Position),
    /// In front of the object's closing brace
    BeforeClosingBrace {
        position: Position,
        /// The brace starts its own line and the position is that line's start
        own_line: bool,
    },
}

impl InsertionPoint {
    pub fn position(&self) -> Position {
        match *self {
            Self::AfterMember(position) => position,
            Self::BeforeClosingBrace { position, .. } => position,
        }
    }

    /// Surround rendered procedure text with the line breaks this point needs
    pub fn wrap(&self, text: &str, eol: &str) -> String {
        match self {
            Self::AfterMember(_) => format!("{eol}{eol}{text}"),
            Self::BeforeClosingBrace { own_line: true, .. } => format!("{text}{eol}"),
            Self::BeforeClosingBrace { own_line: false, .. } => format!("{eol}{text}{eol}"),
        }
    }
}

/// An invocation found at a diagnostic range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureCallSite {
    /// Called procedure name
    pub name: String,
    /// Variable the procedure is called on (`Receiver.Name(...)`)
    pub receiver: Option<String>,
    /// Argument expressions as written
    pub arguments: Vec<String>,
    /// Left-hand side when the result is assigned (`Target := Name(...)`)
    pub assignment_target: Option<String>,
    /// The result is used as a condition (`if Name(...) then`)
    pub boolean_context: bool,
    /// Receiver (if any) through the closing parenthesis
    pub call_range: Range,
    /// Whole statement, present when the call is a statement or an assignment
    pub statement_range: Option<Range>,
}

pub struct AlSourceCodeHandler<'a> {
    tree: &'a SyntaxTree,
}

impl<'a> AlSourceCodeHandler<'a> {
    pub fn new(tree: &'a SyntaxTree) -> Self {
        Self { tree }
    }

    /// Name of the procedure or trigger spanning `line`
    pub fn procedure_or_trigger_name_at(&self, line: u32) -> Option<String> {
        let method = self.method_at_line(line)?;
        self.tree.method_name(&method)
    }

    fn method_at_line(&self, line: u32) -> Option<Node<'a>> {
        self.tree.methods().into_iter().find(|m| {
            let range = self.tree.range_of(m);
            range.start.line <= line && line <= range.end.line
        })
    }

    /// Where to insert a new procedure. With `line` inside a member of the
    /// object, right after that member; otherwise after the object's last
    /// procedure or trigger, or in front of the closing brace when it has none.
    pub fn position_to_insert_procedure(&self, line: Option<u32>) -> Option<InsertionPoint> {
        let declaration = self.tree.object_declaration()?;

        if let Some(method) = line.and_then(|l| self.method_at_line(l)) {
            if self.is_object_member(&method, &declaration) {
                return Some(InsertionPoint::AfterMember(self.end_of_member(&method)));
            }
        }

        let last_member = self
            .tree
            .methods()
            .into_iter()
            .filter(|m| m.end_byte() <= declaration.end_byte())
            .filter(|m| self.is_object_member(m, &declaration))
            .last();
        if let Some(method) = last_member {
            return Some(InsertionPoint::AfterMember(self.end_of_member(&method)));
        }

        let source = self.tree.source();
        let brace = declaration.start_byte() + self.tree.text(&declaration).rfind('}')?;
        let line_start = source[..brace].rfind('\n').map(|i| i + 1).unwrap_or(0);
        if source[line_start..brace].trim().is_empty() {
            Some(InsertionPoint::BeforeClosingBrace {
                position: self.tree.offset_to_position(line_start),
                own_line: true,
            })
        } else {
            Some(InsertionPoint::BeforeClosingBrace {
                position: self.tree.offset_to_position(brace),
                own_line: false,
            })
        }
    }

    /// Procedures always are; triggers only when declared on the object
    /// itself rather than on a field, action or data item
    fn is_object_member(&self, method: &Node, declaration: &Node) -> bool {
        if method.kind() == "procedure" {
            return true;
        }
        let parent = method.parent();
        let grandparent = parent.and_then(|p| p.parent());
        [parent, grandparent]
            .into_iter()
            .flatten()
            .any(|ancestor| ancestor.id() == declaration.id())
    }

    /// End of a member including a trailing semicolon the grammar may leave outside
    fn end_of_member(&self, method: &Node) -> Position {
        let source = self.tree.source();
        let end = method.end_byte();
        let rest = &source[end..];
        let blanks = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        let end = if rest[blanks..].starts_with(';') {
            end + blanks + 1
        } else {
            end
        };
        self.tree.offset_to_position(end)
    }

    /// Whether the name at `range` is being invoked
    pub fn is_invocation_expression(&self, range: Range) -> bool {
        let start = self.tree.position_to_offset(range.start);
        let end = self.tree.position_to_offset(range.end);

        // The innermost call decides: in `GetCu(Name).Run()` the name is an argument
        let mut current = self.tree.root().descendant_for_byte_range(start, end);
        while let Some(node) = current {
            if node.kind() == "call_expression" {
                return node
                    .child_by_field_name("function")
                    .is_some_and(|function| function.start_byte() <= start && end <= function.end_byte());
            }
            current = node.parent();
        }

        self.tree.source()[end..].trim_start().starts_with('(')
    }

    /// Analyze the invocation whose procedure name is at `range`
    pub fn procedure_call_at(&self, range: Range) -> Option<ProcedureCallSite> {
        let source = self.tree.source();
        let start = self.tree.position_to_offset(range.start);
        let end = self.tree.position_to_offset(range.end);
        if start >= end {
            return None;
        }

        let name = clean_name(&source[start..end]);
        if name.is_empty() {
            return None;
        }

        let (call_start, receiver) = match source[..start].strip_suffix('.') {
            Some(head) => match identifier_before(head) {
                Some((receiver_start, receiver)) => (receiver_start, Some(receiver)),
                None => (start, None),
            },
            None => (start, None),
        };

        let after = &source[end..];
        let gap = after.len() - after.trim_start().len();
        let (call_end, arguments) = if after[gap..].starts_with('(') {
            let open = end + gap;
            let close = matching_paren(source, open)?;
            (close + 1, split_arguments(&source[open + 1..close]))
        } else {
            (end, Vec::new())
        };

        let line_start = source[..call_start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let prefix = &source[line_start..call_start];
        let indent = prefix.len() - prefix.trim_start().len();
        let trimmed = prefix.trim();

        let (assignment_target, statement_start) = if trimmed.is_empty() {
            (None, Some(call_start))
        } else if let Some(lhs) = trimmed.strip_suffix(":=") {
            let lhs = lhs.trim();
            if is_assignable(lhs) {
                (Some(clean_name(lhs)), Some(line_start + indent))
            } else {
                (None, None)
            }
        } else {
            (None, None)
        };

        let boolean_context = statement_start.is_none() && ends_with_boolean_keyword(trimmed);

        Some(ProcedureCallSite {
            name,
            receiver,
            arguments,
            assignment_target,
            boolean_context,
            call_range: self.tree.byte_range_to_range(call_start, call_end),
            statement_range: statement_start
                .map(|statement_start| self.tree.byte_range_to_range(statement_start, call_end)),
        })
    }
}

/// Identifier (bare or quoted) ending at the end of `text`, with its start offset
fn identifier_before(text: &str) -> Option<(usize, String)> {
    if let Some(head) = text.strip_suffix('"') {
        let open = head.rfind('"')?;
        return Some((open, head[open + 1..].to_string()));
    }
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map(|(i, _)| i)?;
    Some((start, text[start..].to_string()))
}

/// Split an argument list at top-level commas
pub fn split_arguments(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut arguments = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut in_quoted_identifier = false;
    let mut current = String::new();

    for c in text.chars() {
        match c {
            '\'' if !in_quoted_identifier => in_string = !in_string,
            '"' if !in_string => in_quoted_identifier = !in_quoted_identifier,
            '(' | '[' if !in_string && !in_quoted_identifier => depth += 1,
            ')' | ']' if !in_string && !in_quoted_identifier => depth = depth.saturating_sub(1),
            ',' if depth == 0 && !in_string && !in_quoted_identifier => {
                arguments.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    arguments.push(current.trim().to_string());

    arguments
}

fn is_assignable(lhs: &str) -> bool {
    !lhs.is_empty()
        && !lhs.contains(['(', ')', ';'])
        && identifier_before(lhs).is_some()
}

fn ends_with_boolean_keyword(prefix: &str) -> bool {
    let last_word = prefix
        .rsplit(|c: char| c.is_whitespace() || c == '(')
        .find(|w| !w.is_empty())
        .unwrap_or("");
    BOOLEAN_CONTEXT_KEYWORDS
        .iter()
        .any(|keyword| last_word.eq_ignore_ascii_case(keyword))
}
