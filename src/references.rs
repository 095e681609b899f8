//! Find references for test handler functions
//!
//! A handler such as `[ConfirmHandler] procedure ConfirmYes(...)` is never
//! called directly; test methods name it inside
//! `[HandlerFunctions('ConfirmYes,MessageOk')]`. References are the
//! positions of the name inside those literals.

use lsp_types::{Location, Position, Range, Uri};
use tree_sitter::Node;

use crate::procedure::clean_name;
use crate::syntax::{Attribute, SyntaxTree};

/// Attributes that make a procedure a test handler (lowercase)
const HANDLER_ATTRIBUTES: &[&str] = &[
    "confirmhandler",
    "filterpagehandler",
    "hyperlinkhandler",
    "messagehandler",
    "modalpagehandler",
    "pagehandler",
    "recallnotificationhandler",
    "reporthandler",
    "requestpagehandler",
    "sendnotificationhandler",
    "sessionsettingshandler",
    "strmenuhandler",
];

const HANDLER_FUNCTIONS_ATTRIBUTE: &str = "HandlerFunctions";

/// References to the handler function whose name is at `position`.
/// `None` when the position is not on the name of a handler function.
pub fn find_handler_references(
    tree: &SyntaxTree,
    uri: &Uri,
    position: Position,
    include_declaration: bool,
) -> Option<Vec<Location>> {
    let node = tree.node_at(position)?;
    let (method, name_node) = procedure_name_at(node)?;
    if !is_handler_function(tree, &method) {
        return None;
    }

    let handler_name = clean_name(tree.text(&name_node));
    let mut locations = Vec::new();

    if include_declaration {
        locations.push(Location::new(uri.clone(), tree.range_of(&name_node)));
    }

    locations.extend(
        tree.methods()
            .iter()
            .filter_map(|m| reference_in_method(tree, m, &handler_name))
            .map(|range| Location::new(uri.clone(), range)),
    );

    Some(locations)
}

/// The procedure whose `name` node contains `node`
fn procedure_name_at(node: Node<'_>) -> Option<(Node<'_>, Node<'_>)> {
    let mut current = node;
    loop {
        let parent = current.parent()?;
        if parent.kind() == "procedure" {
            let name = parent.child_by_field_name("name")?;
            return (name.id() == current.id()).then_some((parent, name));
        }
        current = parent;
    }
}

fn is_handler_function(tree: &SyntaxTree, method: &Node) -> bool {
    tree.attributes(method).iter().any(|attribute| {
        HANDLER_ATTRIBUTES.contains(&attribute.name.to_ascii_lowercase().as_str())
    })
}

/// First mention of `handler_name` in the method's `HandlerFunctions` attributes
fn reference_in_method(tree: &SyntaxTree, method: &Node, handler_name: &str) -> Option<Range> {
    tree.attributes(method)
        .iter()
        .filter(|a| a.name.eq_ignore_ascii_case(HANDLER_FUNCTIONS_ATTRIBUTE))
        .find_map(|a| {
            let (start, end) = handler_name_offsets(a, handler_name)?;
            Some(tree.byte_range_to_range(start, end))
        })
}

/// Byte range of `handler_name` inside the attribute's string literal
fn handler_name_offsets(attribute: &Attribute, handler_name: &str) -> Option<(usize, usize)> {
    let arguments = attribute.arguments.as_deref()?;
    let open = arguments.find('\'')?;
    let literal_len = arguments[open + 1..].find('\'')?;
    let literal = &arguments[open + 1..open + 1 + literal_len];
    let literal_start = attribute.arguments_offset + open + 1;

    let mut offset = 0;
    for entry in literal.split(',') {
        let trimmed = entry.trim();
        if trimmed.eq_ignore_ascii_case(handler_name) {
            let start = literal_start + offset + entry.len() - entry.trim_start().len();
            return Some((start, start + trimmed.len()));
        }
        offset += entry.len() + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    const TEST_CODEUNIT: &str = r#"codeunit 50200 "Posting Tests"
{
    Subtype = Test;

    [Test]
    [HandlerFunctions('ConfirmYes,MessageOk')]
    procedure PostWithConfirm()
    begin
    end;

    [Test]
    [HandlerFunctions('MessageOk, confirmyes')]
    procedure PostTwice()
    begin
    end;

    [Test]
    procedure PostWithoutHandlers()
    begin
        ConfirmYes('', Reply);
    end;

    [ConfirmHandler]
    procedure ConfirmYes(Question: Text[1024]; var Reply: Boolean)
    begin
        Reply := true;
    end;

    [MessageHandler]
    procedure MessageOk(Message: Text[1024])
    begin
    end;

    procedure NotAHandler()
    begin
    end;
}
"#;

    fn uri() -> Uri {
        "file:///ws/PostingTests.Codeunit.al".parse().unwrap()
    }

    /// Position inside the declaration of `name`
    fn declaration_position(tree: &SyntaxTree, name: &str) -> Position {
        let offset = tree
            .source()
            .find(&format!("procedure {}(", name))
            .expect("procedure in fixture")
            + "procedure ".len()
            + 2;
        tree.offset_to_position(offset)
    }

    fn texts(tree: &SyntaxTree, locations: &[Location]) -> Vec<String> {
        locations
            .iter()
            .map(|l| {
                let start = tree.position_to_offset(l.range.start);
                let end = tree.position_to_offset(l.range.end);
                tree.source()[start..end].to_string()
            })
            .collect()
    }

    #[test]
    fn test_references_of_confirm_handler() {
        let doc = parse_document(TEST_CODEUNIT).unwrap();
        let tree = &doc.tree;
        let locations =
            find_handler_references(tree, &uri(), declaration_position(tree, "ConfirmYes"), false)
                .unwrap();

        assert_eq!(locations.len(), 2);
        assert_eq!(texts(tree, &locations), vec!["ConfirmYes", "confirmyes"]);

        let first_line = tree
            .offset_to_position(TEST_CODEUNIT.find("[HandlerFunctions('ConfirmYes").unwrap())
            .line;
        assert_eq!(locations[0].range.start, Position::new(first_line, 23));
        assert_eq!(locations[0].uri, uri());
    }

    #[test]
    fn test_references_skip_blank_after_comma() {
        let doc = parse_document(TEST_CODEUNIT).unwrap();
        let tree = &doc.tree;
        let locations =
            find_handler_references(tree, &uri(), declaration_position(tree, "ConfirmYes"), false)
                .unwrap();
        let second = &locations[1];
        let line = tree.line_text(second.range.start.line);
        assert_eq!(
            second.range.start.character as usize,
            line.find("confirmyes").unwrap()
        );
    }

    #[test]
    fn test_references_include_declaration() {
        let doc = parse_document(TEST_CODEUNIT).unwrap();
        let tree = &doc.tree;
        let locations =
            find_handler_references(tree, &uri(), declaration_position(tree, "MessageOk"), true)
                .unwrap();
        assert_eq!(texts(tree, &locations), vec!["MessageOk", "MessageOk", "MessageOk"]);
    }

    #[test]
    fn test_no_references_for_plain_procedure() {
        let doc = parse_document(TEST_CODEUNIT).unwrap();
        let tree = &doc.tree;
        let position = declaration_position(tree, "NotAHandler");
        assert!(find_handler_references(tree, &uri(), position, false).is_none());
    }

    #[test]
    fn test_no_references_outside_procedure_name() {
        let doc = parse_document(TEST_CODEUNIT).unwrap();
        let tree = &doc.tree;
        let call = TEST_CODEUNIT.find("ConfirmYes('', Reply)").unwrap() + 2;
        let position = tree.offset_to_position(call);
        assert!(find_handler_references(tree, &uri(), position, false).is_none());
    }

    #[test]
    fn test_handler_name_offsets_counts_characters() {
        let attribute = Attribute {
            name: "HandlerFunctions".to_string(),
            arguments: Some("'First,Second ,  Third'".to_string()),
            arguments_offset: 100,
        };
        assert_eq!(handler_name_offsets(&attribute, "first"), Some((101, 106)));
        assert_eq!(handler_name_offsets(&attribute, "Second"), Some((107, 113)));
        assert_eq!(handler_name_offsets(&attribute, "Third"), Some((117, 122)));
        assert_eq!(handler_name_offsets(&attribute, "Fourth"), None);

        let empty = Attribute {
            arguments: Some("''".to_string()),
            ..attribute
        };
        assert_eq!(handler_name_offsets(&empty, "First"), None);
    }
}
