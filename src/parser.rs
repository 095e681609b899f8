//! Tree-sitter based AL parser

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::path::Path;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Parser, Query, QueryCursor};

use crate::language;
use crate::object::ObjectType;
use crate::procedure::clean_name;
use crate::syntax::SyntaxTree;

// Thread-local parser to avoid recompiling queries for every document
thread_local! {
    static PARSER: RefCell<Option<AlParser>> = const { RefCell::new(None) };
}

/// Object declared by a single file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// Object type in this file
    pub object_type: Option<ObjectType>,
    /// Object id in this file
    pub object_id: Option<u32>,
    /// Object name in this file
    pub object_name: Option<String>,
}

/// A parsed document: its syntax tree plus the object it declares
pub struct ParsedDocument {
    pub tree: SyntaxTree,
    pub info: ParsedFile,
}

/// AL file parser using tree-sitter
pub struct AlParser {
    parser: Parser,
    objects_query: Query,
}

impl AlParser {
    pub fn new() -> Result<Self> {
        let lang = language::language();

        let mut parser = Parser::new();
        parser.set_language(&lang).context("Failed to set language")?;

        let objects_query = Query::new(&lang, language::queries::OBJECTS)
            .context("Failed to compile objects query")?;

        Ok(Self {
            parser,
            objects_query,
        })
    }

    /// Parse AL source into a syntax tree
    pub fn parse(&mut self, source: &str) -> Result<SyntaxTree> {
        let tree = self
            .parser
            .parse(source, None)
            .context("Failed to parse document")?;
        Ok(SyntaxTree::new(tree, source.to_string()))
    }

    /// Parse an AL file and extract the object it declares
    pub fn parse_file(&mut self, path: &Path, source: &str) -> Result<ParsedFile> {
        let tree = self
            .parse(source)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(self.object_info(&tree))
    }

    /// Find the first object declaration of a document
    pub fn object_info(&self, tree: &SyntaxTree) -> ParsedFile {
        let mut cursor = QueryCursor::new();
        let source = tree.source();

        let mut matches = cursor.matches(&self.objects_query, tree.root(), source.as_bytes());

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                let capture_name = &self.objects_query.capture_names()[capture.index as usize];
                let Some(type_name) = capture_name.strip_suffix(".name") else {
                    continue;
                };
                let Ok(object_type) = ObjectType::try_from(type_name) else {
                    continue;
                };

                return ParsedFile {
                    object_type: Some(object_type),
                    object_id: node.parent().and_then(|decl| object_id(&decl, &node, source)),
                    object_name: Some(clean_name(tree.text(&node))),
                };
            }
        }

        ParsedFile::default()
    }
}

/// The id is the integer between the object keyword and the object name
fn object_id(declaration: &Node, name: &Node, source: &str) -> Option<u32> {
    let header = source.get(declaration.start_byte()..name.start_byte())?;
    header
        .split_whitespace()
        .find_map(|token| token.parse::<u32>().ok())
}

/// Run `f` with this thread's parser, creating it on first use
pub fn with_parser<T>(f: impl FnOnce(&mut AlParser) -> Result<T>) -> Result<T> {
    PARSER.with(|cell| {
        let mut parser_opt = cell.borrow_mut();
        if parser_opt.is_none() {
            *parser_opt = Some(AlParser::new()?);
        }
        let parser = parser_opt.as_mut().context("Parser not initialized")?;
        f(parser)
    })
}

/// Parse a whole document on this thread's parser
pub fn parse_document(source: &str) -> Result<ParsedDocument> {
    with_parser(|parser| {
        let tree = parser.parse(source)?;
        let info = parser.object_info(&tree);
        Ok(ParsedDocument { tree, info })
    })
}
