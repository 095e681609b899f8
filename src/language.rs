//! Tree-sitter AL language bindings

use tree_sitter::Language;

extern "C" {
    fn tree_sitter_al() -> Language;
}

/// Get the tree-sitter AL language
///
/// # Safety
/// This calls into the compiled C code from tree-sitter-al
pub fn language() -> Language {
    unsafe { tree_sitter_al() }
}

/// Node kinds that declare a method body (procedures and triggers)
pub const METHOD_KINDS: &[&str] = &[
    "procedure",
    "trigger_declaration",
    "named_trigger",
    "onrun_trigger",
];

/// Tree-sitter queries for extracting AL constructs
pub mod queries {
    /// Query to find the object declared in a file - use object_name field
    pub const OBJECTS: &str = r#"
(codeunit_declaration
  object_name: (_) @codeunit.name)

; Preprocessor-split codeunit (files with #if directives)
(preproc_split_codeunit_declaration
  object_name: (_) @codeunit.name)

(table_declaration
  object_name: (_) @table.name)

(page_declaration
  object_name: (_) @page.name)

(report_declaration
  object_name: (_) @report.name)

(query_declaration
  object_name: (_) @query.name)

(xmlport_declaration
  object_name: (_) @xmlport.name)

(enum_declaration
  object_name: (_) @enum.name)

(interface_declaration
  object_name: (_) @interface.name)

(controladdin_declaration
  object_name: (_) @controladdin.name)

(pageextension_declaration
  object_name: (_) @pageextension.name)

(tableextension_declaration
  object_name: (_) @tableextension.name)

(enumextension_declaration
  object_name: (_) @enumextension.name)

(permissionset_declaration
  object_name: (_) @permissionset.name)

(permissionsetextension_declaration
  object_name: (_) @permissionsetextension.name)
"#;
}
