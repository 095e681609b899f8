//! Procedures to be generated and the variables they are built from

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::object::AlObject;

/// A variable or parameter declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlVariable {
    pub name: String,
    /// Type text as written in the declaration, e.g. `Record "Sales Header"`
    pub type_text: String,
    /// Passed by reference (`var`)
    #[serde(default)]
    pub by_ref: bool,
}

impl AlVariable {
    pub fn new(name: impl Into<String>, type_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_text: type_text.into(),
            by_ref: false,
        }
    }

    /// Keyword of a complex type (`Record`, `Codeunit`, ...), `None` for simple types
    pub fn type_kind(&self) -> Option<String> {
        parse_type_specification(&self.type_text).0
    }

    /// Referenced object name for complex types, the bare type otherwise
    pub fn type_name(&self) -> String {
        parse_type_specification(&self.type_text).1
    }

    pub fn is_record(&self) -> bool {
        self.type_kind()
            .map(|k| k.eq_ignore_ascii_case("record"))
            .unwrap_or(false)
    }

    fn render(&self) -> String {
        let prefix = if self.by_ref { "var " } else { "" };
        format!("{}{}: {}", prefix, quote_identifier(&self.name), self.type_text)
    }
}

/// Parse a type specification like "Record \"Customer\"" into (kind, name)
pub fn parse_type_specification(type_text: &str) -> (Option<String>, String) {
    let trimmed = type_text.trim();

    let type_patterns = [
        "Record",
        "Codeunit",
        "Page",
        "Report",
        "Query",
        "XmlPort",
        "Enum",
        "Interface",
    ];

    for pattern in type_patterns {
        let Some(head) = trimmed.get(..pattern.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(pattern) {
            continue;
        }
        let rest = &trimmed[pattern.len()..];
        // "Recordref" and friends are simple types
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        if let Some(name) = extract_quoted_name(rest) {
            return (Some(pattern.to_string()), name);
        }
    }

    (None, clean_name(trimmed))
}

/// Extract a quoted name like "\"Customer\"" -> "Customer"
fn extract_quoted_name(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if let Some(inner) = trimmed.strip_prefix('"') {
        if let Some(end) = inner.find('"') {
            return Some(inner[..end].to_string());
        }
    }
    // Unquoted names end at the first blank ("Record Customer temporary")
    trimmed
        .split_whitespace()
        .next()
        .map(|name| clean_name(name.trim_end_matches(';')))
        .filter(|name| !name.is_empty())
}

/// Clean up a name (remove quotes, trim whitespace)
pub fn clean_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_string()
}

/// Quote an identifier when AL requires it
pub fn quote_identifier(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessModifier {
    Local,
    Public,
}

/// What kind of procedure gets generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcedureKind {
    Method,
    IntegrationEvent,
    BusinessEvent,
}

impl ProcedureKind {
    fn attribute(self) -> Option<&'static str> {
        match self {
            Self::Method => None,
            Self::IntegrationEvent => Some("[IntegrationEvent(false, false)]"),
            Self::BusinessEvent => Some("[BusinessEvent(false)]"),
        }
    }
}

/// A procedure that does not exist yet, together with the object it goes into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlProcedure {
    pub name: String,
    pub parameters: Vec<AlVariable>,
    pub return_type: Option<String>,
    pub access: AccessModifier,
    pub kind: ProcedureKind,
    pub object: AlObject,
}

impl AlProcedure {
    /// Render the procedure as AL source, each line prefixed with `indent`
    pub fn render(&self, indent: &str, eol: &str, not_implemented_body: bool) -> String {
        let mut lines: Vec<String> = Vec::with_capacity(5);

        if let Some(attribute) = self.kind.attribute() {
            lines.push(format!("{}{}", indent, attribute));
        }

        let access = match self.access {
            AccessModifier::Local => "local ",
            AccessModifier::Public => "",
        };
        let parameters = self
            .parameters
            .iter()
            .map(AlVariable::render)
            .collect::<Vec<_>>()
            .join("; ");
        let return_type = self
            .return_type
            .as_ref()
            .map(|t| format!(": {}", t))
            .unwrap_or_default();
        lines.push(format!(
            "{}{}procedure {}({}){}",
            indent,
            access,
            quote_identifier(&self.name),
            parameters,
            return_type
        ));

        lines.push(format!("{}begin", indent));
        if self.kind == ProcedureKind::Method && not_implemented_body {
            lines.push(format!(
                "{}{}Error('Procedure {} not implemented.');",
                indent,
                indent,
                self.name.replace('\'', "''")
            ));
        }
        lines.push(format!("{}end;", indent));

        lines.join(eol)
    }
}

impl fmt::Display for AlProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.object, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectType;
    use std::path::PathBuf;

    fn procedure(kind: ProcedureKind, access: AccessModifier) -> AlProcedure {
        let mut customer = AlVariable::new("Customer", "Record Customer");
        customer.by_ref = true;
        AlProcedure {
            name: "CheckCustomer".to_string(),
            parameters: vec![customer, AlVariable::new("myInteger", "Integer")],
            return_type: Some("Boolean".to_string()),
            access,
            kind,
            object: AlObject {
                object_type: ObjectType::Codeunit,
                id: Some(50100),
                name: "My Codeunit".to_string(),
                file: PathBuf::from("/ws/MyCodeunit.al"),
            },
        }
    }

    #[test]
    fn test_render_local_method() {
        let text = procedure(ProcedureKind::Method, AccessModifier::Local).render("    ", "\n", true);
        assert_eq!(
            text,
            "    local procedure CheckCustomer(var Customer: Record Customer; myInteger: Integer): Boolean\n\
             \x20   begin\n\
             \x20       Error('Procedure CheckCustomer not implemented.');\n\
             \x20   end;"
        );
    }

    #[test]
    fn test_render_method_without_body() {
        let text = procedure(ProcedureKind::Method, AccessModifier::Public).render("  ", "\r\n", false);
        assert_eq!(
            text,
            "  procedure CheckCustomer(var Customer: Record Customer; myInteger: Integer): Boolean\r\n  begin\r\n  end;"
        );
    }

    #[test]
    fn test_render_events_carry_attribute_and_empty_body() {
        let mut event = procedure(ProcedureKind::IntegrationEvent, AccessModifier::Local);
        event.return_type = None;
        let text = event.render("    ", "\n", true);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "    [IntegrationEvent(false, false)]");
        assert!(lines[1].starts_with("    local procedure CheckCustomer("));
        assert_eq!(lines[2], "    begin");
        assert_eq!(lines[3], "    end;");

        event.kind = ProcedureKind::BusinessEvent;
        assert!(event.render("", "\n", true).starts_with("[BusinessEvent(false)]\n"));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("Customer"), "Customer");
        assert_eq!(quote_identifier("Sales Header"), "\"Sales Header\"");
        assert_eq!(quote_identifier("No."), "\"No.\"");
        assert_eq!(quote_identifier("1st"), "\"1st\"");
    }

    #[test]
    fn test_type_specification_parsing() {
        let (kind, name) = parse_type_specification("Record \"Customer\"");
        assert_eq!(kind.as_deref(), Some("Record"));
        assert_eq!(name, "Customer");

        let (kind, name) = parse_type_specification("Codeunit \"Sales-Post\"");
        assert_eq!(kind.as_deref(), Some("Codeunit"));
        assert_eq!(name, "Sales-Post");

        let (kind, name) = parse_type_specification("Record Customer temporary");
        assert_eq!(kind.as_deref(), Some("Record"));
        assert_eq!(name, "Customer");

        let (kind, name) = parse_type_specification("RecordRef");
        assert!(kind.is_none());
        assert_eq!(name, "RecordRef");

        let (kind, name) = parse_type_specification("Integer");
        assert!(kind.is_none());
        assert_eq!(name, "Integer");
    }

    #[test]
    fn test_variable_record_detection() {
        assert!(AlVariable::new("Cust", "Record Customer").is_record());
        assert!(!AlVariable::new("Ref", "RecordRef").is_record());
        assert_eq!(AlVariable::new("Post", "Codeunit \"Sales-Post\"").type_name(), "Sales-Post");
    }
}
