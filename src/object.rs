//! AL object identity (type, id, name and the file declaring it)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::parser::ParsedFile;

/// Type of AL object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Codeunit,
    Table,
    Page,
    Report,
    Query,
    XmlPort,
    Enum,
    Interface,
    ControlAddIn,
    PageExtension,
    TableExtension,
    EnumExtension,
    PermissionSet,
    PermissionSetExtension,
}

impl ObjectType {
    /// Map the keyword of a type specification (`Record "Customer"`,
    /// `Codeunit "Sales-Post"`) to the object it refers to
    pub fn from_type_keyword(keyword: &str) -> Option<Self> {
        if keyword.eq_ignore_ascii_case("record") {
            return Some(Self::Table);
        }
        Self::try_from(keyword).ok()
    }

    /// Whether new procedures may be declared in objects of this type
    pub fn can_contain_procedures(self) -> bool {
        !matches!(self, Self::Enum)
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = ();

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "codeunit" => Ok(Self::Codeunit),
            "table" => Ok(Self::Table),
            "page" => Ok(Self::Page),
            "report" => Ok(Self::Report),
            "query" => Ok(Self::Query),
            "xmlport" => Ok(Self::XmlPort),
            "enum" => Ok(Self::Enum),
            "interface" => Ok(Self::Interface),
            "controladdin" => Ok(Self::ControlAddIn),
            "pageextension" => Ok(Self::PageExtension),
            "tableextension" => Ok(Self::TableExtension),
            "enumextension" => Ok(Self::EnumExtension),
            "permissionset" => Ok(Self::PermissionSet),
            "permissionsetextension" => Ok(Self::PermissionSetExtension),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Codeunit => write!(f, "Codeunit"),
            Self::Table => write!(f, "Table"),
            Self::Page => write!(f, "Page"),
            Self::Report => write!(f, "Report"),
            Self::Query => write!(f, "Query"),
            Self::XmlPort => write!(f, "XmlPort"),
            Self::Enum => write!(f, "Enum"),
            Self::Interface => write!(f, "Interface"),
            Self::ControlAddIn => write!(f, "ControlAddIn"),
            Self::PageExtension => write!(f, "PageExtension"),
            Self::TableExtension => write!(f, "TableExtension"),
            Self::EnumExtension => write!(f, "EnumExtension"),
            Self::PermissionSet => write!(f, "PermissionSet"),
            Self::PermissionSetExtension => write!(f, "PermissionSetExtension"),
        }
    }
}

/// An AL object declared in a workspace file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlObject {
    pub object_type: ObjectType,
    /// Object id; `None` for objects without one (interfaces, controladdins)
    pub id: Option<u32>,
    /// Object name without surrounding quotes
    pub name: String,
    /// File declaring the object
    pub file: PathBuf,
}

impl AlObject {
    /// Build the object declared by a parsed file, if the file declares one
    pub fn from_parsed(path: &Path, parsed: &ParsedFile) -> Option<Self> {
        Some(Self {
            object_type: parsed.object_type?,
            id: parsed.object_id,
            name: parsed.object_name.clone()?,
            file: path.to_path_buf(),
        })
    }

    /// Whether the object lives in a symbol-only `.dal` file that must not be edited
    pub fn is_read_only(&self) -> bool {
        self.file
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("dal"))
            .unwrap_or(false)
    }

    pub fn is_same_object(&self, other: &AlObject) -> bool {
        self.object_type == other.object_type && crate::resolver::names_match(&self.name, &other.name)
    }
}

impl fmt::Display for AlObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.object_type, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str, file: &str) -> AlObject {
        AlObject {
            object_type: ObjectType::Codeunit,
            id: Some(50100),
            name: name.to_string(),
            file: PathBuf::from(file),
        }
    }

    #[test]
    fn test_type_keyword_record_is_table() {
        assert_eq!(ObjectType::from_type_keyword("Record"), Some(ObjectType::Table));
        assert_eq!(ObjectType::from_type_keyword("codeunit"), Some(ObjectType::Codeunit));
        assert_eq!(ObjectType::from_type_keyword("Integer"), None);
    }

    #[test]
    fn test_enums_cannot_contain_procedures() {
        assert!(!ObjectType::Enum.can_contain_procedures());
        assert!(ObjectType::Codeunit.can_contain_procedures());
        assert!(ObjectType::PageExtension.can_contain_procedures());
    }

    #[test]
    fn test_dal_files_are_read_only() {
        assert!(object("Base", "/symbols/Base.dal").is_read_only());
        assert!(!object("Mine", "/src/Mine.Codeunit.al").is_read_only());
    }

    #[test]
    fn test_same_object_ignores_quotes_and_case() {
        let a = object("My Codeunit", "/a.al");
        let b = object("\"my codeunit\"", "/b.al");
        assert!(a.is_same_object(&b));
        assert_eq!(a.to_string(), "Codeunit \"My Codeunit\"");
    }
}
