//! Resolution of the object a missing procedure belongs to

use log::debug;

use crate::indexer::Indexer;
use crate::object::{AlObject, ObjectType};
use crate::procedure::AlVariable;

/// Normalize object names for matching
pub fn normalize_object_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .replace(' ', "")
        .replace('-', "")
        .to_lowercase()
}

/// Check if two object names might refer to the same object
pub fn names_match(name1: &str, name2: &str) -> bool {
    normalize_object_name(name1) == normalize_object_name(name2)
}

/// Find a variable by name, case-insensitively; earlier entries shadow later ones
pub fn find_variable<'v>(variables: &'v [AlVariable], name: &str) -> Option<&'v AlVariable> {
    variables
        .iter()
        .find(|v| v.name.eq_ignore_ascii_case(name.trim().trim_matches('"')))
}

/// Object referenced by a `<Type> <Name>` pair, e.g. from a type specification
/// or a compiler message. An unknown type keyword matches by name alone.
pub fn resolve_object(indexer: &Indexer, type_keyword: &str, name: &str) -> Option<AlObject> {
    let Some(object_type) = ObjectType::from_type_keyword(type_keyword) else {
        debug!("Unknown object type {}, matching {} by name", type_keyword, name);
        return indexer.find_object_by_name(name);
    };
    let object = indexer.find_object(object_type, name);
    if object.is_none() {
        debug!("{} {} is not part of the workspace", object_type, name);
    }
    object
}

/// Object a receiver variable refers to through its declared type
pub fn resolve_variable_object(indexer: &Indexer, variable: &AlVariable) -> Option<AlObject> {
    let kind = variable.type_kind()?;
    resolve_object(indexer, &kind, &variable.type_name())
}
