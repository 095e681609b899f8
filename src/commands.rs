//! The `alCodeActions.createProcedure` command: turns a chosen code action
//! into a workspace edit inserting the procedure

use anyhow::{Context, Result};
use log::{debug, info, warn};
use lsp_types::{Command, Range, TextEdit, Uri, WorkspaceEdit};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::config::ServerConfig;
use crate::parser::parse_document;
use crate::procedure::AlProcedure;
use crate::source_handler::AlSourceCodeHandler;

pub const CREATE_PROCEDURE_COMMAND: &str = "alCodeActions.createProcedure";

/// Indentation of generated members
const INDENT: &str = "    ";

/// Argument of [`CREATE_PROCEDURE_COMMAND`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProcedureArgs {
    /// Document declaring the target object
    pub uri: Uri,
    pub procedure: AlProcedure,
    /// Line of the call when it is made from the target object itself
    pub calling_line: Option<u32>,
}

impl CreateProcedureArgs {
    pub fn to_command(&self, title: &str) -> Result<Command> {
        let argument = serde_json::to_value(self).context("Failed to serialize command argument")?;
        Ok(Command::new(
            title.to_string(),
            CREATE_PROCEDURE_COMMAND.to_string(),
            Some(vec![argument]),
        ))
    }

    pub fn from_arguments(arguments: Vec<Value>) -> Result<Self> {
        let argument = arguments
            .into_iter()
            .next()
            .context("createProcedure needs an argument")?;
        serde_json::from_value(argument).context("Invalid createProcedure argument")
    }
}

/// Edit inserting the procedure into `text`, the current content of `args.uri`.
/// `None` when the procedure already exists or there is nowhere to put it.
pub fn create_procedure_edit(
    args: &CreateProcedureArgs,
    text: &str,
    config: &ServerConfig,
) -> Result<Option<WorkspaceEdit>> {
    let document = parse_document(text)?;
    let tree = &document.tree;
    let name = &args.procedure.name;

    let exists = tree
        .methods()
        .iter()
        .filter(|m| m.kind() == "procedure")
        .filter_map(|m| tree.method_name(m))
        .any(|existing| existing.eq_ignore_ascii_case(name));
    if exists {
        info!("{} already declares {}", args.procedure.object, name);
        return Ok(None);
    }

    let handler = AlSourceCodeHandler::new(tree);
    let Some(point) = handler.position_to_insert_procedure(args.calling_line) else {
        warn!("No object declaration in {}", args.uri.as_str());
        return Ok(None);
    };
    match args.calling_line.and_then(|line| handler.procedure_or_trigger_name_at(line)) {
        Some(caller) => debug!("Inserting {} after {} at {:?}", name, caller, point),
        None => debug!("Inserting {} at {:?}", name, point),
    }

    let eol = tree.line_ending();
    let procedure = args.procedure.render(INDENT, eol, config.not_implemented_body);
    let position = point.position();
    let edit = TextEdit::new(Range::new(position, position), point.wrap(&procedure, eol));

    Ok(Some(WorkspaceEdit {
        changes: Some(HashMap::from([(args.uri.clone(), vec![edit])])),
        ..Default::default()
    }))
}
