//! Quick fixes for calls to procedures that do not exist
//!
//! `AL0118` reports an unknown name in the current object, `AL0132` a
//! member missing from another object. Both get a "Create procedure"
//! action, plus event publisher actions when the name looks like an event.

use anyhow::{Context, Result};
use log::{debug, warn};
use lsp_types::{CodeAction, CodeActionKind, CodeActionOrCommand, Diagnostic, NumberOrString, Uri};
use regex::Regex;

use crate::commands::CreateProcedureArgs;
use crate::config::ServerConfig;
use crate::create_procedure::{
    create_procedure, CreateBusinessEvent, CreateIntegrationEvent, CreateMethod, MissingProcedure,
    ProcedureCreator,
};
use crate::indexer::Indexer;
use crate::object::AlObject;
use crate::procedure::AlVariable;
use crate::protocol::{path_to_uri, uri_to_path};
use crate::resolver::{find_variable, resolve_object, resolve_variable_object};
use crate::source_handler::{AlSourceCodeHandler, ProcedureCallSite};
use crate::syntax::SyntaxTree;

/// Compiler message of `AL0132`, e.g.
/// `'Codeunit "Sales-Post"' does not contain a definition for 'PostLines'`
const MISSING_DEFINITION_MESSAGE: &str = r"'(\w+) (.+)' does not contain a definition for '(.+)'";

/// What a provider needs to know about the document the diagnostics belong to
pub struct CodeActionContext<'a> {
    /// URI as the client sent it
    pub document_uri: &'a Uri,
    pub tree: &'a SyntaxTree,
    /// Object declared by the document
    pub document_object: &'a AlObject,
    pub indexer: &'a Indexer,
    /// Names that get event publisher actions
    pub event_pattern: &'a Regex,
    pub config: &'a ServerConfig,
}

/// A provider first looks at the diagnostic's line, then builds its actions
pub trait CodeActionProvider {
    /// Analyze the diagnostic; `true` when the provider has actions to offer
    fn consider_line(&mut self) -> Result<bool>;

    fn create_code_actions(&self) -> Result<Vec<CodeAction>>;
}

/// `AL0118`: the name does not exist in the current context
pub struct Al0118Provider<'a> {
    context: &'a CodeActionContext<'a>,
    diagnostic: Diagnostic,
    missing: Option<MissingProcedure>,
}

impl<'a> Al0118Provider<'a> {
    pub fn new(context: &'a CodeActionContext<'a>, diagnostic: Diagnostic) -> Self {
        Self {
            context,
            diagnostic,
            missing: None,
        }
    }
}

impl CodeActionProvider for Al0118Provider<'_> {
    fn consider_line(&mut self) -> Result<bool> {
        let target = self.context.document_object.clone();
        self.missing = analyze_call(self.context, &self.diagnostic, |_, _| Some(target));
        Ok(self.missing.is_some())
    }

    fn create_code_actions(&self) -> Result<Vec<CodeAction>> {
        let missing = self
            .missing
            .as_ref()
            .context("consider_line must accept the diagnostic first")?;
        build_actions(self.context, &self.diagnostic, missing)
    }
}

/// `AL0132`: the called object has no such member
pub struct Al0132Provider<'a> {
    context: &'a CodeActionContext<'a>,
    diagnostic: Diagnostic,
    message_pattern: Regex,
    missing: Option<MissingProcedure>,
}

impl<'a> Al0132Provider<'a> {
    pub fn new(context: &'a CodeActionContext<'a>, diagnostic: Diagnostic) -> Result<Self> {
        Ok(Self {
            context,
            diagnostic,
            message_pattern: Regex::new(MISSING_DEFINITION_MESSAGE)
                .context("Invalid AL0132 message pattern")?,
            missing: None,
        })
    }

    /// Object named by the message, else the declared type of the receiver
    fn target_object(&self, call: &ProcedureCallSite, variables: &[AlVariable]) -> Option<AlObject> {
        let indexer = self.context.indexer;

        if let Some(captures) = self.message_pattern.captures(&self.diagnostic.message) {
            if let Some(object) = resolve_object(indexer, &captures[1], &captures[2]) {
                return Some(object);
            }
        }

        let receiver = call.receiver.as_deref()?;
        let variable = find_variable(variables, receiver)?;
        resolve_variable_object(indexer, variable)
    }
}

impl CodeActionProvider for Al0132Provider<'_> {
    fn consider_line(&mut self) -> Result<bool> {
        self.missing = analyze_call(self.context, &self.diagnostic, |call, variables| {
            self.target_object(call, variables)
        });
        Ok(self.missing.is_some())
    }

    fn create_code_actions(&self) -> Result<Vec<CodeAction>> {
        let missing = self
            .missing
            .as_ref()
            .context("consider_line must accept the diagnostic first")?;
        build_actions(self.context, &self.diagnostic, missing)
    }
}

/// Shared analysis: the diagnostic must sit on an invocation whose target
/// object is writable and can declare procedures
fn analyze_call(
    context: &CodeActionContext,
    diagnostic: &Diagnostic,
    target_object: impl FnOnce(&ProcedureCallSite, &[AlVariable]) -> Option<AlObject>,
) -> Option<MissingProcedure> {
    let handler = AlSourceCodeHandler::new(context.tree);
    if !handler.is_invocation_expression(diagnostic.range) {
        debug!("Diagnostic at {:?} is not on an invocation", diagnostic.range.start);
        return None;
    }

    let call = handler.procedure_call_at(diagnostic.range)?;
    match call.statement_range {
        Some(statement) => debug!(
            "Call to {} is a statement at {:?}..{:?}",
            call.name, statement.start, statement.end
        ),
        None => debug!("Call to {} is used as a value", call.name),
    }
    let offset = context.tree.position_to_offset(diagnostic.range.start);
    let variables = context.tree.variables_in_scope(offset);

    let Some(target) = target_object(&call, &variables) else {
        debug!("No workspace object found for call to {}", call.name);
        return None;
    };
    if !target.object_type.can_contain_procedures() {
        debug!("{} cannot contain procedures", target);
        return None;
    }
    if target.is_read_only() {
        debug!("{} is declared in {}, which is read-only", target, target.file.display());
        return None;
    }

    Some(MissingProcedure::analyze(
        call,
        &variables,
        target,
        context.document_object,
    ))
}

fn build_actions(
    context: &CodeActionContext,
    diagnostic: &Diagnostic,
    missing: &MissingProcedure,
) -> Result<Vec<CodeAction>> {
    // Edits to the requesting document go to the URI the client knows it by
    let in_document = missing.same_object
        || uri_to_path(context.document_uri).as_deref() == Some(missing.target.file.as_path());
    let uri = if in_document {
        context.document_uri.clone()
    } else {
        path_to_uri(&missing.target.file)?
    };
    let calling_line = missing.same_object.then(|| missing.calling_line());
    let name = &missing.call.name;

    let action = |title: String, creator: &dyn ProcedureCreator, preferred: bool| -> Result<CodeAction> {
        let args = CreateProcedureArgs {
            uri: uri.clone(),
            procedure: create_procedure(creator),
            calling_line,
        };
        Ok(CodeAction {
            command: Some(args.to_command(&title)?),
            title,
            kind: Some(CodeActionKind::QUICKFIX),
            diagnostics: Some(vec![diagnostic.clone()]),
            is_preferred: Some(preferred),
            ..Default::default()
        })
    };

    let mut actions = Vec::with_capacity(3);
    if context.config.event_publishers && context.event_pattern.is_match(name) {
        actions.push(action(
            format!("Create IntegrationEvent Publisher {}", name),
            &CreateIntegrationEvent(missing),
            true,
        )?);
        actions.push(action(
            format!("Create BusinessEvent Publisher {}", name),
            &CreateBusinessEvent(missing),
            false,
        )?);
    }
    actions.push(action(
        format!("Create procedure {}", name),
        &CreateMethod(missing),
        true,
    )?);

    Ok(actions)
}

/// Code actions for all diagnostics a provider exists for
pub fn code_actions_for(context: &CodeActionContext, diagnostics: &[Diagnostic]) -> Vec<CodeActionOrCommand> {
    let mut actions = Vec::new();

    for diagnostic in diagnostics {
        match provide(context, diagnostic) {
            Ok(found) => actions.extend(found.into_iter().map(CodeActionOrCommand::CodeAction)),
            Err(e) => warn!("Code actions for {:?} failed: {:#}", diagnostic.code, e),
        }
    }

    actions
}

fn provide(context: &CodeActionContext, diagnostic: &Diagnostic) -> Result<Vec<CodeAction>> {
    let code = match &diagnostic.code {
        Some(NumberOrString::String(code)) => code.as_str(),
        _ => return Ok(Vec::new()),
    };

    let mut provider: Box<dyn CodeActionProvider + '_> = match code {
        "AL0118" => Box::new(Al0118Provider::new(context, diagnostic.clone())),
        "AL0132" => Box::new(Al0132Provider::new(context, diagnostic.clone())?),
        _ => return Ok(Vec::new()),
    };

    if !provider.consider_line()? {
        return Ok(Vec::new());
    }
    provider.create_code_actions()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectType;
    use crate::parser::parse_document;
    use crate::procedure::{AccessModifier, ProcedureKind};
    use crate::workspace::event_name_pattern;
    use lsp_types::{Position, Range};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const CALLER: &str = r#"codeunit 50100 Caller
{
    procedure Run()
    var
        Customer: Record Customer;
        SecondCu: Codeunit "Second Codeunit";
        myInt: Integer;
    begin
        DoWork(Customer, 5);
        SecondCu.OnBeforeThing(myInt);
    end;
}
"#;

    const SECOND: &str = "codeunit 50101 \"Second Codeunit\"\n{\n}\n";

    struct Fixture {
        _dir: TempDir,
        caller: PathBuf,
        second: PathBuf,
        indexer: Indexer,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let caller = dir.path().join("Caller.Codeunit.al");
        let second = dir.path().join("Second.Codeunit.al");
        fs::write(&caller, CALLER).unwrap();
        fs::write(&second, SECOND).unwrap();
        fs::write(dir.path().join("Base.Codeunit.dal"), "codeunit 50 \"Base Codeunit\"\n{\n}\n").unwrap();
        fs::write(dir.path().join("Status.Enum.al"), "enum 50100 Status\n{\n}\n").unwrap();

        let mut indexer = Indexer::new();
        indexer.index_directory(dir.path()).unwrap();
        Fixture {
            _dir: dir,
            caller,
            second,
            indexer,
        }
    }

    fn diagnostic(code: &str, line: u32, start: u32, end: u32, message: &str) -> Diagnostic {
        Diagnostic {
            range: Range::new(Position::new(line, start), Position::new(line, end)),
            code: Some(NumberOrString::String(code.to_string())),
            message: message.to_string(),
            ..Default::default()
        }
    }

    fn actions(fixture: &Fixture, config: &ServerConfig, diagnostics: &[Diagnostic]) -> Vec<CodeAction> {
        let document_uri = path_to_uri(&fixture.caller).unwrap();
        actions_for_uri(fixture, &document_uri, config, diagnostics)
    }

    fn actions_for_uri(
        fixture: &Fixture,
        document_uri: &Uri,
        config: &ServerConfig,
        diagnostics: &[Diagnostic],
    ) -> Vec<CodeAction> {
        let document = parse_document(CALLER).unwrap();
        let document_object = AlObject::from_parsed(&fixture.caller, &document.info).unwrap();
        let event_pattern = event_name_pattern(None).unwrap();
        let context = CodeActionContext {
            document_uri,
            tree: &document.tree,
            document_object: &document_object,
            indexer: &fixture.indexer,
            event_pattern: &event_pattern,
            config,
        };
        code_actions_for(&context, diagnostics)
            .into_iter()
            .map(|a| match a {
                CodeActionOrCommand::CodeAction(action) => action,
                CodeActionOrCommand::Command(_) => panic!("expected a code action"),
            })
            .collect()
    }

    fn args_of(action: &CodeAction) -> CreateProcedureArgs {
        let command = action.command.clone().unwrap();
        CreateProcedureArgs::from_arguments(command.arguments.unwrap()).unwrap()
    }

    fn uri_path(args: &CreateProcedureArgs) -> PathBuf {
        crate::protocol::uri_to_path(&args.uri).unwrap()
    }

    #[test]
    fn test_al0118_creates_local_procedure() {
        let fixture = fixture();
        let diagnostic = diagnostic(
            "AL0118",
            8,
            8,
            14,
            "The name 'DoWork' does not exist in the current context.",
        );
        let actions = actions(&fixture, &ServerConfig::default(), &[diagnostic.clone()]);

        assert_eq!(actions.len(), 1);
        let action = &actions[0];
        assert_eq!(action.title, "Create procedure DoWork");
        assert_eq!(action.kind, Some(CodeActionKind::QUICKFIX));
        assert_eq!(action.is_preferred, Some(true));
        assert_eq!(action.diagnostics, Some(vec![diagnostic]));

        let args = args_of(action);
        assert_eq!(uri_path(&args), fixture.caller);
        assert_eq!(args.calling_line, Some(8));
        assert_eq!(args.procedure.access, AccessModifier::Local);
        assert_eq!(args.procedure.kind, ProcedureKind::Method);
        let parameters: Vec<_> = args
            .procedure
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.type_text.as_str(), p.by_ref))
            .collect();
        assert_eq!(
            parameters,
            vec![("Customer", "Record Customer", true), ("arg2", "Integer", false)]
        );
    }

    #[test]
    fn test_al0118_keeps_the_client_uri() {
        let fixture = fixture();
        // Same file, spelled with escapes we would not produce ourselves
        let ours = path_to_uri(&fixture.caller).unwrap();
        let client: Uri = ours
            .as_str()
            .replace("Caller.Codeunit", "Caller%2ECodeunit")
            .parse()
            .unwrap();
        assert_ne!(client, ours);

        let diagnostic = diagnostic("AL0118", 8, 8, 14, "The name 'DoWork' does not exist in the current context.");
        let actions = actions_for_uri(&fixture, &client, &ServerConfig::default(), &[diagnostic]);

        assert_eq!(actions.len(), 1);
        assert_eq!(args_of(&actions[0]).uri, client);
    }

    #[test]
    fn test_al0132_offers_event_publishers_first() {
        let fixture = fixture();
        let diagnostic = diagnostic(
            "AL0132",
            9,
            17,
            30,
            "'Codeunit \"Second Codeunit\"' does not contain a definition for 'OnBeforeThing'",
        );
        let actions = actions(&fixture, &ServerConfig::default(), &[diagnostic]);

        let titles: Vec<_> = actions.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Create IntegrationEvent Publisher OnBeforeThing",
                "Create BusinessEvent Publisher OnBeforeThing",
                "Create procedure OnBeforeThing",
            ]
        );
        let preferred: Vec<_> = actions.iter().map(|a| a.is_preferred).collect();
        assert_eq!(preferred, vec![Some(true), Some(false), Some(true)]);

        let args = args_of(&actions[0]);
        assert_eq!(uri_path(&args), fixture.second);
        assert_eq!(args.calling_line, None);
        assert_eq!(args.procedure.kind, ProcedureKind::IntegrationEvent);
        assert_eq!(args.procedure.access, AccessModifier::Public);
        assert_eq!(args.procedure.object.object_type, ObjectType::Codeunit);
        assert_eq!(args.procedure.object.name, "Second Codeunit");
    }

    #[test]
    fn test_al0132_falls_back_to_receiver_type() {
        let fixture = fixture();
        let diagnostic = diagnostic("AL0132", 9, 17, 30, "unexpected message format");
        let config = ServerConfig {
            event_publishers: false,
            ..ServerConfig::default()
        };
        let actions = actions(&fixture, &config, &[diagnostic]);

        assert_eq!(actions.len(), 1);
        assert_eq!(uri_path(&args_of(&actions[0])), fixture.second);
    }

    #[test]
    fn test_read_only_and_enum_targets_are_skipped() {
        let fixture = fixture();
        let dal = diagnostic(
            "AL0132",
            9,
            17,
            30,
            "'Codeunit \"Base Codeunit\"' does not contain a definition for 'OnBeforeThing'",
        );
        let enumeration = diagnostic(
            "AL0132",
            9,
            17,
            30,
            "'Enum Status' does not contain a definition for 'OnBeforeThing'",
        );

        // Named targets win over the receiver, which would resolve to "Second Codeunit"
        assert!(actions(&fixture, &ServerConfig::default(), &[dal, enumeration]).is_empty());
    }

    #[test]
    fn test_non_invocation_and_unknown_codes() {
        let fixture = fixture();
        let not_a_call = diagnostic("AL0118", 8, 15, 23, "The name 'Customer' does not exist");
        let other_code = diagnostic("AL0001", 8, 8, 14, "Something else");
        assert!(actions(&fixture, &ServerConfig::default(), &[not_a_call, other_code]).is_empty());
    }

    #[test]
    fn test_create_before_consider_is_an_error() {
        let fixture = fixture();
        let document = parse_document(CALLER).unwrap();
        let document_object = AlObject::from_parsed(Path::new("/ws/Caller.al"), &document.info).unwrap();
        let event_pattern = event_name_pattern(None).unwrap();
        let config = ServerConfig::default();
        let document_uri: Uri = "file:///ws/Caller.al".parse().unwrap();
        let context = CodeActionContext {
            document_uri: &document_uri,
            tree: &document.tree,
            document_object: &document_object,
            indexer: &fixture.indexer,
            event_pattern: &event_pattern,
            config: &config,
        };
        let provider = Al0118Provider::new(&context, diagnostic("AL0118", 8, 8, 14, ""));
        assert!(provider.create_code_actions().is_err());
    }
}
