//! LSP request and notification handlers

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use lsp_server::{Message, Notification, Request, RequestId};
use lsp_types::{
    ApplyWorkspaceEditParams, CodeActionOrCommand, CodeActionParams, DidChangeTextDocumentParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
    ExecuteCommandParams, Location, ReferenceParams,
};
use serde_json::Value;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::code_actions::{code_actions_for, CodeActionContext};
use crate::commands::{create_procedure_edit, CreateProcedureArgs, CREATE_PROCEDURE_COMMAND};
use crate::config::ServerConfig;
use crate::documents::DocumentStore;
use crate::indexer::Indexer;
use crate::object::AlObject;
use crate::parser::parse_document;
use crate::protocol::uri_to_path;
use crate::references::find_handler_references;
use crate::workspace::{event_name_pattern, find_app_source_prefixes, find_project_root};

/// State shared by the message loop and the file watcher
pub struct ServerState {
    pub indexer: Arc<RwLock<Indexer>>,
    documents: RwLock<DocumentStore>,
    pub config: ServerConfig,
    next_request_id: AtomicI32,
}

impl ServerState {
    pub fn new(indexer: Arc<RwLock<Indexer>>, config: ServerConfig) -> Self {
        Self {
            indexer,
            documents: RwLock::new(DocumentStore::new()),
            config,
            next_request_id: AtomicI32::new(1),
        }
    }

    fn indexer(&self) -> Result<RwLockReadGuard<'_, Indexer>> {
        self.indexer.read().map_err(|_| anyhow!("Indexer lock poisoned"))
    }

    fn documents(&self) -> Result<RwLockReadGuard<'_, DocumentStore>> {
        self.documents.read().map_err(|_| anyhow!("Document store lock poisoned"))
    }

    fn documents_mut(&self) -> Result<RwLockWriteGuard<'_, DocumentStore>> {
        self.documents.write().map_err(|_| anyhow!("Document store lock poisoned"))
    }

    /// Id for a request sent to the client
    fn next_request_id(&self) -> RequestId {
        RequestId::from(self.next_request_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle an LSP request. Requests the server sends to the client in
/// response are pushed to `outbox`.
pub fn handle_request(state: &ServerState, req: &Request, outbox: &mut Vec<Message>) -> Result<Value> {
    debug!("Request: {} - {:?}", req.method, req.params);

    match req.method.as_str() {
        "textDocument/references" => {
            let params: ReferenceParams = serde_json::from_value(req.params.clone())?;
            let result = references(state, params)?;
            Ok(serde_json::to_value(result)?)
        }
        "textDocument/codeAction" => {
            let params: CodeActionParams = serde_json::from_value(req.params.clone())?;
            let result = code_actions(state, params)?;
            Ok(serde_json::to_value(result)?)
        }
        "workspace/executeCommand" => {
            let params: ExecuteCommandParams = serde_json::from_value(req.params.clone())?;
            execute_command(state, params, outbox)?;
            Ok(Value::Null)
        }
        _ => {
            debug!("Unhandled method: {}", req.method);
            Ok(Value::Null)
        }
    }
}

/// Handle an LSP notification
pub fn handle_notification(state: &ServerState, notif: &Notification) -> Result<()> {
    debug!("Notification: {}", notif.method);

    match notif.method.as_str() {
        "textDocument/didOpen" => {
            let params: DidOpenTextDocumentParams = serde_json::from_value(notif.params.clone())?;
            state.documents_mut()?.did_open(params);
        }
        "textDocument/didChange" => {
            let params: DidChangeTextDocumentParams =
                serde_json::from_value(notif.params.clone())?;
            state.documents_mut()?.did_change(params);
        }
        "textDocument/didClose" => {
            let params: DidCloseTextDocumentParams = serde_json::from_value(notif.params.clone())?;
            state.documents_mut()?.did_close(params);
        }
        "textDocument/didSave" => {
            let params: DidSaveTextDocumentParams = serde_json::from_value(notif.params.clone())?;
            if let Some(path) = uri_to_path(&params.text_document.uri) {
                state
                    .indexer
                    .write()
                    .map_err(|_| anyhow!("Indexer lock poisoned"))?
                    .reindex_file(&path)?;
            }
        }
        _ => {}
    }

    Ok(())
}

/// References of the handler function at the cursor
fn references(state: &ServerState, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
    if !state.config.handler_references {
        return Ok(None);
    }

    let uri = &params.text_document_position.text_document.uri;
    let text = state.documents()?.text(uri)?;
    let document = parse_document(&text)?;

    Ok(find_handler_references(
        &document.tree,
        uri,
        params.text_document_position.position,
        params.context.include_declaration,
    ))
}

fn code_actions(state: &ServerState, params: CodeActionParams) -> Result<Option<Vec<CodeActionOrCommand>>> {
    let uri = &params.text_document.uri;
    let Some(path) = uri_to_path(uri) else {
        debug!("No code actions for non-file document {}", uri.as_str());
        return Ok(None);
    };

    let text = state.documents()?.text(uri)?;
    let document = parse_document(&text)?;
    let Some(document_object) = AlObject::from_parsed(&path, &document.info) else {
        debug!("{} declares no object", path.display());
        return Ok(None);
    };

    let prefixes = find_project_root(&path).and_then(|root| find_app_source_prefixes(&root));
    let event_pattern = event_name_pattern(prefixes.as_deref())?;

    let indexer = state.indexer()?;
    let context = CodeActionContext {
        document_uri: uri,
        tree: &document.tree,
        document_object: &document_object,
        indexer: &indexer,
        event_pattern: &event_pattern,
        config: &state.config,
    };

    let actions = code_actions_for(&context, &params.context.diagnostics);
    Ok((!actions.is_empty()).then_some(actions))
}

/// Compute the edit of a chosen code action and ask the client to apply it
fn execute_command(state: &ServerState, params: ExecuteCommandParams, outbox: &mut Vec<Message>) -> Result<()> {
    if params.command != CREATE_PROCEDURE_COMMAND {
        warn!("Unknown command: {}", params.command);
        return Ok(());
    }

    let args = CreateProcedureArgs::from_arguments(params.arguments)?;
    let text = state
        .documents()?
        .text(&args.uri)
        .with_context(|| format!("Cannot read target document {}", args.uri.as_str()))?;

    let Some(edit) = create_procedure_edit(&args, &text, &state.config)? else {
        return Ok(());
    };

    info!("Creating {} in {}", args.procedure.name, args.procedure.object);
    let params = ApplyWorkspaceEditParams {
        label: Some(format!("Create {}", args.procedure.name)),
        edit,
    };
    outbox.push(Message::Request(Request::new(
        state.next_request_id(),
        "workspace/applyEdit".to_string(),
        params,
    )));

    Ok(())
}
