//! LSP server: initialization, main loop and the file watcher thread

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use lsp_server::{Connection, Message, Response};
use lsp_types::{
    ApplyWorkspaceEditResponse, CodeActionKind, CodeActionOptions, CodeActionProviderCapability,
    ExecuteCommandOptions, InitializeParams, InitializeResult, OneOf, SaveOptions,
    ServerCapabilities, TextDocumentSyncCapability, TextDocumentSyncKind, TextDocumentSyncOptions,
    TextDocumentSyncSaveOptions,
};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use crate::commands::CREATE_PROCEDURE_COMMAND;
use crate::config::ServerConfig;
use crate::handlers::{handle_notification, handle_request, ServerState};
use crate::indexer::Indexer;
use crate::protocol::uri_to_path;
use crate::watcher::AlFileWatcher;

fn capabilities() -> ServerCapabilities {
    ServerCapabilities {
        references_provider: Some(OneOf::Left(true)),
        code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
            code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
            ..Default::default()
        })),
        execute_command_provider: Some(ExecuteCommandOptions {
            commands: vec![CREATE_PROCEDURE_COMMAND.to_string()],
            ..Default::default()
        }),
        text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            open_close: Some(true),
            change: Some(TextDocumentSyncKind::FULL),
            will_save: None,
            will_save_wait_until: None,
            save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                include_text: Some(false),
            })),
        })),
        ..Default::default()
    }
}

/// Run the LSP server
pub fn run_server() -> Result<()> {
    info!("Starting AL code actions LSP server");

    let (connection, io_threads) = Connection::stdio();

    let (id, params) = connection.initialize_start()?;
    let init_params: InitializeParams = serde_json::from_value(params)?;

    let result = InitializeResult {
        capabilities: capabilities(),
        server_info: Some(lsp_types::ServerInfo {
            name: "al-code-actions".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
    };

    connection.initialize_finish(id, serde_json::to_value(result)?)?;
    info!("Server initialized");

    let config = ServerConfig::from_initialization_options(init_params.initialization_options.as_ref());
    debug!("Configuration: {:?}", config);

    let indexer = Arc::new(RwLock::new(Indexer::new()));
    let workspace_roots = index_workspaces(&indexer, &init_params)?;

    start_file_watcher(Arc::clone(&indexer), workspace_roots);

    let state = ServerState::new(indexer, config);
    main_loop(&connection, &state)?;

    io_threads.join()?;
    info!("Server shut down");
    Ok(())
}

/// Index all workspace folders
#[allow(deprecated)] // root_uri is deprecated but kept for older LSP clients
fn index_workspaces(indexer: &Arc<RwLock<Indexer>>, params: &InitializeParams) -> Result<Vec<PathBuf>> {
    let roots: Vec<PathBuf> = match (&params.workspace_folders, &params.root_uri) {
        (Some(folders), _) => folders.iter().filter_map(|f| uri_to_path(&f.uri)).collect(),
        (None, Some(uri)) => uri_to_path(uri).into_iter().collect(),
        (None, None) => Vec::new(),
    };

    let mut idx = indexer
        .write()
        .map_err(|_| anyhow::anyhow!("Indexer lock poisoned"))?;
    let mut indexed = Vec::with_capacity(roots.len());
    for root in roots {
        if let Err(e) = idx.index_directory(&root) {
            error!("Failed to index {}: {}", root.display(), e);
            continue;
        }
        indexed.push(root);
    }

    Ok(indexed)
}

/// Start the file watcher thread for incremental updates
fn start_file_watcher(indexer: Arc<RwLock<Indexer>>, workspace_roots: Vec<PathBuf>) {
    thread::spawn(move || {
        let watchers: Vec<_> = workspace_roots
            .iter()
            .filter_map(|root| match AlFileWatcher::new(root) {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!("Failed to create watcher for {}: {}", root.display(), e);
                    None
                }
            })
            .collect();

        if watchers.is_empty() {
            warn!("No file watchers active");
            return;
        }

        info!("File watcher thread started with {} watchers", watchers.len());

        loop {
            for watcher in &watchers {
                let Some(change) = watcher.recv_timeout(Duration::from_millis(100)) else {
                    continue;
                };
                let Ok(mut idx) = indexer.write() else {
                    error!("Indexer lock poisoned, stopping file watcher");
                    return;
                };
                debug!("Re-indexing after {:?}", change);
                if let Err(e) = idx.reindex_file(change.path()) {
                    error!("Failed to re-index {}: {}", change.path().display(), e);
                }
            }
        }
    });
}

/// Main message processing loop
fn main_loop(connection: &Connection, state: &ServerState) -> Result<()> {
    for msg in &connection.receiver {
        match msg {
            Message::Request(req) => {
                if connection.handle_shutdown(&req)? {
                    break;
                }

                let mut outbox = Vec::new();
                let response = match handle_request(state, &req, &mut outbox) {
                    Ok(value) => Response::new_ok(req.id, value),
                    Err(e) => {
                        warn!("{} failed: {:#}", req.method, e);
                        Response::new_err(
                            req.id,
                            lsp_server::ErrorCode::InternalError as i32,
                            e.to_string(),
                        )
                    }
                };

                connection
                    .sender
                    .send(Message::Response(response))
                    .context("Failed to send response")?;
                for message in outbox {
                    connection
                        .sender
                        .send(message)
                        .context("Failed to send request to client")?;
                }
            }
            Message::Response(response) => log_client_response(response),
            Message::Notification(notif) => {
                if let Err(e) = handle_notification(state, &notif) {
                    warn!("{} failed: {:#}", notif.method, e);
                }
            }
        }
    }

    Ok(())
}

/// The only requests sent to the client are `workspace/applyEdit`
fn log_client_response(response: Response) {
    if let Some(error) = response.error {
        warn!("Client rejected request {}: {}", response.id, error.message);
        return;
    }
    let applied = response
        .result
        .and_then(|result| serde_json::from_value::<ApplyWorkspaceEditResponse>(result).ok());
    match applied {
        Some(ApplyWorkspaceEditResponse { applied: false, failure_reason, .. }) => {
            warn!(
                "Edit {} was not applied: {}",
                response.id,
                failure_reason.unwrap_or_default()
            );
        }
        _ => debug!("Edit {} applied", response.id),
    }
}
