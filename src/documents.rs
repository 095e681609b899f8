//! Open document buffers (full text sync)

use anyhow::{bail, Context, Result};
use log::debug;
use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams, Uri,
};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::protocol::uri_to_path;

/// Identity of an open document. File URIs are compared by path, so
/// `file:///c%3A/a%2Bb.al` and `file:///c:/a+b.al` name the same buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DocumentKey {
    File(PathBuf),
    Other(String),
}

impl DocumentKey {
    fn of(uri: &Uri) -> Self {
        match uri_to_path(uri) {
            Some(path) => Self::File(path),
            None => Self::Other(uri.as_str().to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    open: HashMap<DocumentKey, String>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn did_open(&mut self, params: DidOpenTextDocumentParams) {
        debug!("Opened {}", params.text_document.uri.as_str());
        self.open.insert(
            DocumentKey::of(&params.text_document.uri),
            params.text_document.text,
        );
    }

    /// Apply a change; with full sync the last change carries the whole text
    pub fn did_change(&mut self, params: DidChangeTextDocumentParams) {
        if let Some(change) = params.content_changes.into_iter().last() {
            self.open
                .insert(DocumentKey::of(&params.text_document.uri), change.text);
        }
    }

    pub fn did_close(&mut self, params: DidCloseTextDocumentParams) {
        debug!("Closed {}", params.text_document.uri.as_str());
        self.open.remove(&DocumentKey::of(&params.text_document.uri));
    }

    /// Current text of a document: the open buffer, or the file on disk
    pub fn text(&self, uri: &Uri) -> Result<String> {
        let key = DocumentKey::of(uri);
        if let Some(text) = self.open.get(&key) {
            return Ok(text.clone());
        }
        let DocumentKey::File(path) = key else {
            bail!("Document is neither open nor a file: {}", uri.as_str());
        };
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::path_to_uri;
    use lsp_types::{
        TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem,
        VersionedTextDocumentIdentifier,
    };
    use tempfile::TempDir;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_open_change_close() {
        let mut store = DocumentStore::new();
        let doc_uri = uri("untitled:Untitled-1");

        store.did_open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: doc_uri.clone(),
                language_id: "al".to_string(),
                version: 1,
                text: "codeunit 1 A {}".to_string(),
            },
        });
        assert_eq!(store.text(&doc_uri).unwrap(), "codeunit 1 A {}");

        store.did_change(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: doc_uri.clone(),
                version: 2,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: "codeunit 1 B {}".to_string(),
            }],
        });
        assert_eq!(store.text(&doc_uri).unwrap(), "codeunit 1 B {}");

        store.did_close(DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier {
                uri: doc_uri.clone(),
            },
        });
        assert!(store.text(&doc_uri).is_err());
    }

    #[test]
    fn test_closed_document_is_read_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Disk.Codeunit.al");
        fs::write(&path, "codeunit 2 Disk {}").unwrap();

        let store = DocumentStore::new();
        assert_eq!(store.text(&path_to_uri(&path).unwrap()).unwrap(), "codeunit 2 Disk {}");
    }

    #[test]
    fn test_buffer_found_under_any_uri_encoding() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("a+b");
        fs::create_dir(&folder).unwrap();
        let path = folder.join("Sales.Codeunit.al");
        fs::write(&path, "DISK").unwrap();

        // Editors escape '+' and ':' where we keep them verbatim
        let ours = path_to_uri(&path).unwrap();
        let client = uri(&ours.as_str().replace('+', "%2B"));
        assert_ne!(client, ours);

        let mut store = DocumentStore::new();
        store.did_open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: client.clone(),
                language_id: "al".to_string(),
                version: 1,
                text: "BUFFER".to_string(),
            },
        });
        assert_eq!(store.text(&client).unwrap(), "BUFFER");
        assert_eq!(store.text(&ours).unwrap(), "BUFFER");

        store.did_close(DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier { uri: ours.clone() },
        });
        assert_eq!(store.text(&client).unwrap(), "DISK");
    }
}
