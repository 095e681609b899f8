//! File system watcher keeping the object index current

use anyhow::Result;
use log::{debug, error, info};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

use crate::indexer::is_al_file;

/// Change to an AL file
#[derive(Debug, PartialEq, Eq)]
pub enum FileChange {
    /// Created or modified
    Modified(PathBuf),
    Deleted(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            Self::Modified(path) | Self::Deleted(path) => path,
        }
    }

    /// Change for one path of a notify event; `None` for other files and event kinds
    fn from_event(kind: &EventKind, path: &Path) -> Option<Self> {
        if !is_al_file(path) {
            return None;
        }
        match kind {
            EventKind::Create(_) | EventKind::Modify(_) => Some(Self::Modified(path.to_path_buf())),
            EventKind::Remove(_) => Some(Self::Deleted(path.to_path_buf())),
            _ => None,
        }
    }
}

/// Recursive watcher over one workspace folder
pub struct AlFileWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<FileChange>,
}

impl AlFileWatcher {
    pub fn new(root: &Path) -> Result<Self> {
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    for change in event
                        .paths
                        .iter()
                        .filter_map(|path| FileChange::from_event(&event.kind, path))
                    {
                        debug!("{:?}", change);
                        if tx.send(change).is_err() {
                            error!("Failed to send file change event");
                        }
                    }
                }
                Err(e) => error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        info!("Watching for file changes in: {}", root.display());

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Next change, waiting at most `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<FileChange> {
        self.receiver.recv_timeout(timeout).ok()
    }
}
