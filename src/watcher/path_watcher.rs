//! Recursive file-system observation feeding the event queue.

use std::path::{Path, PathBuf};

use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::error::WatchError;
use super::event::{EventFilter, WatchEvent};

/// Watches a root folder recursively and pushes filtered [`WatchEvent`]s
/// into a bounded channel.
///
/// notify delivers events on its own thread; a full channel blocks that
/// thread until the consumer catches up. Dropping the `PathWatcher` stops
/// observation.
pub struct PathWatcher {
    root: PathBuf,
    _watcher: notify::RecommendedWatcher,
}

impl PathWatcher {
    /// Start watching `root`.
    ///
    /// Fails if `root` does not exist or is not a directory.
    pub fn start(
        root: &Path,
        filter: EventFilter,
        tx: mpsc::Sender<WatchEvent>,
    ) -> Result<Self, WatchError> {
        let root = canonical_root(root)?;

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!("[watcher] file watch error: {e}");
                    return;
                }
            };

            for change in WatchEvent::from_notify(&event) {
                if !filter.accepts(&change) {
                    tracing::trace!("[watcher] ignored {:?} {}", event.kind, change.path.display());
                    continue;
                }
                if tx.blocking_send(change).is_err() {
                    // Receiver gone, session is shutting down
                    return;
                }
            }
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: root.clone(),
                reason: e.to_string(),
            })?;

        crate::debug_event!("watcher", "watching", "{}", root.display());

        Ok(Self {
            root,
            _watcher: watcher,
        })
    }

    /// The canonical folder being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Canonicalize the watched folder so event paths and relative-path
/// computation agree.
pub fn canonical_root(root: &Path) -> Result<PathBuf, WatchError> {
    match root.canonicalize() {
        Ok(path) if path.is_dir() => Ok(path),
        _ => Err(WatchError::RootNotFound {
            path: root.to_path_buf(),
        }),
    }
}
