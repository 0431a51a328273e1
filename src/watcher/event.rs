//! Watch events and the filter that decides which ones reach the pipeline.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use notify::EventKind;
use notify::event::{CreateKind, ModifyKind, RenameMode};

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    Created,
    Modified,
    /// A file was renamed into place. Editors that save through a temporary
    /// file produce these instead of `Modified`.
    Moved,
}

impl WatchEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchEventKind::Created => "created",
            WatchEventKind::Modified => "modified",
            WatchEventKind::Moved => "moved",
        }
    }
}

impl std::fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single file-system change, consumed once by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
    pub is_directory: bool,
    pub observed_at: SystemTime,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: WatchEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
            is_directory: false,
            observed_at: SystemTime::now(),
        }
    }

    pub fn with_observed_at(mut self, observed_at: SystemTime) -> Self {
        self.observed_at = observed_at;
        self
    }

    pub fn directory(mut self) -> Self {
        self.is_directory = true;
        self
    }

    /// Translate a raw notify event.
    ///
    /// Deletions, access events and the "from" half of renames produce
    /// nothing; the rest produce one event for the path that now exists.
    pub fn from_notify(event: &notify::Event) -> Vec<WatchEvent> {
        let observed_at = SystemTime::now();
        let make = |path: &Path, kind: WatchEventKind, is_directory: bool| WatchEvent {
            path: path.to_path_buf(),
            kind,
            is_directory,
            observed_at,
        };

        match event.kind {
            EventKind::Create(CreateKind::Folder) => event
                .paths
                .iter()
                .map(|p| make(p, WatchEventKind::Created, true))
                .collect(),
            EventKind::Create(_) => event
                .paths
                .iter()
                .map(|p| make(p, WatchEventKind::Created, p.is_dir()))
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Vec::new(),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
                .paths
                .iter()
                .map(|p| make(p, WatchEventKind::Moved, p.is_dir()))
                .collect(),
            // paths are [from, to]
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
                .paths
                .last()
                .map(|p| vec![make(p, WatchEventKind::Moved, p.is_dir())])
                .unwrap_or_default(),
            // Backends that cannot tell which side of a rename they saw
            EventKind::Modify(ModifyKind::Name(_)) => event
                .paths
                .iter()
                .filter(|p| p.exists())
                .map(|p| make(p, WatchEventKind::Moved, p.is_dir()))
                .collect(),
            EventKind::Modify(_) => event
                .paths
                .iter()
                .map(|p| make(p, WatchEventKind::Modified, p.is_dir()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Decides which events are source-asset changes worth exporting.
#[derive(Debug, Clone)]
pub struct EventFilter {
    extension: String,
    lock_marker: char,
}

impl EventFilter {
    pub fn new(extension: &str, lock_marker: char) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
            lock_marker,
        }
    }

    /// Accept only files with the source extension whose name does not end
    /// in the editor's lock marker.
    pub fn accepts(&self, event: &WatchEvent) -> bool {
        if event.is_directory {
            return false;
        }

        let Some(name) = event.path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        if name.ends_with(self.lock_marker) {
            return false;
        }

        event
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}
