//! Single-flight tracking of running exports.
//!
//! At most one export per source path runs at a time. A change that arrives
//! while its path is busy is dropped, not queued.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;

/// Set of source paths with an export in flight. Cheap to clone; clones
/// share the same set.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    in_flight: Arc<DashSet<PathBuf>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as in flight. Returns `false` if it already was.
    pub fn try_acquire(&self, path: &Path) -> bool {
        self.in_flight.insert(path.to_path_buf())
    }

    /// Remove `path` from the in-flight set. Releasing an idle path is a no-op.
    pub fn release(&self, path: &Path) {
        self.in_flight.remove(path);
    }

    /// Acquire `path` and get a claim that releases it when dropped.
    pub fn claim(&self, path: &Path) -> Option<JobClaim> {
        self.try_acquire(path).then(|| JobClaim {
            tracker: self.clone(),
            path: path.to_path_buf(),
        })
    }

    pub fn is_in_flight(&self, path: &Path) -> bool {
        self.in_flight.contains(path)
    }

    /// Number of exports currently in flight.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

/// Ownership of one in-flight slot.
///
/// Dropping the claim releases the path, whether the export finished,
/// failed or its task panicked.
#[derive(Debug)]
pub struct JobClaim {
    tracker: JobTracker,
    path: PathBuf,
}

impl JobClaim {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobClaim {
    fn drop(&mut self) {
        self.tracker.release(&self.path);
    }
}
