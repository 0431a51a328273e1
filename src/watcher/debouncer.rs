//! Throttling of rapid modify events.
//!
//! Editors often report several modifications for a single save. Only a
//! modify whose file timestamp is more than the throttle window past the
//! last accepted one is let through. Creations and renames always pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::config::ThrottleScope;

use super::event::{WatchEvent, WatchEventKind};

/// Tracked paths above which stale per-path entries are pruned.
const PRUNE_THRESHOLD: usize = 1024;

/// Timestamps of the last accepted modify events.
///
/// `per_path` holds one entry per file that was ever accepted. Entries more
/// than a throttle window older than the newest accepted stamp no longer
/// affect any decision and are dropped once the map passes
/// [`PRUNE_THRESHOLD`].
#[derive(Debug, Default)]
struct ThrottleState {
    global: Option<SystemTime>,
    per_path: HashMap<PathBuf, SystemTime>,
}

/// Debounces modify events against file modification times.
#[derive(Debug)]
pub struct EventDebouncer {
    throttle: Duration,
    scope: ThrottleScope,
    state: Mutex<ThrottleState>,
}

impl EventDebouncer {
    pub fn new(throttle: Duration, scope: ThrottleScope) -> Self {
        Self {
            throttle,
            scope,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    pub fn scope(&self) -> ThrottleScope {
        self.scope
    }

    /// Decide whether `event` passes, reading the file's modification time.
    ///
    /// Falls back to the time the event was observed when the file's
    /// metadata cannot be read.
    pub fn admit(&self, event: &WatchEvent) -> bool {
        if event.kind != WatchEventKind::Modified {
            return true;
        }
        let stamp = modification_time(&event.path).unwrap_or(event.observed_at);
        self.admit_at(event, stamp)
    }

    /// Decide whether `event` passes given the file timestamp `stamp`.
    pub fn admit_at(&self, event: &WatchEvent, stamp: SystemTime) -> bool {
        if event.kind != WatchEventKind::Modified {
            return true;
        }

        let mut state = self.state.lock();
        let last = match self.scope {
            ThrottleScope::Global => state.global,
            ThrottleScope::PerPath => state.per_path.get(&event.path).copied(),
        }
        .unwrap_or(SystemTime::UNIX_EPOCH);

        // A timestamp older than the last accepted one never passes
        let passes = stamp
            .duration_since(last)
            .is_ok_and(|delta| delta > self.throttle);

        if passes {
            match self.scope {
                ThrottleScope::Global => state.global = Some(stamp),
                ThrottleScope::PerPath => {
                    state.per_path.insert(event.path.clone(), stamp);
                    if state.per_path.len() > PRUNE_THRESHOLD {
                        let throttle = self.throttle;
                        state.per_path.retain(|_, last| {
                            !matches!(stamp.duration_since(*last), Ok(age) if age > throttle)
                        });
                    }
                }
            }
        }

        passes
    }
}

fn modification_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
