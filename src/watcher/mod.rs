//! Watch pipeline for automatic re-export on save.
//!
//! # Architecture
//!
//! ```text
//! PathWatcher (notify, own thread)
//!   - filters by extension / lock marker / directories
//!   - blocking_send into a bounded mpsc queue
//!         |
//! ExportOrchestrator (consumer loop)
//!   - EventDebouncer   throttles Modified events
//!   - JobTracker       one in-flight export per path
//!   - JoinSet + Semaphore  concurrent ExportDispatcher runs
//! ```

mod debouncer;
mod error;
mod event;
mod job_tracker;
mod orchestrator;
mod path_watcher;

pub use debouncer::EventDebouncer;
pub use error::WatchError;
pub use event::{EventFilter, WatchEvent, WatchEventKind};
pub use job_tracker::{JobClaim, JobTracker};
pub use orchestrator::{
    Admission, ExportOrchestrator, ExportOrchestratorBuilder, SessionStats, WatchSession,
};
pub use path_watcher::{PathWatcher, canonical_root};
