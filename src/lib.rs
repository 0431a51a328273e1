pub mod cli;
pub mod config;
pub mod export;
pub mod logging;
pub mod watcher;

pub use config::{Settings, ThrottleScope};
pub use export::{
    Converter, ExportDispatcher, ExportError, ExportJob, ExportLayout, ExportReport,
    ProcessConverter,
};
pub use watcher::{
    EventDebouncer, ExportOrchestrator, JobTracker, SessionStats, WatchError, WatchEvent,
    WatchEventKind, WatchSession,
};
