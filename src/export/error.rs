//! Error types for export jobs.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors from planning or running a single export.
///
/// None of these stop a watch session; they fail the one job.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("{path} is not inside the source root {root}")]
    OutsideSourceRoot { path: PathBuf, root: PathBuf },

    #[error("{path} is not a .{expected} file")]
    UnsupportedExtension { path: PathBuf, expected: String },

    #[error("Failed to create destination folder {dir}: {source}")]
    CreateDestination {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start converter {executable}: {source}")]
    ConverterSpawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lost track of converter process for {path}: {source}")]
    ConverterWait {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter failed for {path} ({status})")]
    ConverterFailed { path: PathBuf, status: ExitStatus },

    #[error("Converter for {path} did not finish within {limit:?} and was killed")]
    ConverterTimedOut { path: PathBuf, limit: Duration },
}
