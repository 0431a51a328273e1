//! Runs a single export from source path to finished destination file.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Converter, ExportError, ExportJob, ExportLayout};

/// Outcome of a successful export.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub job: ExportJob,
    pub elapsed: Duration,
}

/// Plans the destination, prepares its folder and runs the converter.
pub struct ExportDispatcher {
    layout: ExportLayout,
    converter: Arc<dyn Converter>,
}

impl ExportDispatcher {
    pub fn new(layout: ExportLayout, converter: Arc<dyn Converter>) -> Self {
        Self { layout, converter }
    }

    pub fn layout(&self) -> &ExportLayout {
        &self.layout
    }

    /// Export `source_path`, blocking the calling task until the converter exits.
    ///
    /// A destination folder that cannot be created fails the job before the
    /// converter is started.
    pub async fn dispatch(&self, source_path: &Path) -> Result<ExportReport, ExportError> {
        let job = self.layout.plan(source_path)?;

        prepare_destination(&job.dest_dir).await?;

        crate::log_event!(
            "export",
            "started",
            "{} -> {}",
            job.source_path.display(),
            job.dest_path.display()
        );

        crate::debug_event!("export", "converter", "{}", self.converter.name());
        let started = Instant::now();
        let result = self.converter.convert(&job).await;
        let elapsed = started.elapsed();

        match result {
            Ok(()) => {
                crate::log_event!(
                    "export",
                    "complete",
                    "{} -> {} ({:.1}s)",
                    job.source_path.display(),
                    job.dest_path.display(),
                    elapsed.as_secs_f64()
                );
                Ok(ExportReport { job, elapsed })
            }
            Err(e) => {
                tracing::error!(
                    "[export] failed after {:.1}s: {} -> {}",
                    elapsed.as_secs_f64(),
                    job.source_path.display(),
                    job.dest_path.display()
                );
                Err(e)
            }
        }
    }
}

/// Create `dir` and all of its ancestors. Existing folders are fine.
pub async fn prepare_destination(dir: &Path) -> Result<(), ExportError> {
    if tokio::fs::metadata(dir).await.is_ok_and(|meta| meta.is_dir()) {
        return Ok(());
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ExportError::CreateDestination {
            dir: dir.to_path_buf(),
            source,
        })?;

    crate::debug_event!("export", "created folder", "{}", dir.display());
    Ok(())
}
