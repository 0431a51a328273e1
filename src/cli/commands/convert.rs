//! Convert command - one-shot export of a single file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};

use crate::config::Settings;
use crate::export::{ExportDispatcher, ExportLayout, ExportReport, ProcessConverter};

/// Arguments for the convert command.
pub struct ConvertArgs {
    pub file: PathBuf,
    pub destination: Option<PathBuf>,
}

/// Export one file, mirroring its position under `models.source_folder`.
pub async fn run(args: ConvertArgs, settings: Arc<Settings>) -> anyhow::Result<ExportReport> {
    let ConvertArgs { file, destination } = args;

    let target = destination.unwrap_or_else(|| settings.models.target_folder.clone());
    let target = std::path::absolute(&target)
        .with_context(|| format!("Invalid target folder {}", target.display()))?;

    let layout = ExportLayout::from_settings(&settings, &settings.models.source_folder, &target);
    if !layout.is_source_file(&file) {
        bail!("A .{} file must be provided", layout.source_extension());
    }

    let file = file
        .canonicalize()
        .with_context(|| format!("Cannot read {}", file.display()))?;
    let source_root = settings
        .models
        .source_folder
        .canonicalize()
        .with_context(|| {
            format!(
                "Source folder {} does not exist",
                settings.models.source_folder.display()
            )
        })?;

    let dispatcher = ExportDispatcher::new(
        ExportLayout::from_settings(&settings, source_root, target),
        Arc::new(ProcessConverter::from_settings(&settings)),
    );
    crate::debug_event!(
        "convert",
        "converter",
        "{}",
        settings.general.converter_executable.display()
    );
    crate::debug_event!(
        "convert",
        "target",
        "{}",
        dispatcher.layout().target_root().display()
    );

    let report = dispatcher.dispatch(&file).await?;
    Ok(report)
}
