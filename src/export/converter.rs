//! Converter process invocation.
//!
//! The converter is an opaque program (Blender in background mode) that
//! reads the source file, runs the export script and writes the destination
//! file. Its argument list is fixed:
//!
//! ```text
//! <converter> <source> -b --python <script> -- <destination>
//! ```

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::Settings;

use super::{ExportError, ExportJob};

/// Something that turns a planned export into a destination file.
///
/// The watch loop only depends on this trait, so tests can swap in an
/// in-process converter.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Converter name for logging.
    fn name(&self) -> &str;

    /// Run the conversion to completion.
    async fn convert(&self, job: &ExportJob) -> Result<(), ExportError>;
}

/// The converter's command-line contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterCommand {
    pub executable: PathBuf,
    pub script: PathBuf,
}

impl ConverterCommand {
    pub fn new(executable: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            script: script.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.general.converter_executable.clone(),
            settings.export_script_path(),
        )
    }

    /// Full argv, executable first.
    pub fn argv(&self, job: &ExportJob) -> Vec<OsString> {
        vec![
            self.executable.clone().into_os_string(),
            job.source_path.clone().into_os_string(),
            OsString::from("-b"),
            OsString::from("--python"),
            self.script.clone().into_os_string(),
            OsString::from("--"),
            job.dest_path.clone().into_os_string(),
        ]
    }
}

/// Runs the converter as a child process and waits for it to exit.
///
/// The child's stdout and stderr are inherited so its own progress output
/// reaches the console.
#[derive(Debug, Clone)]
pub struct ProcessConverter {
    command: ConverterCommand,
    timeout: Option<Duration>,
}

impl ProcessConverter {
    pub fn new(command: ConverterCommand) -> Self {
        Self {
            command,
            timeout: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(ConverterCommand::from_settings(settings))
            .with_timeout(settings.watchdog.export_timeout())
    }

    /// Kill converters that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &ConverterCommand {
        &self.command
    }
}

#[async_trait]
impl Converter for ProcessConverter {
    fn name(&self) -> &str {
        "process"
    }

    async fn convert(&self, job: &ExportJob) -> Result<(), ExportError> {
        let argv = self.command.argv(job);
        crate::debug_event!("converter", "argv", "{argv:?}");

        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ExportError::ConverterSpawn {
                executable: self.command.executable.clone(),
                source,
            })?;

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!("[converter] failed to kill timed out converter: {e}");
                    }
                    return Err(ExportError::ConverterTimedOut {
                        path: job.source_path.clone(),
                        limit,
                    });
                }
            },
            None => child.wait().await,
        };

        let status = waited.map_err(|source| ExportError::ConverterWait {
            path: job.source_path.clone(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(ExportError::ConverterFailed {
                path: job.source_path.clone(),
                status,
            })
        }
    }
}
