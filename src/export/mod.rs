//! Export of changed source assets into the mirrored target tree.
//!
//! # Flow
//!
//! ```text
//! source path
//!   -> ExportLayout::plan      (relative path, lock-marker cleanup, extension swap)
//!   -> prepare_destination     (create_dir_all on the destination folder)
//!   -> Converter::convert      (ProcessConverter runs the external converter)
//!   -> ExportReport / ExportError
//! ```

mod converter;
mod dispatcher;
mod error;
mod job;

pub use converter::{Converter, ConverterCommand, ProcessConverter};
pub use dispatcher::{ExportDispatcher, ExportReport, prepare_destination};
pub use error::ExportError;
pub use job::{ExportJob, ExportLayout, sanitize_path};
