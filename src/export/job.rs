//! Destination planning for export jobs.
//!
//! Mirrors a source file's position under the source root into the target
//! root, swaps the extension and strips editor lock markers from every
//! mirrored component.

use std::path::{Component, Path, PathBuf};

use crate::config::Settings;

use super::ExportError;

/// One planned export, created per accepted change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    /// File the converter reads.
    pub source_path: PathBuf,
    /// `source_path` relative to the source root.
    pub relative_path: PathBuf,
    /// File the converter writes.
    pub dest_path: PathBuf,
    /// Folder that must exist before the converter runs.
    pub dest_dir: PathBuf,
}

/// Maps source files to their mirrored destinations.
#[derive(Debug, Clone)]
pub struct ExportLayout {
    source_root: PathBuf,
    target_root: PathBuf,
    source_extension: String,
    target_extension: String,
    lock_marker: char,
}

impl ExportLayout {
    pub fn new(source_root: impl Into<PathBuf>, target_root: impl Into<PathBuf>) -> Self {
        let defaults = Settings::default();
        Self {
            source_root: source_root.into(),
            target_root: target_root.into(),
            source_extension: defaults.models.source_extension,
            target_extension: defaults.models.target_extension,
            lock_marker: defaults.watchdog.lock_marker,
        }
    }

    /// Layout using the extension mapping and lock marker from settings.
    pub fn from_settings(
        settings: &Settings,
        source_root: impl Into<PathBuf>,
        target_root: impl Into<PathBuf>,
    ) -> Self {
        Self::new(source_root, target_root)
            .with_extensions(
                &settings.models.source_extension,
                &settings.models.target_extension,
            )
            .with_lock_marker(settings.watchdog.lock_marker)
    }

    pub fn with_extensions(mut self, source: &str, target: &str) -> Self {
        self.source_extension = source.trim_start_matches('.').to_string();
        self.target_extension = target.trim_start_matches('.').to_string();
        self
    }

    pub fn with_lock_marker(mut self, marker: char) -> Self {
        self.lock_marker = marker;
        self
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    pub fn source_extension(&self) -> &str {
        &self.source_extension
    }

    /// Check whether a path names a source asset.
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.source_extension))
    }

    /// Plan the export of `source_path`.
    pub fn plan(&self, source_path: &Path) -> Result<ExportJob, ExportError> {
        if !self.is_source_file(source_path) {
            return Err(ExportError::UnsupportedExtension {
                path: source_path.to_path_buf(),
                expected: self.source_extension.clone(),
            });
        }

        let relative_path = source_path
            .strip_prefix(&self.source_root)
            .map_err(|_| ExportError::OutsideSourceRoot {
                path: source_path.to_path_buf(),
                root: self.source_root.clone(),
            })?
            .to_path_buf();

        let dest_path = self
            .target_root
            .join(sanitize_path(&relative_path, self.lock_marker))
            .with_extension(&self.target_extension);

        let dest_dir = dest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.target_root.clone());

        Ok(ExportJob {
            source_path: source_path.to_path_buf(),
            relative_path,
            dest_path,
            dest_dir,
        })
    }
}

/// Remove every `marker` from each component of a relative path.
///
/// Components that consist only of markers are dropped.
pub fn sanitize_path(path: &Path, marker: char) -> PathBuf {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                if !name.contains(marker) {
                    return Some(PathBuf::from(name.as_ref()));
                }
                let cleaned = name.replace(marker, "");
                (!cleaned.is_empty()).then(|| PathBuf::from(cleaned))
            }
            other => Some(PathBuf::from(other.as_os_str())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ExportLayout {
        ExportLayout::new("/src", "/out")
    }

    #[test]
    fn test_mirrors_nested_folders() {
        let job = layout().plan(Path::new("/src/a/b/model.blend")).unwrap();
        assert_eq!(job.relative_path, PathBuf::from("a/b/model.blend"));
        assert_eq!(job.dest_path, PathBuf::from("/out/a/b/model.fbx"));
        assert_eq!(job.dest_dir, PathBuf::from("/out/a/b"));
    }

    #[test]
    fn test_file_at_root_goes_to_target_root() {
        let job = layout().plan(Path::new("/src/crate.blend")).unwrap();
        assert_eq!(job.dest_path, PathBuf::from("/out/crate.fbx"));
        assert_eq!(job.dest_dir, PathBuf::from("/out"));
    }

    #[test]
    fn test_lock_marker_is_stripped_from_destination() {
        let job = layout().plan(Path::new("/src/props/model@.blend")).unwrap();
        assert_eq!(job.dest_path, PathBuf::from("/out/props/model.fbx"));
        assert!(!job.dest_path.to_string_lossy().contains('@'));
    }

    #[test]
    fn test_lock_marker_is_stripped_from_folder_names() {
        let job = layout().plan(Path::new("/src/v@2/model@.blend")).unwrap();
        assert_eq!(job.dest_path, PathBuf::from("/out/v2/model.fbx"));
        assert_eq!(job.dest_dir, PathBuf::from("/out/v2"));
        assert!(!job.dest_path.to_string_lossy().contains('@'));
        // The source side is untouched
        assert_eq!(job.relative_path, PathBuf::from("v@2/model@.blend"));
    }

    #[test]
    fn test_target_root_keeps_its_markers() {
        let job = ExportLayout::new("/src", "/out@build")
            .plan(Path::new("/src/rock.blend"))
            .unwrap();
        assert_eq!(job.dest_path, PathBuf::from("/out@build/rock.fbx"));
    }

    #[test]
    fn test_custom_extensions_and_marker() {
        let layout = ExportLayout::new("/src", "/out")
            .with_extensions(".ma", ".glb")
            .with_lock_marker('~');
        let job = layout.plan(Path::new("/src/hero~.ma")).unwrap();
        assert_eq!(job.dest_path, PathBuf::from("/out/hero.glb"));
    }

    #[test]
    fn test_extension_match_ignores_case() {
        assert!(layout().is_source_file(Path::new("/src/Tree.BLEND")));
        assert!(!layout().is_source_file(Path::new("/src/tree.blend1")));
        assert!(!layout().is_source_file(Path::new("/src/tree.blend@")));
    }

    #[test]
    fn test_outside_source_root_is_rejected() {
        let err = layout().plan(Path::new("/elsewhere/model.blend")).unwrap_err();
        assert!(matches!(err, ExportError::OutsideSourceRoot { .. }));
    }

    #[test]
    fn test_wrong_extension_is_rejected() {
        let err = layout().plan(Path::new("/src/notes.txt")).unwrap_err();
        assert!(matches!(
            err,
            ExportError::UnsupportedExtension { ref expected, .. } if expected == "blend"
        ));
    }

    #[test]
    fn test_sanitize_leaves_clean_names_alone() {
        let path = Path::new("a/model.blend");
        assert_eq!(sanitize_path(path, '@'), path.to_path_buf());
    }

    #[test]
    fn test_sanitize_drops_marker_only_folders() {
        assert_eq!(
            sanitize_path(Path::new("@/@@/b@/m@.blend"), '@'),
            PathBuf::from("b/m.blend")
        );
    }
}
