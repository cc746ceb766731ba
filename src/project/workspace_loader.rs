use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::base::Dialect;
use crate::hir::{Document, Environment, Snapshot};
use crate::syntax::Parser;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("directory not found: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

/// Files that could not be loaded, next to the number that were.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub failed: Vec<LoadError>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Loads QML and JavaScript files from disk into a [`Snapshot`].
pub struct WorkspaceLoader<'a> {
    parser: &'a dyn Parser,
    env: &'a Environment,
}

fn is_source_file(path: &Path) -> bool {
    let name = path.to_string_lossy();
    matches!(
        Dialect::from_file_name(&name),
        Dialect::Qml | Dialect::QmlQtQuick2 | Dialect::QmlQtQuick2Ui | Dialect::JavaScript
    )
}

/// Every QML/JavaScript file below `dir`, sorted.
pub fn collect_file_paths(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && is_source_file(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

impl<'a> WorkspaceLoader<'a> {
    pub fn new(parser: &'a dyn Parser, env: &'a Environment) -> Self {
        Self { parser, env }
    }

    /// Parse every source file below `path` in parallel and insert the
    /// documents into `snapshot`. Unreadable files are reported, not fatal.
    pub fn load_directory_into_snapshot(
        &self,
        path: impl AsRef<Path>,
        snapshot: &mut Snapshot,
    ) -> Result<LoadReport, LoadError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(LoadError::NotADirectory(path.to_path_buf()));
        }
        let paths = collect_file_paths(path)?;

        let results: Vec<Result<Arc<Document>, LoadError>> =
            paths.par_iter().map(|path| self.load_file(path)).collect();

        let mut report = LoadReport::default();
        for result in results {
            match result {
                Ok(document) => {
                    debug!(file = document.file_name(), "loaded document");
                    snapshot.insert(document, true);
                    report.loaded += 1;
                }
                Err(err) => {
                    warn!(error = %err, "failed to load document");
                    report.failed.push(err);
                }
            }
        }
        Ok(report)
    }

    fn load_file(&self, path: &Path) -> Result<Arc<Document>, LoadError> {
        let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path.to_string_lossy();
        Ok(Document::parse(
            &file_name,
            source,
            Dialect::AnyLanguage,
            0,
            self.parser,
            self.env,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_source_file() {
        assert!(is_source_file(Path::new("/a/Main.qml")));
        assert!(is_source_file(Path::new("/a/util.js")));
        assert!(is_source_file(Path::new("/a/util.mjs")));
        assert!(!is_source_file(Path::new("/a/qmldir")));
        assert!(!is_source_file(Path::new("/a/plugins.qmltypes")));
        assert!(!is_source_file(Path::new("/a/app.qbs")));
    }
}
