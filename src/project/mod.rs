//! Project-level plumbing: configuration, loading sources from disk and
//! publishing snapshots.

mod config;
mod workspace;
mod workspace_loader;

pub use config::AnalysisConfig;
pub use workspace::Workspace;
pub use workspace_loader::{LoadError, LoadReport, WorkspaceLoader, collect_file_paths};
