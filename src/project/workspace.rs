//! The published snapshot of an analysis session.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use super::config::AnalysisConfig;
use super::workspace_loader::{LoadError, LoadReport, WorkspaceLoader};
use crate::hir::{Context, Document, Environment, LibraryInfo, Link, ScopeChain, Snapshot};
use crate::imports::ViewerContext;
use crate::syntax::Parser;

/// Holds the current [`Snapshot`] of a session.
///
/// Readers take cheap copies with [`snapshot`](Self::snapshot) and work on
/// them without locking. Every update builds a new snapshot under the write
/// lock and publishes it whole.
pub struct Workspace {
    env: Environment,
    vctx: ViewerContext,
    builtins: RwLock<LibraryInfo>,
    snapshot: RwLock<Snapshot>,
}

impl Workspace {
    pub fn new(vctx: ViewerContext, env: Environment) -> Self {
        Self {
            env,
            vctx,
            builtins: RwLock::new(LibraryInfo::default()),
            snapshot: RwLock::new(Snapshot::new()),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.viewer_context(), config.environment())
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn viewer_context(&self) -> &ViewerContext {
        &self.vctx
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    pub fn update_document(&self, document: Arc<Document>) {
        self.snapshot.write().insert(document, false);
    }

    pub fn remove_document(&self, file_name: &str) {
        self.snapshot.write().remove(file_name);
    }

    pub fn update_library_info(&self, path: &str, info: LibraryInfo) {
        self.snapshot.write().insert_library_info(path, info);
    }

    /// Type information for the builtin QML types.
    pub fn set_builtins(&self, info: LibraryInfo) {
        *self.builtins.write() = info;
    }

    /// Load a directory of sources and publish the result.
    ///
    /// Files are parsed without holding the lock and then inserted into
    /// whatever snapshot is current, so concurrent updates are kept.
    pub fn load_directory(&self, path: impl AsRef<Path>, parser: &dyn Parser) -> Result<LoadReport, LoadError> {
        let mut loaded = Snapshot::new();
        let report = WorkspaceLoader::new(parser, &self.env).load_directory_into_snapshot(path, &mut loaded)?;
        let mut current = self.snapshot.write();
        for document in loaded.iter() {
            current.insert(document.clone(), true);
        }
        Ok(report)
    }

    /// Link the current snapshot.
    pub fn link(&self) -> Arc<Context> {
        let builtins = self.builtins.read().clone();
        Link::new(self.snapshot(), self.vctx.clone(), builtins, &self.env).link()
    }

    /// The root scope chain of `file_name` in a freshly linked context.
    pub fn scope_chain(&self, file_name: &str) -> Option<ScopeChain> {
        let context = self.link();
        let document = context.snapshot().document(file_name)?.clone();
        Some(ScopeChain::new(document, context))
    }
}
