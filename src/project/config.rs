//! Analysis configuration.

use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::base::Dialect;
use crate::hir::{Environment, FileProbe, QrcTable};
use crate::imports::ViewerContext;

/// Everything a session needs to know about the project being analysed.
///
/// One config yields both the [`ViewerContext`] documents are linked under
/// and the [`Environment`] binding and linking consult.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalysisConfig {
    /// Directories searched for QML modules.
    pub import_paths: Vec<SmolStr>,
    /// Directories searched for loose `.qmltypes` files.
    pub application_directories: Vec<SmolStr>,
    /// Active file selectors, highest priority first, without `+`.
    pub selectors: Vec<SmolStr>,
    pub language: Dialect,
    /// Import URI replacements (`QtQuick.Controls` → `MyControls`).
    pub module_mapping: BTreeMap<SmolStr, SmolStr>,
    /// Resource path to file-system path.
    pub qrc_resources: Vec<(SmolStr, SmolStr)>,
    pub max_bind_depth: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            import_paths: Vec::new(),
            application_directories: Vec::new(),
            selectors: Vec::new(),
            language: Dialect::Qml,
            module_mapping: BTreeMap::new(),
            qrc_resources: Vec::new(),
            max_bind_depth: Environment::DEFAULT_MAX_BIND_DEPTH,
        }
    }
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_import_path(mut self, path: impl Into<SmolStr>) -> Self {
        self.import_paths.push(path.into());
        self
    }

    pub fn with_application_directory(mut self, dir: impl Into<SmolStr>) -> Self {
        self.application_directories.push(dir.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<SmolStr>) -> Self {
        let selector: SmolStr = selector.into();
        self.selectors
            .push(SmolStr::new(selector.trim_start_matches('+')));
        self
    }

    pub fn with_language(mut self, language: Dialect) -> Self {
        self.language = language;
        self
    }

    pub fn with_module_mapping(mut self, from: impl Into<SmolStr>, to: impl Into<SmolStr>) -> Self {
        self.module_mapping.insert(from.into(), to.into());
        self
    }

    pub fn with_qrc_resource(mut self, qrc_path: impl Into<SmolStr>, file: impl Into<SmolStr>) -> Self {
        self.qrc_resources.push((qrc_path.into(), file.into()));
        self
    }

    pub fn with_max_bind_depth(mut self, depth: u32) -> Self {
        self.max_bind_depth = depth;
        self
    }

    pub fn viewer_context(&self) -> ViewerContext {
        ViewerContext::new()
            .with_paths(self.import_paths.iter().cloned())
            .with_application_directories(self.application_directories.iter().cloned())
            .with_selectors(self.selectors.iter().cloned())
            .with_language(self.language)
    }

    /// An environment probing the real file system.
    pub fn environment(&self) -> Environment {
        self.configure(Environment::new())
    }

    /// An environment classifying paths through `probe`.
    pub fn environment_with_probe(&self, probe: impl FileProbe + 'static) -> Environment {
        self.configure(Environment::new().with_probe(probe))
    }

    fn configure(&self, mut env: Environment) -> Environment {
        let mut qrc = QrcTable::new();
        for (qrc_path, file) in &self.qrc_resources {
            qrc.add(qrc_path, file);
        }
        for (from, to) in &self.module_mapping {
            env = env.with_module_mapping(from, to);
        }
        env.with_qrc(qrc).with_max_bind_depth(self.max_bind_depth)
    }
}
