//! The analysis environment.
//!
//! Everything binding and linking need to know about the outside world:
//! module-name mapping, Qt resource (qrc) contents, how to tell files from
//! directories, C++-registered types and the plugin dumper. One
//! [`Environment`] is built per analysis session and passed by reference.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::library::FakeMetaObject;
use crate::imports::ComponentVersion;

// ============================================================================
// PATHS
// ============================================================================

/// Normalize a `/`-separated path: drop `.` segments, resolve `..` and
/// collapse repeated separators. Leading `..` of relative paths are kept.
pub fn clean_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// `relative` resolved against `directory`, unless already absolute.
pub fn join_path(directory: &str, relative: &str) -> String {
    if relative.starts_with('/') || directory.is_empty() {
        clean_path(relative)
    } else {
        clean_path(&format!("{directory}/{relative}"))
    }
}

/// The directory part of a file path (`/a/b/C.qml` → `/a/b`).
pub fn directory_of(file_name: &str) -> &str {
    match file_name.rfind('/') {
        Some(0) => "/",
        Some(i) => &file_name[..i],
        None => "",
    }
}

/// File name without directory and without any extension (`C.ui.qml` → `C`).
pub fn base_name(file_name: &str) -> &str {
    let name = file_name.rsplit('/').next().unwrap_or(file_name);
    name.split('.').next().unwrap_or(name)
}

// ============================================================================
// COLLABORATORS
// ============================================================================

/// What a path points at.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
    Missing,
}

/// Classifies paths named by import statements.
pub trait FileProbe: Send + Sync {
    fn kind(&self, path: &str) -> PathKind;
}

/// Probes the real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl FileProbe for FsProbe {
    fn kind(&self, path: &str) -> PathKind {
        match std::fs::metadata(Path::new(path)) {
            Ok(meta) if meta.is_dir() => PathKind::Directory,
            Ok(_) => PathKind::File,
            Err(_) => PathKind::Missing,
        }
    }
}

/// Probes a fixed set of files. Every ancestor of a known file counts as a
/// directory.
#[derive(Debug, Default, Clone)]
pub struct MemoryProbe {
    files: BTreeSet<String>,
    directories: BTreeSet<String>,
}

impl MemoryProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str) -> Self {
        self.add_file(path);
        self
    }

    pub fn add_file(&mut self, path: &str) {
        let path = clean_path(path);
        let mut dir = directory_of(&path).to_string();
        while !dir.is_empty() && self.directories.insert(dir.clone()) && dir != "/" {
            dir = directory_of(&dir).to_string();
        }
        self.files.insert(path);
    }

    pub fn add_directory(&mut self, path: &str) {
        self.directories.insert(clean_path(path));
    }
}

impl FileProbe for MemoryProbe {
    fn kind(&self, path: &str) -> PathKind {
        let path = clean_path(path);
        if self.files.contains(&path) {
            PathKind::File
        } else if self.directories.contains(&path) {
            PathKind::Directory
        } else {
            PathKind::Missing
        }
    }
}

/// Receives requests to produce type information for a plugin library.
///
/// Requests are fire-and-forget: results arrive as an updated
/// [`LibraryInfo`](super::LibraryInfo) in a later snapshot.
pub trait PluginDumper: Send + Sync {
    fn load_plugin_types(
        &self,
        library_path: &str,
        import_path: &str,
        uri: &str,
        version: ComponentVersion,
    );
}

// ============================================================================
// QRC TABLE
// ============================================================================

/// Mapping between Qt resource paths and file-system paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QrcTable {
    /// Resource path (always starting with `/`) to file-system paths.
    files: BTreeMap<String, Vec<SmolStr>>,
}

impl QrcTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, qrc_path: &str, file: &str) {
        let key = clean_path(&format!("/{}", qrc_path.trim_start_matches("qrc:")));
        let files = self.files.entry(key).or_default();
        if !files.iter().any(|f| f == file) {
            files.push(SmolStr::new(file));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files registered under exactly `qrc_path`.
    pub fn files_at_qrc_path(&self, qrc_path: &str) -> Vec<SmolStr> {
        let key = clean_path(&format!("/{qrc_path}"));
        self.files.get(&key).cloned().unwrap_or_default()
    }

    /// Entries directly inside the resource directory `qrc_dir`, keyed by
    /// entry name.
    pub fn files_in_qrc_path(&self, qrc_dir: &str) -> BTreeMap<SmolStr, Vec<SmolStr>> {
        let dir = clean_path(&format!("/{qrc_dir}"));
        let prefix = if dir == "/" { dir.clone() } else { format!("{dir}/") };
        let mut res = BTreeMap::new();
        for (path, files) in self.files.range(prefix.clone()..) {
            let Some(rest) = path.strip_prefix(&prefix) else {
                break;
            };
            if rest.is_empty() || rest.contains('/') {
                continue;
            }
            res.insert(SmolStr::new(rest), files.clone());
        }
        res
    }

    /// Every resource path `file` is registered under.
    pub fn qrc_paths_for_file(&self, file: &str) -> Vec<SmolStr> {
        self.files
            .iter()
            .filter(|(_, files)| files.iter().any(|f| f == file))
            .map(|(path, _)| SmolStr::new(path))
            .collect()
    }
}

// ============================================================================
// ENVIRONMENT
// ============================================================================

/// One analysis session's view of the outside world.
#[derive(Clone)]
pub struct Environment {
    module_mapping: FxHashMap<SmolStr, SmolStr>,
    qrc: QrcTable,
    probe: Arc<dyn FileProbe>,
    /// C++-exported meta objects, keyed by originating translation unit.
    cpp_exports: BTreeMap<SmolStr, Vec<Arc<FakeMetaObject>>>,
    /// C++ context properties: name to C++ type name.
    context_properties: BTreeMap<SmolStr, SmolStr>,
    dumper: Option<Arc<dyn PluginDumper>>,
    max_bind_depth: u32,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            module_mapping: FxHashMap::default(),
            qrc: QrcTable::new(),
            probe: Arc::new(FsProbe),
            cpp_exports: BTreeMap::new(),
            context_properties: BTreeMap::new(),
            dumper: None,
            max_bind_depth: Self::DEFAULT_MAX_BIND_DEPTH,
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("module_mapping", &self.module_mapping)
            .field("qrc", &self.qrc)
            .field("cpp_exports", &self.cpp_exports.keys().collect::<Vec<_>>())
            .field("context_properties", &self.context_properties)
            .field("has_dumper", &self.dumper.is_some())
            .field("max_bind_depth", &self.max_bind_depth)
            .finish()
    }
}

impl Environment {
    pub const DEFAULT_MAX_BIND_DEPTH: u32 = 512;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe(mut self, probe: impl FileProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn with_module_mapping(mut self, from: &str, to: &str) -> Self {
        self.module_mapping.insert(SmolStr::new(from), SmolStr::new(to));
        self
    }

    pub fn with_qrc(mut self, qrc: QrcTable) -> Self {
        self.qrc = qrc;
        self
    }

    pub fn with_cpp_exports(mut self, translation_unit: &str, objects: Vec<Arc<FakeMetaObject>>) -> Self {
        self.cpp_exports.insert(SmolStr::new(translation_unit), objects);
        self
    }

    pub fn with_context_property(mut self, name: &str, cpp_type: &str) -> Self {
        self.context_properties
            .insert(SmolStr::new(name), SmolStr::new(cpp_type));
        self
    }

    pub fn with_dumper(mut self, dumper: Arc<dyn PluginDumper>) -> Self {
        self.dumper = Some(dumper);
        self
    }

    pub fn with_max_bind_depth(mut self, depth: u32) -> Self {
        self.max_bind_depth = depth.max(1);
        self
    }

    /// Apply the module-name mapping to an import URI.
    pub fn map_module<'a>(&'a self, uri: &'a str) -> &'a str {
        self.module_mapping.get(uri).map_or(uri, |m| m.as_str())
    }

    pub fn qrc(&self) -> &QrcTable {
        &self.qrc
    }

    pub fn probe(&self, path: &str) -> PathKind {
        self.probe.kind(path)
    }

    pub fn cpp_exports(&self) -> impl Iterator<Item = (&SmolStr, &[Arc<FakeMetaObject>])> {
        self.cpp_exports.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn context_properties(&self) -> impl Iterator<Item = (&SmolStr, &SmolStr)> {
        self.context_properties.iter()
    }

    pub fn dumper(&self) -> Option<&dyn PluginDumper> {
        self.dumper.as_deref()
    }

    pub fn max_bind_depth(&self) -> u32 {
        self.max_bind_depth
    }
}
