//! Linking: resolving every document's imports.
//!
//! A [`Link`] pass takes a snapshot, the viewer context it is seen from and
//! the builtins library, and produces a [`Context`]: one [`Imports`] table
//! per document plus the namespace and C++ type objects those imports
//! point at. Linking never performs I/O. Libraries whose type information
//! is still missing resolve as pending and a dump request goes to the
//! environment's [`PluginDumper`](super::PluginDumper).

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::{debug, trace};

use super::context::Context;
use super::cpp_types::{CppQmlTypes, DEFAULT_PACKAGE, default_qt_objects};
use super::diagnostics::DiagnosticCollector;
use super::document::Document;
use super::environment::{Environment, clean_path, directory_of, join_path};
use super::ids::{ObjectRef, OwnerId};
use super::imports::{Import, ImportInfo, Imports};
use super::library::{LibraryInfo, ModuleApiInfo, PluginTypeInfoStatus};
use super::snapshot::Snapshot;
use super::value::{ObjectKind, Prototype, Value, ValueOwner};
use crate::base::{Dialect, SourceLocation};
use crate::imports::{ComponentVersion, ImportType, ViewerContext};

// ============================================================================
// MODULE PATHS
// ============================================================================

/// Candidate directories for library `uri` at `version`, paired with the
/// import path each one was derived from.
fn library_candidates(
    uri: &str,
    version: ComponentVersion,
    import_paths: &[SmolStr],
) -> Vec<(SmolStr, String)> {
    let parts: Vec<&str> = uri.split('.').filter(|p| !p.is_empty()).collect();
    let mut version_parts = Vec::new();
    if version.major >= 0 && !version.is_max() {
        if version.minor >= 0 && version.minor != ComponentVersion::MAX_VERSION {
            version_parts.push(format!("{}.{}", version.major, version.minor));
        }
        version_parts.push(version.major.to_string());
    }

    let mut res = Vec::new();
    for version_part in &version_parts {
        for i in (0..parts.len()).rev() {
            for import_path in import_paths {
                let mut segments: Vec<String> = vec![import_path.to_string()];
                segments.extend(parts[..i].iter().map(|p| p.to_string()));
                segments.push(format!("{}.{version_part}", parts[i]));
                segments.extend(parts[i + 1..].iter().map(|p| p.to_string()));
                res.push((import_path.clone(), clean_path(&segments.join("/"))));
            }
        }
    }
    for import_path in import_paths {
        res.push((import_path.clone(), join_path(import_path, &parts.join("/"))));
    }
    res
}

/// Directories that may hold library `uri` at `version`, most specific
/// first: `A/B/C.2.15`, `A/B.2.15/C`, `A.2.15/B/C`, the same with only the
/// major version, then `A/B/C`, each under every import path.
pub fn module_paths(uri: &str, version: ComponentVersion, import_paths: &[SmolStr]) -> Vec<String> {
    library_candidates(uri, version, import_paths)
        .into_iter()
        .map(|(_, path)| path)
        .collect()
}

/// The highest module API not newer than `version`.
fn best_module_api(apis: &[ModuleApiInfo], version: ComponentVersion) -> Option<&ModuleApiInfo> {
    let mut best: Option<&ModuleApiInfo> = None;
    for api in apis {
        if api.version <= version && best.is_none_or(|b| b.version < api.version) {
            best = Some(api);
        }
    }
    best
}

// ============================================================================
// LINK
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ImportCacheKey {
    ty: ImportType,
    path: SmolStr,
    major: i32,
    minor: i32,
}

impl ImportCacheKey {
    fn new(info: &ImportInfo) -> Self {
        let path = match info.ty {
            ImportType::Library => info.name.clone(),
            _ => info.path.clone(),
        };
        Self {
            ty: info.ty,
            path,
            major: info.version.major,
            minor: info.version.minor,
        }
    }
}

/// Where a library's types land and the version they are seen at.
#[derive(Clone, Copy, Debug)]
struct LibraryTarget<'t> {
    object: ObjectRef,
    /// Module URI, or the library directory for path imports.
    package: &'t str,
    version: ComponentVersion,
    is_module: bool,
}

/// Unversioned imports see every version.
fn effective_version(version: ComponentVersion) -> ComponentVersion {
    if version.is_valid() {
        version
    } else {
        ComponentVersion::max()
    }
}

/// One link pass over a snapshot.
pub struct Link<'a> {
    snapshot: Snapshot,
    vctx: ViewerContext,
    builtins: LibraryInfo,
    env: &'a Environment,
}

impl<'a> Link<'a> {
    pub fn new(snapshot: Snapshot, vctx: ViewerContext, builtins: LibraryInfo, env: &'a Environment) -> Self {
        Self {
            snapshot,
            vctx,
            builtins,
            env,
        }
    }

    /// Resolve the imports of every document in the snapshot.
    pub fn link(self) -> Arc<Context> {
        let Link {
            snapshot,
            vctx,
            builtins,
            env,
        } = self;

        let mut linker = Linker::new(&snapshot, &vctx, env);
        linker.load_cpp_types(&builtins);
        let global = linker.global_object();
        let cpp_context_properties = linker.context_properties();

        let mut imports = FxHashMap::default();
        let mut owners = FxHashMap::default();
        for doc in snapshot.iter() {
            owners.insert(doc.bind().owner().id(), SmolStr::new(doc.file_name()));
            let doc_imports = linker.link_imports(doc);
            debug!(
                document = doc.file_name(),
                imports = doc_imports.len(),
                failed = doc_imports.import_failed(),
                "linked document"
            );
            imports.insert(SmolStr::new(doc.file_name()), doc_imports);
        }

        let Linker {
            owner, diagnostics, ..
        } = linker;
        Arc::new(Context {
            snapshot,
            vctx,
            owner,
            imports,
            global,
            cpp_context_properties,
            diagnostics: diagnostics.diagnostics().to_vec(),
            owners,
        })
    }
}

struct Linker<'a> {
    env: &'a Environment,
    snapshot: &'a Snapshot,
    vctx: &'a ViewerContext,
    owner: ValueOwner,
    cpp: CppQmlTypes,
    cache: FxHashMap<ImportCacheKey, Import>,
    /// Module APIs made importable by libraries the current document
    /// imported so far, by URI.
    importable_module_apis: BTreeMap<SmolStr, Vec<ModuleApiInfo>>,
    requested_dumps: FxHashSet<SmolStr>,
    diagnostics: DiagnosticCollector,
}

const GLOBAL_CONSTRUCTORS: &[&str] = &[
    "Object", "Function", "Array", "String", "Boolean", "Number", "Date", "RegExp", "Error",
    "EvalError", "RangeError", "ReferenceError", "SyntaxError", "TypeError", "URIError", "Math",
    "JSON", "Promise", "Map", "Set", "Symbol",
];

const GLOBAL_FUNCTIONS: &[&str] = &[
    "parseInt", "parseFloat", "isNaN", "isFinite", "decodeURI", "decodeURIComponent", "encodeURI",
    "encodeURIComponent", "escape", "unescape", "print", "qsTr", "qsTranslate", "qsTrId",
];

const QT_METHODS: &[&str] = &[
    "rgba", "hsla", "hsva", "rect", "point", "size", "vector2d", "vector3d", "font", "quit",
    "createComponent", "createQmlObject", "resolvedUrl", "openUrlExternally", "formatDate",
    "formatTime", "formatDateTime", "binding", "callLater",
];

const CONSOLE_METHODS: &[&str] = &[
    "log", "debug", "info", "warn", "error", "assert", "count", "profile", "profileEnd", "time",
    "timeEnd", "trace", "exception",
];

impl<'a> Linker<'a> {
    fn new(snapshot: &'a Snapshot, vctx: &'a ViewerContext, env: &'a Environment) -> Self {
        Self {
            env,
            snapshot,
            vctx,
            owner: ValueOwner::with_id(OwnerId::LINK),
            cpp: CppQmlTypes::new(),
            cache: FxHashMap::default(),
            importable_module_apis: BTreeMap::new(),
            requested_dumps: FxHashSet::default(),
            diagnostics: DiagnosticCollector::new(),
        }
    }

    fn load_cpp_types(&mut self, builtins: &LibraryInfo) {
        if builtins.plugin_type_info_status.is_done() {
            self.cpp.load(&mut self.owner, "<builtins>", &builtins.meta_objects, None);
        } else {
            self.cpp.load(&mut self.owner, "<defaults>", &default_qt_objects(), None);
        }
        let env = self.env;
        for (unit, objects) in env.cpp_exports() {
            self.cpp.load(&mut self.owner, unit, objects, None);
        }
    }

    fn methods_object(&mut self, class_name: &str, methods: &[&str]) -> ObjectRef {
        let obj = self.owner.new_object(class_name, ObjectKind::Plain);
        for method in methods {
            self.owner.set_member(obj, *method, Value::Method { parameters: Vec::new() });
        }
        obj
    }

    fn global_object(&mut self) -> ObjectRef {
        let global = self.owner.new_object("Global", ObjectKind::Global);
        for name in GLOBAL_CONSTRUCTORS {
            let obj = self.owner.new_object(*name, ObjectKind::Plain);
            self.owner.set_member(global, *name, Value::Object(obj));
        }
        for name in GLOBAL_FUNCTIONS {
            self.owner.set_member(global, *name, Value::Method { parameters: Vec::new() });
        }
        self.owner.set_member(global, "undefined", Value::Undefined);
        self.owner.set_member(global, "NaN", Value::Number);
        self.owner.set_member(global, "Infinity", Value::Number);

        let qt = self.methods_object("Qt", QT_METHODS);
        self.owner.set_member(qt, "application", Value::Unknown);
        self.owner.set_member(qt, "platform", Value::Unknown);
        self.owner.set_member(global, "Qt", Value::Object(qt));
        let console = self.methods_object("console", CONSOLE_METHODS);
        self.owner.set_member(global, "console", Value::Object(console));
        global
    }

    fn context_properties(&mut self) -> Option<ObjectRef> {
        let env = self.env;
        let mut properties = env.context_properties().peekable();
        properties.peek()?;
        let obj = self
            .owner
            .new_object("<contextProperties>", ObjectKind::ContextProperties);
        for (name, cpp_type) in properties {
            let value = self
                .cpp
                .object_by_cpp_name(cpp_type)
                .map_or(Value::Unknown, Value::Object);
            self.owner.set_member(obj, name.clone(), value);
        }
        Some(obj)
    }

    // ========================================================================
    // PER DOCUMENT
    // ========================================================================

    fn link_imports(&mut self, doc: &Document) -> Imports {
        let mut imports = Imports::new();
        self.importable_module_apis.clear();

        if doc.is_qml_document() {
            self.resolve(doc, ImportInfo::implicit_directory(doc.path()), &mut imports);
            for qrc_path in self.env.qrc().qrc_paths_for_file(doc.file_name()) {
                self.resolve(doc, ImportInfo::qrc_directory(directory_of(&qrc_path)), &mut imports);
            }
        }
        self.load_default_imports(&mut imports);
        for info in doc.bind().imports() {
            self.resolve(doc, info.clone(), &mut imports);
        }
        imports
    }

    fn load_default_imports(&mut self, imports: &mut Imports) {
        if !self.cpp.has_module(DEFAULT_PACKAGE) {
            return;
        }
        let info = ImportInfo::module(
            DEFAULT_PACKAGE,
            ComponentVersion::max(),
            "",
            SourceLocation::default(),
            None,
        );
        let key = ImportCacheKey::new(&info);
        if let Some(cached) = self.cache.get(&key) {
            imports.append(cached.clone());
            return;
        }
        let obj = self.owner.new_object("<defaults>", ObjectKind::Import);
        for (name, component) in self
            .cpp
            .create_objects_for_import(DEFAULT_PACKAGE, ComponentVersion::max())
        {
            self.owner.set_member(obj, name, Value::Object(component));
        }
        let mut import = Import::new(info);
        import.object = Some(obj);
        import.valid = true;
        self.cache.insert(key, import.clone());
        imports.append(import);
    }

    /// Resolve one import, through the cache, and add it to `imports`.
    fn resolve(&mut self, doc: &Document, info: ImportInfo, imports: &mut Imports) {
        let key = ImportCacheKey::new(&info);
        let import = match self.cache.get(&key) {
            Some(cached) => {
                trace!(document = doc.file_name(), import = %info.name, "import cache hit");
                let mut import = cached.clone();
                import.info = info;
                import
            }
            None => {
                let mut import = Import::new(info);
                match import.info.ty {
                    ImportType::File
                    | ImportType::Directory
                    | ImportType::ImplicitDirectory
                    | ImportType::QrcFile
                    | ImportType::QrcDirectory => self.import_file_or_directory(doc, &mut import),
                    ImportType::Library => self.import_non_file(doc, &mut import, imports),
                    ImportType::UnknownFile => {
                        imports.set_import_failed();
                        self.diagnostics.import_not_found(
                            doc.file_name(),
                            import.info.location,
                            "File or directory not found.",
                        );
                    }
                    ImportType::Invalid => {}
                }
                if import.valid && import.object.is_some() {
                    self.cache.insert(key, import.clone());
                }
                import
            }
        };
        if import.object.is_some() {
            imports.append(import);
        }
    }

    fn import_file_or_directory(&mut self, doc: &Document, import: &mut Import) {
        let snapshot = self.snapshot;
        let path = import.info.path.clone();
        import.valid = true;
        match import.info.ty {
            ImportType::Directory | ImportType::ImplicitDirectory => {
                let obj = self.owner.new_object("", ObjectKind::Import);
                import.object = Some(obj);
                let target = LibraryTarget {
                    object: obj,
                    package: &path,
                    version: effective_version(import.info.version),
                    is_module: false,
                };
                self.import_library(doc, &path, import, target, "", &mut Vec::new());
                for imported in snapshot.documents_in_directory(&path) {
                    if imported.component_name().is_empty() {
                        continue;
                    }
                    if let Some(root) = imported.bind().root_object() {
                        self.owner
                            .set_member(obj, imported.component_name(), Value::Object(root));
                    }
                }
            }
            ImportType::File => {
                import.object = snapshot
                    .document(&path)
                    .and_then(|imported| imported.bind().root_object());
            }
            ImportType::QrcFile => {
                let files = self.env.qrc().files_at_qrc_path(&path);
                import.object = files
                    .first()
                    .and_then(|file| snapshot.document(file))
                    .and_then(|imported| imported.bind().root_object());
            }
            ImportType::QrcDirectory => {
                let obj = self.owner.new_object("", ObjectKind::Import);
                import.object = Some(obj);
                let target = LibraryTarget {
                    object: obj,
                    package: &path,
                    version: effective_version(import.info.version),
                    is_module: false,
                };
                self.import_library(doc, &path, import, target, "", &mut Vec::new());
                for (entry, files) in self.env.qrc().files_in_qrc_path(&path) {
                    if !Dialect::from_file_name(&entry).is_qml_like() {
                        continue;
                    }
                    let root = files
                        .first()
                        .and_then(|file| snapshot.document(file))
                        .and_then(|imported| imported.bind().root_object());
                    if let Some(root) = root {
                        let name = entry.split('.').next().unwrap_or_default();
                        self.owner.set_member(obj, name, Value::Object(root));
                    }
                }
            }
            _ => {}
        }
    }

    /// The library directory the dependency index offers for a library
    /// import no import path contains.
    fn library_from_dependencies(&self, info: &ImportInfo) -> Option<SmolStr> {
        let snapshot = self.snapshot;
        snapshot
            .dependencies()
            .candidate_imports(&info.key(), self.vctx)
            .into_values()
            .flatten()
            .filter(|m| {
                snapshot
                    .library_info(&m.core_import_id)
                    .is_some_and(|lib| lib.is_valid())
            })
            .min_by(|a, b| a.compare(b))
            .map(|m| m.core_import_id)
    }

    fn import_non_file(&mut self, doc: &Document, import: &mut Import, imports: &mut Imports) {
        let snapshot = self.snapshot;
        let vctx = self.vctx;
        let info = import.info.clone();
        let obj = self.owner.new_object(info.name.clone(), ObjectKind::Import);
        import.object = Some(obj);
        import.valid = true;

        let version = effective_version(info.version);
        let target = LibraryTarget {
            object: obj,
            package: &info.name,
            version,
            is_module: true,
        };
        let mut visiting = Vec::new();
        let mut found = false;
        for (import_path, library_path) in library_candidates(&info.name, info.version, &vctx.paths) {
            if self.import_library(doc, &library_path, import, target, &import_path, &mut visiting) {
                found = true;
                break;
            }
        }
        if !found {
            if let Some(library_path) = self.library_from_dependencies(&info) {
                found = self.import_library(doc, &library_path, import, target, &library_path, &mut visiting);
            }
        }
        if !found {
            for dir in &vctx.application_directories {
                let has_type_infos = snapshot
                    .library_info(dir)
                    .is_some_and(|lib| !lib.type_infos.is_empty());
                if has_type_infos && self.import_library(doc, dir, import, target, dir, &mut visiting) {
                    found = true;
                }
            }
        }

        if self.cpp.has_module(&info.name) {
            found = true;
            for (name, component) in self.cpp.create_objects_for_import(&info.name, version) {
                self.owner.set_member(obj, name, Value::Object(component));
            }
        }
        let module_api = self
            .importable_module_apis
            .get(&info.name)
            .and_then(|apis| best_module_api(apis, version))
            .and_then(|api| self.cpp.object_by_cpp_name(&api.cpp_name));
        if let Some(api_object) = module_api {
            self.owner.set_prototype(obj, Prototype::Object(api_object));
        }

        if !found {
            import.valid = false;
            imports.set_import_failed();
            let paths: Vec<&str> = vctx.paths.iter().map(SmolStr::as_str).collect();
            self.diagnostics.import_not_found(
                doc.file_name(),
                info.location,
                format!(
                    "QML module not found ({}).\n\nImport paths:\n{}",
                    info.name,
                    paths.join("\n")
                ),
            );
        }
    }

    /// Make the library at `library_path` available through `target`.
    /// Returns false when the snapshot holds no valid library there.
    fn import_library(
        &mut self,
        doc: &Document,
        library_path: &str,
        import: &mut Import,
        target: LibraryTarget<'_>,
        import_path: &str,
        visiting: &mut Vec<SmolStr>,
    ) -> bool {
        let snapshot = self.snapshot;
        let vctx = self.vctx;
        let library_path = clean_path(library_path);
        let Some(library) = snapshot.library_info(&library_path).filter(|lib| lib.is_valid()) else {
            return false;
        };
        if visiting.iter().any(|p| p == &library_path) {
            return true;
        }
        visiting.push(SmolStr::new(&library_path));

        for to_import in &library.imports {
            if to_import.flags.auto && to_import.module.starts_with("QtQuick3D") {
                trace!(module = %to_import.module, "skipping automatic import");
                continue;
            }
            let requested = if to_import.flags.auto { target.version } else { to_import.version };
            let sub_target = LibraryTarget {
                package: &to_import.module,
                version: effective_version(requested),
                is_module: true,
                ..target
            };
            let mut found = false;
            for (sub_import_path, sub_library) in library_candidates(&to_import.module, requested, &vctx.paths) {
                if self.import_library(doc, &sub_library, import, sub_target, &sub_import_path, visiting) {
                    found = true;
                    break;
                }
            }
            if !found && !to_import.flags.optional {
                import.valid = false;
                let paths: Vec<String> = vctx.paths.iter().map(SmolStr::to_string).collect();
                self.diagnostics.implicit_import_missing(
                    doc.file_name(),
                    import.info.location,
                    &to_import.module,
                    &import.info.name,
                    &paths,
                );
            }
        }
        import.library_path = SmolStr::new(&library_path);

        if library.has_plugins() {
            match library.plugin_type_info_status {
                PluginTypeInfoStatus::NoTypeInfo => {
                    self.request_dump(&library_path, import_path, target);
                    if import.info.location.is_valid() {
                        import.valid = false;
                        self.diagnostics
                            .reading_type_info(doc.file_name(), import.info.location, &library_path);
                    }
                }
                status if status.is_error() => {
                    let suppressed = self.cpp.has_module(target.package)
                        || target.package.to_lowercase().ends_with("private");
                    if !suppressed && import.info.location.is_valid() {
                        self.diagnostics.type_info_failed(
                            doc.file_name(),
                            import.info.location,
                            &library.plugin_type_info_error,
                        );
                    }
                }
                _ => {}
            }

            if !library.meta_objects.is_empty() {
                let origin = format!("{library_path}#{}", target.package);
                self.cpp
                    .load(&mut self.owner, &origin, &library.meta_objects, Some(target.package));
                for (name, component) in self.cpp.create_objects_for_import(target.package, target.version) {
                    self.owner.set_member(target.object, name, Value::Object(component));
                }
            }

            let mut no_uri_apis = Vec::new();
            for api in &library.module_apis {
                if api.uri.is_empty() {
                    no_uri_apis.push(api.clone());
                } else {
                    self.importable_module_apis
                        .entry(api.uri.clone())
                        .or_default()
                        .push(api.clone());
                }
            }
            let same_uri_api = best_module_api(&no_uri_apis, target.version)
                .and_then(|api| self.cpp.object_by_cpp_name(&api.cpp_name));
            if let Some(api_object) = same_uri_api {
                self.owner.set_prototype(target.object, Prototype::Object(api_object));
            }
        }

        self.load_qmldir_components(target, &library, &library_path);
        true
    }

    fn request_dump(&mut self, library_path: &str, import_path: &str, target: LibraryTarget<'_>) {
        if !self.requested_dumps.insert(SmolStr::new(library_path)) {
            return;
        }
        let Some(dumper) = self.env.dumper() else {
            return;
        };
        debug!(library = library_path, "requesting plugin type dump");
        if target.is_module && !target.version.is_max() {
            dumper.load_plugin_types(library_path, import_path, target.package, target.version);
        } else {
            dumper.load_plugin_types(library_path, library_path, "", ComponentVersion::none());
        }
    }

    fn load_qmldir_components(&mut self, target: LibraryTarget<'_>, library: &LibraryInfo, library_path: &str) {
        let snapshot = self.snapshot;
        let mut imported: FxHashSet<&SmolStr> = FxHashSet::default();
        for component in &library.components {
            if component.internal || imported.contains(&component.type_name) {
                continue;
            }
            if component.version.is_valid() && !component.version.is_visible_at(target.version) {
                continue;
            }
            imported.insert(&component.type_name);
            let root = snapshot
                .document(&join_path(library_path, &component.file_name))
                .and_then(|doc| doc.bind().root_object());
            if let Some(root) = root {
                self.owner
                    .set_member(target.object, component.type_name.clone(), Value::Object(root));
            }
        }
    }
}
