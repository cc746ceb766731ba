//! Snapshots: a consistent set of documents and libraries.
//!
//! Cloning a [`Snapshot`] is O(1): every table sits behind an `Arc` and is
//! copied on the first write, so mutating one snapshot never changes a
//! clone taken earlier.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use smol_str::SmolStr;
use tracing::{debug, trace};

use super::document::Document;
use super::environment::{Environment, clean_path, join_path};
use super::library::LibraryInfo;
use crate::base::Dialect;
use crate::imports::{ComponentVersion, CoreImport, Export, ImportDependencies, ImportKey, ImportType};
use crate::syntax::Parser;

/// `Name.2` or `Name.2.15` at the end of a library directory.
static VERSIONED_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\.([0-9]+)(?:\.([0-9]+))?$").expect("valid regex"));

static SAFE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid regex"));

#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    documents: Arc<BTreeMap<SmolStr, Arc<Document>>>,
    documents_by_path: Arc<BTreeMap<SmolStr, Vec<Arc<Document>>>>,
    libraries: Arc<BTreeMap<SmolStr, Arc<LibraryInfo>>>,
    dependencies: Arc<ImportDependencies>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    // ------------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------------

    /// Add or replace a document.
    ///
    /// Documents without a syntax tree are skipped unless `allow_invalid`.
    pub fn insert(&mut self, document: Arc<Document>, allow_invalid: bool) {
        if !allow_invalid && document.program().is_none() {
            return;
        }
        let file_name = SmolStr::new(document.file_name());
        self.remove(&file_name);

        Arc::make_mut(&mut self.documents_by_path)
            .entry(SmolStr::new(document.path()))
            .or_default()
            .push(document.clone());

        let export = Export::new(
            ImportKey::unversioned(ImportType::File, &file_name),
            "",
            document.component_name(),
            true,
        );
        let core = CoreImport::new(
            document.import_id(),
            document.language(),
            document.fingerprint().to_vec(),
        )
        .with_export(export);
        Arc::make_mut(&mut self.dependencies).add_core_import(core);
        Arc::make_mut(&mut self.documents).insert(file_name, document);
    }

    pub fn remove(&mut self, file_name: &str) {
        let Some(document) = Arc::make_mut(&mut self.documents).remove(file_name) else {
            return;
        };
        let by_path = Arc::make_mut(&mut self.documents_by_path);
        if let Some(docs) = by_path.get_mut(document.path()) {
            docs.retain(|d| !Arc::ptr_eq(d, &document));
            if docs.is_empty() {
                by_path.remove(document.path());
            }
        }
        Arc::make_mut(&mut self.dependencies).remove_core_import(document.import_id());
    }

    pub fn document(&self, file_name: &str) -> Option<&Arc<Document>> {
        self.documents.get(file_name)
    }

    /// Documents located directly in `path`.
    pub fn documents_in_directory(&self, path: &str) -> &[Arc<Document>] {
        self.documents_by_path
            .get(clean_path(path).as_str())
            .map(|docs| docs.as_slice())
            .unwrap_or(&[])
    }

    /// Documents in file-name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.documents.values()
    }

    /// Parse `source` as a replacement for `file_name`, carrying over the
    /// editor revision of the document currently in the snapshot.
    pub fn document_from_source(
        &self,
        source: &str,
        file_name: &str,
        language: Dialect,
        parser: &dyn Parser,
        env: &Environment,
    ) -> Arc<Document> {
        let revision = self.document(file_name).map_or(0, |d| d.editor_revision());
        Document::parse(file_name, source, language, revision, parser, env)
    }

    // ------------------------------------------------------------------------
    // Libraries
    // ------------------------------------------------------------------------

    pub fn library_info(&self, path: &str) -> Option<&Arc<LibraryInfo>> {
        self.libraries.get(clean_path(path).as_str())
    }

    pub fn libraries(&self) -> impl Iterator<Item = (&SmolStr, &Arc<LibraryInfo>)> {
        self.libraries.iter()
    }

    /// Record a library and register every name it can be imported under.
    ///
    /// `info`'s fingerprint must be current.
    pub fn insert_library_info(&mut self, path: &str, info: LibraryInfo) {
        debug_assert!(
            info.fingerprint() == info.calculate_fingerprint().as_slice(),
            "library info for {path} has a stale fingerprint"
        );
        let path = clean_path(path);
        self.unregister_library(&path);
        let info = Arc::new(info);
        Arc::make_mut(&mut self.libraries).insert(SmolStr::new(&path), info.clone());
        if !info.is_valid() {
            return;
        }

        let exports = library_exports(&path, &info);
        let deps = Arc::make_mut(&mut self.dependencies);
        for component in &info.components {
            let file = join_path(&path, &component.file_name);
            for export in &exports {
                deps.add_export(&file, export.export_name.clone(), &export.path_required, &component.type_name);
            }
        }
        debug!(library = %path, exports = exports.len(), "library exports derived");
        let mut core = CoreImport::new(path.as_str(), Dialect::AnyLanguage, info.fingerprint().to_vec());
        core.possible_exports.extend(exports);
        deps.add_core_import(core);
    }

    pub fn remove_library_info(&mut self, path: &str) {
        let path = clean_path(path);
        if self.unregister_library(&path) {
            Arc::make_mut(&mut self.libraries).remove(path.as_str());
        }
    }

    /// Drop everything the library at `path` registered in the dependency
    /// index. Returns whether a library was recorded there.
    fn unregister_library(&mut self, path: &str) -> bool {
        let Some(previous) = self.libraries.get(path).cloned() else {
            return false;
        };
        if !previous.is_valid() {
            return true;
        }
        let exports = library_exports(path, &previous);
        let deps = Arc::make_mut(&mut self.dependencies);
        let mut removed = BTreeSet::new();
        for component in &previous.components {
            let file = join_path(path, &component.file_name);
            for export in &exports {
                let entry = (file.clone(), export.export_name.clone(), component.type_name.clone());
                if removed.insert(entry) {
                    deps.remove_export(&file, export.export_name.clone(), &export.path_required, &component.type_name);
                }
            }
        }
        deps.remove_core_import(path);
        trace!(library = %path, "library exports removed");
        true
    }

    pub fn dependencies(&self) -> &ImportDependencies {
        &self.dependencies
    }
}

/// Every library export the library at `path` offers: explicit packages of
/// its module APIs and meta objects, or names derived from the path.
fn library_exports(path: &str, info: &LibraryInfo) -> Vec<Export> {
    let split_path: Vec<&str> = path.split('/').collect();
    let mut packages: BTreeSet<(SmolStr, ComponentVersion)> = BTreeSet::new();
    for api in &info.module_apis {
        packages.insert((api.uri.clone(), api.version));
    }
    for meta in &info.meta_objects {
        for export in &meta.exports {
            packages.insert((export.package.clone(), export.version));
        }
    }

    let mut exports: Vec<Export> = Vec::new();
    for (package, version) in &packages {
        if package.is_empty() {
            let mut names: Vec<&str> = split_path.clone();
            let stripped = names
                .last()
                .copied()
                .and_then(|last| VERSIONED_DIR.captures(last))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str());
            if let (Some(stripped), Some(last)) = (stripped, names.last_mut()) {
                *last = stripped;
            }
            relocatable_exports(&names, *version, &mut exports);
        } else {
            let segments = package.split('.').count();
            let keep = split_path.len().saturating_sub(segments);
            let required = split_path[..keep].join("/");
            let key = ImportKey::with_version(ImportType::Library, package, *version);
            exports.push(Export::new(key, required, "", true));
        }
    }

    if exports.is_empty() && !split_path.is_empty() {
        let mut version = info
            .components
            .iter()
            .fold(ComponentVersion::none(), |acc, c| {
                ComponentVersion::new(acc.major.max(c.version.major), acc.minor.max(c.version.minor))
            });
        let mut names: Vec<&str> = split_path.clone();
        if let Some(caps) = names.last().copied().and_then(|last| VERSIONED_DIR.captures(last)) {
            let major = caps[2].parse().unwrap_or(ComponentVersion::NO_VERSION);
            let minor = caps
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(ComponentVersion::NO_VERSION);
            version = ComponentVersion::new(major, minor);
            if let (Some(name), Some(last)) = (caps.get(1), names.last_mut()) {
                *last = name.as_str();
            }
        }
        relocatable_exports(&names, version, &mut exports);
    }
    exports
}

/// Library exports for every dotted suffix of `names` made of plain
/// identifiers, longest suffix last. The remaining prefix is the import
/// path the viewer must have for the export to apply.
fn relocatable_exports(names: &[&str], version: ComponentVersion, out: &mut Vec<Export>) {
    for i in (1..names.len()).rev() {
        if !SAFE_NAME.is_match(names[i]) {
            break;
        }
        let uri = names[i..].join(".");
        let required = if i == 1 {
            "/".to_string()
        } else {
            names[..i].join("/")
        };
        let key = ImportKey::with_version(ImportType::Library, &uri, version);
        out.push(Export::new(key, required, "", true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::library::{FakeMetaObject, QmldirComponent};
    use crate::imports::ViewerContext;
    use crate::syntax::{AstBuilder, ParseOutput, StaticParser};

    fn qml_doc(file_name: &str) -> Arc<Document> {
        let b = AstBuilder::new();
        let parser = StaticParser::new().with(file_name, ParseOutput::success(b.ui_program(vec![], b.object("Item", vec![]))));
        Document::parse(file_name, "Item {}", Dialect::Qml, 0, &parser, &Environment::new())
    }

    fn charts_library() -> LibraryInfo {
        let mut info = LibraryInfo::found();
        info.components.push(QmldirComponent::new("Bar", "Bar.qml", ComponentVersion::new(2, 0)));
        info.components.push(QmldirComponent::new("Pie", "Pie.qml", ComponentVersion::new(1, 3)));
        info.update_fingerprint();
        info
    }

    #[test]
    fn test_copy_is_isolated() {
        let mut a = Snapshot::new();
        a.insert(qml_doc("/app/Main.qml"), false);
        let b = a.clone();
        a.insert(qml_doc("/app/Other.qml"), false);
        a.remove("/app/Main.qml");
        assert_eq!(b.len(), 1);
        assert!(b.document("/app/Main.qml").is_some());
        assert!(b.document("/app/Other.qml").is_none());
        assert_eq!(a.len(), 1);
        assert!(b.dependencies().core_import("/app/Main.qml").is_some());
        assert!(a.dependencies().core_import("/app/Main.qml").is_none());
    }

    #[test]
    fn test_insert_registers_file_export() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(qml_doc("/app/Main.qml"), false);
        let core = snapshot.dependencies().core_import("/app/Main.qml").unwrap();
        let export = core.possible_exports.iter().next().unwrap();
        assert_eq!(export.export_name.ty, ImportType::File);
        assert!(export.intrinsic);
        assert_eq!(snapshot.documents_in_directory("/app").len(), 1);
        assert!(snapshot.dependencies().check_consistency().is_ok());
    }

    #[test]
    fn test_invalid_documents_need_permission() {
        let parser = StaticParser::new();
        let doc = Document::parse("/app/Broken.qml", "Item {", Dialect::Qml, 0, &parser, &Environment::new());
        let mut snapshot = Snapshot::new();
        snapshot.insert(doc.clone(), false);
        assert!(snapshot.is_empty());
        snapshot.insert(doc, true);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_document_from_source_keeps_revision() {
        let b = AstBuilder::new();
        let parser = StaticParser::new().with("/app/Main.qml", ParseOutput::success(b.ui_program(vec![], b.object("Item", vec![]))));
        let env = Environment::new();
        let mut snapshot = Snapshot::new();
        snapshot.insert(Document::parse("/app/Main.qml", "Item {}", Dialect::Qml, 7, &parser, &env), false);
        let doc = snapshot.document_from_source("Item { }", "/app/Main.qml", Dialect::Qml, &parser, &env);
        assert_eq!(doc.editor_revision(), 7);
        assert_eq!(doc.source(), "Item { }");
    }

    #[test]
    fn test_relocatable_library_exports() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_library_info("/usr/qml/Charts.2.0", charts_library());

        let core = snapshot.dependencies().core_import("/usr/qml/Charts.2.0").unwrap();
        let keys: Vec<(String, String)> = core
            .possible_exports
            .iter()
            .map(|e| (e.export_name.path(), e.path_required.to_string()))
            .collect();
        assert!(keys.contains(&("Charts".to_string(), "/usr/qml".to_string())));
        assert!(keys.contains(&("qml.Charts".to_string(), "/usr".to_string())));
        assert!(keys.contains(&("usr.qml.Charts".to_string(), "/".to_string())));
        for export in &core.possible_exports {
            assert_eq!(export.export_name.version(), ComponentVersion::new(2, 0));
        }

        let vctx = ViewerContext::new().with_paths(["/usr/qml"]);
        let request = ImportKey::with_version(ImportType::Library, "Charts", ComponentVersion::new(2, 0));
        let candidates = snapshot.dependencies().candidate_imports(&request, &vctx);
        let ids: BTreeSet<&str> = candidates
            .values()
            .flatten()
            .map(|m| m.core_import_id.as_str())
            .collect();
        assert!(ids.contains("/usr/qml/Charts.2.0"));
        assert!(ids.contains("/usr/qml/Charts.2.0/Bar.qml"));
        assert!(snapshot.dependencies().check_consistency().is_ok());
    }

    fn charts_candidates(snapshot: &Snapshot) -> BTreeSet<String> {
        let vctx = ViewerContext::new().with_paths(["/usr/qml"]);
        let request = ImportKey::with_version(ImportType::Library, "Charts", ComponentVersion::new(2, 0));
        snapshot
            .dependencies()
            .candidate_imports(&request, &vctx)
            .values()
            .flatten()
            .map(|m| m.core_import_id.to_string())
            .collect()
    }

    #[test]
    fn test_remove_library_drops_component_exports() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_library_info("/usr/qml/Charts.2.0", charts_library());
        assert!(!charts_candidates(&snapshot).is_empty());

        snapshot.remove_library_info("/usr/qml/Charts.2.0");
        assert!(charts_candidates(&snapshot).is_empty());
        assert!(snapshot.library_info("/usr/qml/Charts.2.0").is_none());
        assert!(snapshot.dependencies().core_import("/usr/qml/Charts.2.0/Bar.qml").is_none());
        assert!(snapshot.dependencies().is_empty());
        assert!(snapshot.dependencies().check_consistency().is_ok());
    }

    #[test]
    fn test_reinserted_library_replaces_components() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_library_info("/usr/qml/Charts.2.0", charts_library());

        let mut changed = LibraryInfo::found();
        changed.components.push(QmldirComponent::new("Line", "Line.qml", ComponentVersion::new(2, 0)));
        changed.update_fingerprint();
        snapshot.insert_library_info("/usr/qml/Charts.2.0", changed);

        let ids = charts_candidates(&snapshot);
        assert!(ids.contains("/usr/qml/Charts.2.0"));
        assert!(ids.contains("/usr/qml/Charts.2.0/Line.qml"));
        assert!(!ids.contains("/usr/qml/Charts.2.0/Bar.qml"));
        assert!(!ids.contains("/usr/qml/Charts.2.0/Pie.qml"));
        assert!(snapshot.dependencies().check_consistency().is_ok());
    }

    #[test]
    fn test_unversioned_library_uses_component_versions() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_library_info("/usr/qml/Charts", charts_library());
        let core = snapshot.dependencies().core_import("/usr/qml/Charts").unwrap();
        let charts = core
            .possible_exports
            .iter()
            .find(|e| e.export_name.path() == "Charts")
            .unwrap();
        assert_eq!(charts.export_name.version(), ComponentVersion::new(2, 3));
    }

    #[test]
    fn test_unsafe_segment_stops_derivation() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_library_info("/opt/my-qml/Charts", charts_library());
        let core = snapshot.dependencies().core_import("/opt/my-qml/Charts").unwrap();
        let paths: Vec<String> = core.possible_exports.iter().map(|e| e.export_name.path()).collect();
        assert_eq!(paths, vec!["Charts".to_string()]);
    }

    #[test]
    fn test_package_exports_use_prefix_path() {
        let mut info = LibraryInfo::found();
        info.meta_objects.push(Arc::new(
            FakeMetaObject::new("QQuickChartView").with_export("QtCharts.Views", "ChartView", ComponentVersion::new(2, 1)),
        ));
        info.update_fingerprint();
        let mut snapshot = Snapshot::new();
        snapshot.insert_library_info("/usr/qml/QtCharts/Views", info);
        let core = snapshot.dependencies().core_import("/usr/qml/QtCharts/Views").unwrap();
        assert_eq!(core.possible_exports.len(), 1);
        let export = core.possible_exports.iter().next().unwrap();
        assert_eq!(export.export_name.path(), "QtCharts.Views");
        assert_eq!(export.path_required, "/usr/qml");
    }

    #[test]
    fn test_not_found_library_is_recorded_without_exports() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_library_info("/usr/qml/Missing", LibraryInfo::with_status(crate::hir::library::LibraryStatus::NotFound));
        assert!(snapshot.library_info("/usr/qml/Missing").is_some());
        assert!(snapshot.dependencies().core_import("/usr/qml/Missing").is_none());
    }
}
