//! Import declarations and their resolutions.
//!
//! [`ImportInfo`] is what the binder reads off an import statement;
//! [`Import`] is what linking made of it; [`Imports`] is the ordered
//! per-document table that type lookups walk.

use smol_str::SmolStr;

use super::context::{Context, Resolving};
use super::environment::{Environment, PathKind, join_path};
use super::ids::ObjectRef;
use super::value::Value;
use crate::base::SourceLocation;
use crate::imports::{ComponentVersion, ImportKey, ImportType};
use crate::syntax::NodeId;

// ============================================================================
// IMPORT INFO
// ============================================================================

/// An import as declared, before resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportInfo {
    pub ty: ImportType,
    /// The URI (`QtQuick.Controls`) or the path as written.
    pub name: SmolStr,
    /// The URI with `/` separators, or the resolved absolute path.
    pub path: SmolStr,
    pub version: ComponentVersion,
    /// Alias from an `as` clause; empty when absent.
    pub as_name: SmolStr,
    pub location: SourceLocation,
    pub node: Option<NodeId>,
}

impl ImportInfo {
    pub fn module(
        uri: &str,
        version: ComponentVersion,
        as_name: &str,
        location: SourceLocation,
        node: Option<NodeId>,
    ) -> Self {
        Self {
            ty: ImportType::Library,
            name: SmolStr::new(uri),
            path: SmolStr::new(uri.replace('.', "/")),
            version,
            as_name: SmolStr::new(as_name),
            location,
            node,
        }
    }

    /// A quoted path import, classified by what `path` points at when
    /// resolved against `doc_dir`.
    pub fn path(
        doc_dir: &str,
        path: &str,
        version: ComponentVersion,
        as_name: &str,
        location: SourceLocation,
        node: Option<NodeId>,
        env: &Environment,
    ) -> Self {
        let resolved = join_path(doc_dir, path);
        let (ty, resolved) = match env.probe(&resolved) {
            PathKind::File => (ImportType::File, resolved),
            PathKind::Directory => (ImportType::Directory, resolved),
            PathKind::Missing => match path.strip_prefix("qrc:") {
                Some(qrc) => {
                    let qrc_path = join_path("/", qrc);
                    if env.qrc().files_at_qrc_path(&qrc_path).is_empty() {
                        (ImportType::QrcDirectory, qrc_path)
                    } else {
                        (ImportType::QrcFile, qrc_path)
                    }
                }
                None => (ImportType::UnknownFile, resolved),
            },
        };
        Self {
            ty,
            name: SmolStr::new(path),
            path: SmolStr::new(resolved),
            version,
            as_name: SmolStr::new(as_name),
            location,
            node,
        }
    }

    /// An import statement carrying neither a URI nor a path.
    pub fn invalid(location: SourceLocation, node: Option<NodeId>) -> Self {
        Self {
            ty: ImportType::Invalid,
            name: SmolStr::default(),
            path: SmolStr::default(),
            version: ComponentVersion::none(),
            as_name: SmolStr::default(),
            location,
            node,
        }
    }

    /// The document's own directory, visible without an import statement.
    pub fn implicit_directory(directory: &str) -> Self {
        Self {
            ty: ImportType::ImplicitDirectory,
            name: SmolStr::new(directory),
            path: SmolStr::new(directory),
            version: ComponentVersion::none(),
            as_name: SmolStr::default(),
            location: SourceLocation::default(),
            node: None,
        }
    }

    /// A Qt resource directory a document is packaged in.
    pub fn qrc_directory(directory: &str) -> Self {
        Self {
            ty: ImportType::QrcDirectory,
            ..Self::implicit_directory(directory)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.ty != ImportType::Invalid
    }

    pub fn has_alias(&self) -> bool {
        !self.as_name.is_empty()
    }

    /// The dependency-index key this import asks for.
    pub fn key(&self) -> ImportKey {
        let path = match self.ty {
            ImportType::Library => self.name.as_str(),
            _ => self.path.as_str(),
        };
        ImportKey::with_version(self.ty, path, self.version)
    }
}

// ============================================================================
// RESOLVED IMPORTS
// ============================================================================

/// An import after linking.
#[derive(Clone, Debug, PartialEq)]
pub struct Import {
    pub info: ImportInfo,
    /// Namespace object holding the types this import provides.
    pub object: Option<ObjectRef>,
    /// Directory of the library providing the import, if any.
    pub library_path: SmolStr,
    /// Whether resolution is complete. An invalid import may become valid
    /// in a later snapshot (type information still being produced).
    pub valid: bool,
}

impl Import {
    pub fn new(info: ImportInfo) -> Self {
        Self {
            info,
            object: None,
            library_path: SmolStr::default(),
            valid: false,
        }
    }
}

/// The resolved imports of one document, in lookup order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Imports {
    imports: Vec<Import>,
    import_failed: bool,
}

impl Imports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an import, keeping the lookup order: imports without an alias in
    /// declaration order, then aliased imports. Within each group a
    /// `QtQuick` library import comes first.
    pub fn append(&mut self, import: Import) {
        let aliased = import.info.has_alias();
        let group_start = if aliased {
            self.imports
                .iter()
                .position(|i| i.info.has_alias())
                .unwrap_or(self.imports.len())
        } else {
            0
        };
        let at = if import.info.ty == ImportType::Library && import.info.name == "QtQuick" {
            group_start
        } else if aliased {
            self.imports.len()
        } else {
            self.imports
                .iter()
                .position(|i| i.info.has_alias())
                .unwrap_or(self.imports.len())
        };
        self.imports.insert(at, import);
    }

    pub fn set_import_failed(&mut self) {
        self.import_failed = true;
    }

    pub fn import_failed(&self) -> bool {
        self.import_failed
    }

    pub fn all(&self) -> &[Import] {
        &self.imports
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }

    /// The import providing `name` as a type, if any, and what it resolves to.
    ///
    /// Later imports take precedence over earlier ones. File imports do not
    /// contribute types.
    pub fn type_scope_lookup(&self, name: &str, ctx: &Context) -> Option<(Value, &Import)> {
        self.type_scope_lookup_in(name, ctx, &mut Resolving::default())
    }

    pub(crate) fn type_scope_lookup_in(
        &self,
        name: &str,
        ctx: &Context,
        resolving: &mut Resolving,
    ) -> Option<(Value, &Import)> {
        for import in self.imports.iter().rev() {
            if import.info.ty.is_file() {
                continue;
            }
            let Some(object) = import.object else {
                continue;
            };
            if import.info.has_alias() {
                if import.info.as_name == name {
                    return Some((Value::Object(object), import));
                }
                continue;
            }
            if let Some((value, _)) = ctx.lookup_member_in(object, name, resolving) {
                return Some((value, import));
            }
        }
        None
    }

    /// The JavaScript file imported as `name`.
    pub fn js_import_lookup(&self, name: &str) -> Option<(Value, &Import)> {
        self.imports.iter().rev().find_map(|import| {
            let object = import.object?;
            (import.info.ty.is_file() && import.info.as_name == name)
                .then_some((Value::Object(object), import))
        })
    }

    /// The first import whose namespace object is `object`.
    pub fn info_for_object(&self, object: ObjectRef) -> Option<&ImportInfo> {
        self.imports
            .iter()
            .find(|i| i.object == Some(object))
            .map(|i| &i.info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::environment::MemoryProbe;

    fn module(uri: &str, alias: &str) -> Import {
        let mut import = Import::new(ImportInfo::module(
            uri,
            ComponentVersion::new(2, 0),
            alias,
            SourceLocation::default(),
            None,
        ));
        import.valid = true;
        import
    }

    #[test]
    fn test_append_order() {
        let mut imports = Imports::new();
        imports.append(module("Charts", ""));
        imports.append(module("Controls", "C"));
        imports.append(module("Layouts", ""));
        imports.append(module("QtQuick", ""));
        let names: Vec<&str> = imports.all().iter().map(|i| i.info.name.as_str()).collect();
        assert_eq!(names, vec!["QtQuick", "Charts", "Layouts", "Controls"]);
        assert!(!imports.import_failed());
    }

    #[test]
    fn test_aliased_qtquick_leads_aliased_imports() {
        let mut imports = Imports::new();
        imports.append(module("Charts", ""));
        imports.append(module("Controls", "C"));
        imports.append(module("QtQuick", "QQ"));
        imports.append(module("Layouts", ""));
        let order: Vec<(&str, &str)> = imports
            .all()
            .iter()
            .map(|i| (i.info.name.as_str(), i.info.as_name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("Charts", ""), ("Layouts", ""), ("QtQuick", "QQ"), ("Controls", "C")]
        );
    }

    #[test]
    fn test_path_import_classification() {
        let env = Environment::new().with_probe(
            MemoryProbe::new()
                .with_file("/app/qml/Button.qml")
                .with_file("/app/js/util.js"),
        );
        let loc = SourceLocation::default();
        let none = ComponentVersion::none();

        let file = ImportInfo::path("/app/qml", "../js/util.js", none, "Util", loc, None, &env);
        assert_eq!(file.ty, ImportType::File);
        assert_eq!(file.path, "/app/js/util.js");
        assert_eq!(file.name, "../js/util.js");

        let dir = ImportInfo::path("/app", "qml", none, "", loc, None, &env);
        assert_eq!(dir.ty, ImportType::Directory);

        let missing = ImportInfo::path("/app", "nowhere", none, "", loc, None, &env);
        assert_eq!(missing.ty, ImportType::UnknownFile);

        let qrc = ImportInfo::path("/app", "qrc:/ui", none, "", loc, None, &env);
        assert_eq!(qrc.ty, ImportType::QrcDirectory);
        assert_eq!(qrc.path, "/ui");
    }

    #[test]
    fn test_module_key() {
        let info = ImportInfo::module(
            "QtQuick.Controls",
            ComponentVersion::new(2, 15),
            "",
            SourceLocation::default(),
            None,
        );
        assert_eq!(info.path, "QtQuick/Controls");
        let key = info.key();
        assert_eq!(key.ty, ImportType::Library);
        assert_eq!(key.split_path, vec!["QtQuick", "Controls"]);
        assert_eq!(key.version(), ComponentVersion::new(2, 15));
    }
}
