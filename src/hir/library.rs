//! Library metadata.
//!
//! A [`LibraryInfo`] describes one scanned library directory: what its
//! qmldir file declares and which C++ types its plugins export. The
//! qmldir file itself is parsed elsewhere; this module only holds the
//! result and fingerprints it.

use std::sync::Arc;

use sha1::{Digest, Sha1};
use smol_str::SmolStr;

use crate::imports::ComponentVersion;

// ============================================================================
// FINGERPRINTING
// ============================================================================

/// Length-prefixed field hashing, so that adjacent fields cannot run into
/// each other.
struct FingerprintHasher(Sha1);

impl FingerprintHasher {
    fn new() -> Self {
        Self(Sha1::new())
    }

    fn str(&mut self, s: &str) {
        self.0.update((s.len() as u32).to_le_bytes());
        self.0.update(s.as_bytes());
    }

    fn bytes(&mut self, b: &[u8]) {
        self.0.update((b.len() as u32).to_le_bytes());
        self.0.update(b);
    }

    fn int(&mut self, i: i64) {
        self.0.update(i.to_le_bytes());
    }

    fn tag(&mut self, t: u8) {
        self.0.update([t]);
    }

    fn version(&mut self, v: ComponentVersion) {
        self.int(v.major as i64);
        self.int(v.minor as i64);
    }

    fn finish(self) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

// ============================================================================
// C++ META OBJECTS
// ============================================================================

/// A type name under which a C++ class is registered with QML.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FakeExport {
    /// Module URI; empty for the default package.
    pub package: SmolStr,
    pub type_name: SmolStr,
    pub version: ComponentVersion,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FakeProperty {
    pub name: SmolStr,
    pub type_name: SmolStr,
    pub read_only: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FakeMethod {
    pub name: SmolStr,
    pub parameters: Vec<SmolStr>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FakeEnum {
    pub name: SmolStr,
    pub keys: Vec<SmolStr>,
}

/// Description of a C++ class as exposed to QML.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FakeMetaObject {
    pub class_name: SmolStr,
    pub superclass: Option<SmolStr>,
    pub exports: Vec<FakeExport>,
    pub properties: Vec<FakeProperty>,
    pub methods: Vec<FakeMethod>,
    pub signals: Vec<FakeMethod>,
    pub enums: Vec<FakeEnum>,
    pub attached_type_name: Option<SmolStr>,
    pub default_property: Option<SmolStr>,
}

impl FakeMetaObject {
    pub fn new(class_name: impl Into<SmolStr>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Self::default()
        }
    }

    pub fn with_superclass(mut self, superclass: impl Into<SmolStr>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn with_export(mut self, package: &str, type_name: &str, version: ComponentVersion) -> Self {
        self.exports.push(FakeExport {
            package: SmolStr::new(package),
            type_name: SmolStr::new(type_name),
            version,
        });
        self
    }

    pub fn with_property(mut self, name: &str, type_name: &str) -> Self {
        self.properties.push(FakeProperty {
            name: SmolStr::new(name),
            type_name: SmolStr::new(type_name),
            read_only: false,
        });
        self
    }

    pub fn with_method(mut self, name: &str, parameters: &[&str]) -> Self {
        self.methods.push(FakeMethod {
            name: SmolStr::new(name),
            parameters: parameters.iter().map(|p| SmolStr::new(p)).collect(),
        });
        self
    }

    pub fn with_signal(mut self, name: &str, parameters: &[&str]) -> Self {
        self.signals.push(FakeMethod {
            name: SmolStr::new(name),
            parameters: parameters.iter().map(|p| SmolStr::new(p)).collect(),
        });
        self
    }

    pub fn with_enum(mut self, name: &str, keys: &[&str]) -> Self {
        self.enums.push(FakeEnum {
            name: SmolStr::new(name),
            keys: keys.iter().map(|k| SmolStr::new(k)).collect(),
        });
        self
    }

    pub fn fingerprint(&self) -> Vec<u8> {
        let mut h = FingerprintHasher::new();
        h.str(&self.class_name);
        h.str(self.superclass.as_deref().unwrap_or(""));
        h.int(self.exports.len() as i64);
        for e in &self.exports {
            h.str(&e.package);
            h.str(&e.type_name);
            h.version(e.version);
        }
        h.int(self.properties.len() as i64);
        for p in &self.properties {
            h.str(&p.name);
            h.str(&p.type_name);
            h.tag(p.read_only as u8);
        }
        for (tag, list) in [(b'M', &self.methods), (b'S', &self.signals)] {
            h.tag(tag);
            h.int(list.len() as i64);
            for m in list {
                h.str(&m.name);
                h.int(m.parameters.len() as i64);
                for p in &m.parameters {
                    h.str(p);
                }
            }
        }
        h.int(self.enums.len() as i64);
        for e in &self.enums {
            h.str(&e.name);
            h.int(e.keys.len() as i64);
            for k in &e.keys {
                h.str(k);
            }
        }
        h.str(self.attached_type_name.as_deref().unwrap_or(""));
        h.str(self.default_property.as_deref().unwrap_or(""));
        h.finish()
    }
}

// ============================================================================
// QMLDIR CONTENT
// ============================================================================

/// `TypeName 2.1 File.qml` in a qmldir file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QmldirComponent {
    pub type_name: SmolStr,
    pub file_name: SmolStr,
    pub version: ComponentVersion,
    pub singleton: bool,
    pub internal: bool,
}

impl QmldirComponent {
    pub fn new(type_name: &str, file_name: &str, version: ComponentVersion) -> Self {
        Self {
            type_name: SmolStr::new(type_name),
            file_name: SmolStr::new(file_name),
            version,
            singleton: false,
            internal: false,
        }
    }
}

/// `plugin name [path]` in a qmldir file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QmldirPlugin {
    pub name: SmolStr,
    pub path: SmolStr,
}

/// Flags of a qmldir `import` line.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImportFlags {
    /// `import X auto`: use the importing statement's version.
    pub auto: bool,
    /// `optional import X`.
    pub optional: bool,
}

/// `import Module [version]` in a qmldir file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QmldirImport {
    pub module: SmolStr,
    pub version: ComponentVersion,
    pub flags: ImportFlags,
}

impl QmldirImport {
    pub fn new(module: &str, version: ComponentVersion) -> Self {
        Self {
            module: SmolStr::new(module),
            version,
            flags: ImportFlags::default(),
        }
    }

    pub fn auto(mut self) -> Self {
        self.flags.auto = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.flags.optional = true;
        self
    }
}

/// A singleton registered from C++ for a module URI.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModuleApiInfo {
    pub uri: SmolStr,
    pub version: ComponentVersion,
    pub cpp_name: SmolStr,
}

// ============================================================================
// LIBRARY INFO
// ============================================================================

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LibraryStatus {
    #[default]
    NotScanned,
    NotFound,
    Found,
}

/// State of the C++ type information of a library's plugins.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PluginTypeInfoStatus {
    #[default]
    NoTypeInfo,
    DumpDone,
    DumpError,
    TypeInfoFileDone,
    TypeInfoFileError,
}

impl PluginTypeInfoStatus {
    fn tag(self) -> u8 {
        match self {
            PluginTypeInfoStatus::NoTypeInfo => 0,
            PluginTypeInfoStatus::DumpDone => 1,
            PluginTypeInfoStatus::DumpError => 2,
            PluginTypeInfoStatus::TypeInfoFileDone => 3,
            PluginTypeInfoStatus::TypeInfoFileError => 4,
        }
    }

    pub fn is_done(self) -> bool {
        matches!(
            self,
            PluginTypeInfoStatus::DumpDone | PluginTypeInfoStatus::TypeInfoFileDone
        )
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            PluginTypeInfoStatus::DumpError | PluginTypeInfoStatus::TypeInfoFileError
        )
    }
}

/// Metadata of one library directory.
///
/// Call [`update_fingerprint`](Self::update_fingerprint) after changing any
/// field; snapshots check the stored fingerprint on insertion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LibraryInfo {
    pub status: LibraryStatus,
    pub components: Vec<QmldirComponent>,
    pub plugins: Vec<QmldirPlugin>,
    pub type_infos: Vec<SmolStr>,
    pub meta_objects: Vec<Arc<FakeMetaObject>>,
    pub module_apis: Vec<ModuleApiInfo>,
    pub dependencies: Vec<SmolStr>,
    pub imports: Vec<QmldirImport>,
    pub plugin_type_info_status: PluginTypeInfoStatus,
    pub plugin_type_info_error: String,
    fingerprint: Vec<u8>,
}

impl LibraryInfo {
    /// A library whose directory exists, fingerprinted.
    pub fn found() -> Self {
        Self::with_status(LibraryStatus::Found)
    }

    pub fn with_status(status: LibraryStatus) -> Self {
        let mut info = Self {
            status,
            ..Self::default()
        };
        info.update_fingerprint();
        info
    }

    pub fn is_valid(&self) -> bool {
        self.status == LibraryStatus::Found
    }

    pub fn was_scanned(&self) -> bool {
        self.status != LibraryStatus::NotScanned
    }

    /// Whether the library ships C++ code whose types must be read.
    pub fn has_plugins(&self) -> bool {
        !self.plugins.is_empty() || !self.type_infos.is_empty()
    }

    pub fn fingerprint(&self) -> &[u8] {
        &self.fingerprint
    }

    pub fn update_fingerprint(&mut self) {
        self.fingerprint = self.calculate_fingerprint();
    }

    /// Structural hash over everything that affects type resolution.
    ///
    /// Meta objects are hashed in sorted order; qmldir imports keep their
    /// declaration order, which is significant.
    pub fn calculate_fingerprint(&self) -> Vec<u8> {
        let mut h = FingerprintHasher::new();
        h.tag(match self.status {
            LibraryStatus::NotScanned => 0,
            LibraryStatus::NotFound => 1,
            LibraryStatus::Found => 2,
        });
        h.int(self.components.len() as i64);
        for c in &self.components {
            h.str(&c.type_name);
            h.str(&c.file_name);
            h.version(c.version);
            h.tag((c.singleton as u8) | ((c.internal as u8) << 1));
        }
        h.int(self.plugins.len() as i64);
        for p in &self.plugins {
            h.str(&p.name);
            h.str(&p.path);
        }
        h.int(self.type_infos.len() as i64);
        for t in &self.type_infos {
            h.str(t);
        }
        let mut meta: Vec<Vec<u8>> = self.meta_objects.iter().map(|m| m.fingerprint()).collect();
        meta.sort();
        h.int(meta.len() as i64);
        for m in &meta {
            h.bytes(m);
        }
        h.tag(self.plugin_type_info_status.tag());
        h.str(&self.plugin_type_info_error);
        h.int(self.module_apis.len() as i64);
        for api in &self.module_apis {
            h.str(&api.uri);
            h.version(api.version);
            h.str(&api.cpp_name);
        }
        h.int(self.dependencies.len() as i64);
        for d in &self.dependencies {
            h.str(d);
        }
        h.int(self.imports.len() as i64);
        for i in &self.imports {
            h.str(&i.module);
            h.version(i.version);
            h.tag((i.flags.auto as u8) | ((i.flags.optional as u8) << 1));
        }
        h.tag(b'L');
        h.finish()
    }
}
