//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use qmljs::hir::{
    Context, Document, Environment, FakeMetaObject, LibraryInfo, Link, PluginTypeInfoStatus,
    QmldirComponent, Snapshot,
};
use qmljs::syntax::{ParseOutput, Program, StaticParser};
use qmljs::{ComponentVersion, Dialect, ViewerContext};

/// A snapshot under construction, with a parser serving the trees the
/// test registers.
pub struct Fixture {
    pub parser: StaticParser,
    pub env: Environment,
    pub snapshot: Snapshot,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_env(Environment::new())
    }

    pub fn with_env(env: Environment) -> Self {
        Self {
            parser: StaticParser::new(),
            env,
            snapshot: Snapshot::new(),
        }
    }

    /// Parse `program` as `file_name` and insert it.
    pub fn add(&mut self, file_name: &str, program: Program) -> Arc<Document> {
        self.add_with_source(file_name, "", program)
    }

    /// Like [`add`](Self::add), with source text for comments and
    /// directives.
    pub fn add_with_source(&mut self, file_name: &str, source: &str, program: Program) -> Arc<Document> {
        self.parser.register(file_name, ParseOutput::success(program));
        let doc = Document::parse(file_name, source, Dialect::AnyLanguage, 0, &self.parser, &self.env);
        self.snapshot.insert(doc.clone(), false);
        doc
    }

    pub fn add_library(&mut self, path: &str, mut info: LibraryInfo) {
        info.update_fingerprint();
        self.snapshot.insert_library_info(path, info);
    }

    pub fn link(&self, vctx: ViewerContext) -> Arc<Context> {
        self.link_with_builtins(vctx, LibraryInfo::default())
    }

    pub fn link_with_builtins(&self, vctx: ViewerContext, builtins: LibraryInfo) -> Arc<Context> {
        Link::new(self.snapshot.clone(), vctx, builtins, &self.env).link()
    }
}

pub fn v(major: i32, minor: i32) -> ComponentVersion {
    ComponentVersion::new(major, minor)
}

/// A found library listing `components` as `(type, file, version)`.
pub fn qml_library(components: &[(&str, &str, ComponentVersion)]) -> LibraryInfo {
    let mut info = LibraryInfo::found();
    info.components = components
        .iter()
        .map(|(ty, file, version)| QmldirComponent::new(ty, file, *version))
        .collect();
    info.update_fingerprint();
    info
}

/// Builtins exporting a minimal `QtQuick` module.
pub fn qtquick_builtins() -> LibraryInfo {
    let mut info = LibraryInfo::found();
    info.plugin_type_info_status = PluginTypeInfoStatus::DumpDone;
    info.meta_objects = vec![
        Arc::new(
            FakeMetaObject::new("QObject")
                .with_export("QtQml", "QtObject", v(2, 0))
                .with_property("objectName", "string"),
        ),
        Arc::new(
            FakeMetaObject::new("QQuickItem")
                .with_superclass("QObject")
                .with_export("QtQuick", "Item", v(2, 0))
                .with_property("width", "double")
                .with_property("height", "double"),
        ),
        Arc::new(
            FakeMetaObject::new("QQuickRectangle")
                .with_superclass("QQuickItem")
                .with_export("QtQuick", "Rectangle", v(2, 0))
                .with_property("color", "QColor"),
        ),
    ];
    info.update_fingerprint();
    info
}
