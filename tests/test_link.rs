//! Import resolution across a whole snapshot.

mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use rstest::rstest;

use common::{Fixture, qml_library, qtquick_builtins, v};
use qmljs::hir::{
    Environment, FakeMetaObject, LibraryInfo, MemoryProbe, ModuleApiInfo, ObjectKind,
    PluginDumper, PluginTypeInfoStatus, QmldirImport, QmldirPlugin, Severity, Value, codes,
};
use qmljs::syntax::AstBuilder;
use qmljs::{ComponentVersion, ImportType, ViewerContext};
use smol_str::SmolStr;

const MAIN: &str = "/proj/Main.qml";

fn import_module_doc(b: &AstBuilder, uri: &str, version: &str) -> qmljs::syntax::Program {
    b.ui_program(vec![b.import_module(uri, version, None)], b.object("Item", vec![]))
}

fn plugin_library(status: PluginTypeInfoStatus) -> LibraryInfo {
    let mut info = LibraryInfo::found();
    info.plugins = vec![QmldirPlugin {
        name: SmolStr::new("chartsplugin"),
        path: SmolStr::default(),
    }];
    info.plugin_type_info_status = status;
    info
}

#[derive(Default)]
struct RecordingDumper {
    requests: Mutex<Vec<(String, String, String, ComponentVersion)>>,
}

impl PluginDumper for RecordingDumper {
    fn load_plugin_types(&self, library_path: &str, import_path: &str, uri: &str, version: ComponentVersion) {
        self.requests.lock().push((
            library_path.to_string(),
            import_path.to_string(),
            uri.to_string(),
            version,
        ));
    }
}

// ============================================================================
// FILE AND DIRECTORY IMPORTS
// ============================================================================

#[test]
fn test_missing_directory_import() {
    let b = AstBuilder::new();
    let mut fx = Fixture::with_env(Environment::new().with_probe(MemoryProbe::new()));
    fx.add(MAIN, b.ui_program(vec![b.import_path("missing", None)], b.object("Item", vec![])));

    let ctx = fx.link(ViewerContext::new());
    let imports = ctx.imports(MAIN).expect("document linked");
    assert!(imports.import_failed());
    assert!(imports.all().iter().all(|i| i.info.ty != ImportType::UnknownFile));

    let diagnostics: Vec<_> = ctx.diagnostics_for(MAIN).collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code.as_deref(), Some(codes::IMPORT_NOT_FOUND));
    assert_eq!(&*diagnostics[0].message, "File or directory not found.");
}

#[test]
fn test_directory_import_exposes_components() {
    let b = AstBuilder::new();
    let probe = MemoryProbe::new().with_file("/proj/controls/Knob.qml");
    let mut fx = Fixture::with_env(Environment::new().with_probe(probe));
    let knob = fx.add("/proj/controls/Knob.qml", b.ui_program(vec![], b.object("Item", vec![])));
    fx.add("/proj/controls/helper.qml", b.ui_program(vec![], b.object("Item", vec![])));
    fx.add(
        MAIN,
        b.ui_program(vec![b.import_path("controls", Some("C"))], b.object("C.Knob", vec![])),
    );

    let ctx = fx.link(ViewerContext::new());
    let imports = ctx.imports(MAIN).expect("document linked");
    assert!(!imports.import_failed());
    let dir = imports
        .all()
        .iter()
        .find(|i| i.info.ty == ImportType::Directory)
        .expect("directory import");
    assert!(dir.valid);
    assert_eq!(dir.info.path, "/proj/controls");

    assert_eq!(ctx.lookup_type(MAIN, &["C", "Knob"]), knob.bind().root_object());
    // Lowercase file names are not components.
    assert_eq!(ctx.lookup_type(MAIN, &["C", "helper"]), None);
    // Aliased imports only answer to their alias.
    assert_eq!(ctx.lookup_type(MAIN, &["Knob"]), None);
}

#[test]
fn test_implicit_directory_import() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let button = fx.add("/proj/Button.qml", b.ui_program(vec![], b.object("Item", vec![])));
    let main = fx.add(MAIN, b.ui_program(vec![], b.object("Button", vec![])));

    let ctx = fx.link(ViewerContext::new());
    let root = main.bind().root_object().expect("root object");
    assert_eq!(ctx.prototype_of(root), button.bind().root_object());
}

// ============================================================================
// LIBRARY IMPORTS
// ============================================================================

#[test]
fn test_missing_module() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    fx.add(MAIN, import_module_doc(&b, "Nope", "1.0"));

    let ctx = fx.link(ViewerContext::new().with_paths(["/a", "/b"]));
    let imports = ctx.imports(MAIN).expect("document linked");
    assert!(imports.import_failed());
    let nope = imports
        .all()
        .iter()
        .find(|i| i.info.name == "Nope")
        .expect("unresolved import is kept");
    assert!(!nope.valid);

    let diagnostic = ctx.diagnostics_for(MAIN).next().expect("diagnostic");
    assert_eq!(diagnostic.code.as_deref(), Some(codes::IMPORT_NOT_FOUND));
    assert_eq!(
        &*diagnostic.message,
        "QML module not found (Nope).\n\nImport paths:\n/a\n/b"
    );
}

#[rstest]
#[case("2.3", "Star", true)]
#[case("2.3", "Hexagon", false)]
#[case("2.3", "Circle", false)]
#[case("2.4", "Hexagon", true)]
#[case("3.0", "Circle", true)]
#[case("3.0", "Star", false)]
#[case("", "Circle", true)]
fn test_component_version_visibility(#[case] version: &str, #[case] name: &str, #[case] visible: bool) {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    fx.add_library(
        "/qml/Shapes",
        qml_library(&[
            ("Star", "Star.qml", v(2, 2)),
            ("Hexagon", "Hexagon.qml", v(2, 4)),
            ("Circle", "Circle.qml", v(3, 0)),
        ]),
    );
    for file in ["Star", "Hexagon", "Circle"] {
        fx.add(
            &format!("/qml/Shapes/{file}.qml"),
            b.ui_program(vec![], b.object("Item", vec![])),
        );
    }
    fx.add(MAIN, import_module_doc(&b, "Shapes", version));

    let ctx = fx.link(ViewerContext::new().with_paths(["/qml"]));
    let expected = fx
        .snapshot
        .document(&format!("/qml/Shapes/{name}.qml"))
        .and_then(|doc| doc.bind().root_object());
    let found = ctx.lookup_type(MAIN, &[name]);
    if visible {
        assert_eq!(found, expected);
    } else {
        assert_eq!(found, None);
    }
    assert!(!ctx.imports(MAIN).expect("document linked").import_failed());
}

#[test]
fn test_versioned_directory_preferred() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    fx.add_library("/qml/Shapes", qml_library(&[("Star", "Star.qml", v(1, 0))]));
    fx.add_library("/qml/Shapes.2", qml_library(&[("Star", "Star.qml", v(2, 0))]));
    fx.add("/qml/Shapes/Star.qml", b.ui_program(vec![], b.object("Item", vec![])));
    let star2 = fx.add("/qml/Shapes.2/Star.qml", b.ui_program(vec![], b.object("Item", vec![])));
    fx.add(MAIN, import_module_doc(&b, "Shapes", "2.0"));

    let ctx = fx.link(ViewerContext::new().with_paths(["/qml"]));
    let import = ctx
        .imports(MAIN)
        .and_then(|imports| imports.all().iter().find(|i| i.info.name == "Shapes"))
        .expect("Shapes import");
    assert_eq!(import.library_path, "/qml/Shapes.2");
    assert_eq!(ctx.lookup_type(MAIN, &["Star"]), star2.bind().root_object());
}

#[test]
fn test_qtquick_first_and_shadowed_by_local_types() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let local_item = fx.add("/proj/Item.qml", b.ui_program(vec![], b.object("Rectangle", vec![])));
    fx.add(MAIN, import_module_doc(&b, "QtQuick", "2.0"));

    let ctx = fx.link_with_builtins(ViewerContext::new(), qtquick_builtins());
    let imports = ctx.imports(MAIN).expect("document linked");
    let kinds: Vec<(ImportType, &str)> = imports
        .all()
        .iter()
        .map(|i| (i.info.ty, i.info.name.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ImportType::Library, "QtQuick"),
            (ImportType::ImplicitDirectory, "/proj"),
        ]
    );

    assert_eq!(ctx.lookup_type(MAIN, &["Item"]), local_item.bind().root_object());
    let rectangle = ctx.lookup_type(MAIN, &["Rectangle"]).expect("Rectangle from QtQuick");
    let object = ctx.object(rectangle).expect("link object");
    assert_eq!(object.kind, ObjectKind::CppComponent);
    assert_eq!(object.class_name, "QQuickRectangle");
    // Members are inherited along the C++ superclass chain.
    assert!(matches!(ctx.lookup_member(rectangle, "width"), Some(Value::Property { .. })));
    assert!(diagnostics_are_empty(&ctx, MAIN));
}

fn diagnostics_are_empty(ctx: &qmljs::hir::Context, file: &str) -> bool {
    ctx.diagnostics_for(file).next().is_none()
}

#[test]
fn test_default_types_without_builtins() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    fx.add(MAIN, b.ui_program(vec![], b.object("QtObject", vec![])));

    let ctx = fx.link(ViewerContext::new());
    let qt_object = ctx.lookup_type(MAIN, &["QtObject"]).expect("default QtObject");
    assert_eq!(ctx.object(qt_object).map(|o| o.kind), Some(ObjectKind::CppComponent));
    assert!(ctx.lookup_type(MAIN, &["Component"]).is_some());
}

#[test]
fn test_relink_is_idempotent() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    fx.add_library("/qml/Shapes", qml_library(&[("Star", "Star.qml", v(1, 0))]));
    fx.add("/qml/Shapes/Star.qml", b.ui_program(vec![], b.object("Item", vec![])));
    fx.add(MAIN, import_module_doc(&b, "Shapes", "1.0"));
    fx.add("/proj/Other.qml", import_module_doc(&b, "Missing", "1.0"));

    let vctx = ViewerContext::new().with_paths(["/qml"]);
    let first = fx.link(vctx.clone());
    let second = fx.link(vctx);
    for doc in fx.snapshot.iter() {
        assert_eq!(first.imports(doc.file_name()), second.imports(doc.file_name()));
    }
    assert_eq!(first.diagnostics(), second.diagnostics());
    assert_eq!(first.diagnostics_for("/proj/Other.qml").count(), 1);
}

#[test]
fn test_module_api_is_shadowed_by_own_members() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let mut info = plugin_library(PluginTypeInfoStatus::DumpDone);
    info.meta_objects = vec![Arc::new(
        FakeMetaObject::new("WidgetsApi")
            .with_property("shared", "int")
            .with_property("Widget", "int"),
    )];
    info.module_apis = vec![ModuleApiInfo {
        uri: SmolStr::default(),
        version: v(1, 0),
        cpp_name: SmolStr::new("WidgetsApi"),
    }];
    info.components = vec![qmljs::hir::QmldirComponent::new("Widget", "Widget.qml", v(1, 0))];
    fx.add_library("/qml/Widgets", info);
    let widget = fx.add("/qml/Widgets/Widget.qml", b.ui_program(vec![], b.object("Item", vec![])));
    fx.add(MAIN, import_module_doc(&b, "Widgets", "1.0"));

    let ctx = fx.link(ViewerContext::new().with_paths(["/qml"]));
    let import = ctx
        .imports(MAIN)
        .and_then(|imports| imports.all().iter().find(|i| i.info.name == "Widgets"))
        .expect("Widgets import");
    assert!(import.valid);
    let namespace = import.object.expect("namespace object");

    assert_eq!(
        ctx.lookup_member(namespace, "Widget"),
        widget.bind().root_object().map(Value::Object)
    );
    assert!(matches!(ctx.lookup_member(namespace, "shared"), Some(Value::Property { .. })));
}

// ============================================================================
// PLUGIN TYPE INFORMATION
// ============================================================================

#[test]
fn test_pending_type_info_requests_one_dump() {
    let b = AstBuilder::new();
    let dumper = Arc::new(RecordingDumper::default());
    let mut fx = Fixture::with_env(Environment::new().with_dumper(dumper.clone()));
    fx.add_library("/qml/Charts", plugin_library(PluginTypeInfoStatus::NoTypeInfo));
    fx.add(MAIN, import_module_doc(&b, "Charts", "1.0"));
    fx.add("/proj/Other.qml", import_module_doc(&b, "Charts", "1.0"));

    let ctx = fx.link(ViewerContext::new().with_paths(["/qml"]));
    for file in [MAIN, "/proj/Other.qml"] {
        let imports = ctx.imports(file).expect("document linked");
        assert!(!imports.import_failed());
        let charts = imports
            .all()
            .iter()
            .find(|i| i.info.name == "Charts")
            .expect("Charts import");
        assert!(!charts.valid);
        assert_eq!(charts.library_path, "/qml/Charts");

        let diagnostic = ctx.diagnostics_for(file).next().expect("pending warning");
        assert_eq!(diagnostic.code.as_deref(), Some(codes::READING_TYPE_INFO));
        assert_eq!(diagnostic.severity, Severity::ReadingTypeInfoWarning);
    }

    let requests = dumper.requests.lock();
    assert_eq!(
        *requests,
        vec![(
            "/qml/Charts".to_string(),
            "/qml".to_string(),
            "Charts".to_string(),
            v(1, 0)
        )]
    );
}

#[rstest]
#[case("Charts", true)]
#[case("ChartsPrivate", false)]
fn test_failed_dump_reported(#[case] uri: &str, #[case] reported: bool) {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let mut info = plugin_library(PluginTypeInfoStatus::DumpError);
    info.plugin_type_info_error = "plugin crashed".to_string();
    fx.add_library(&format!("/qml/{uri}"), info);
    fx.add(MAIN, import_module_doc(&b, uri, "1.0"));

    let ctx = fx.link(ViewerContext::new().with_paths(["/qml"]));
    let errors: Vec<_> = ctx
        .diagnostics_for(MAIN)
        .filter(|d| d.code.as_deref() == Some(codes::TYPE_INFO_FAILED))
        .collect();
    if reported {
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("plugin crashed"));
    } else {
        assert!(errors.is_empty());
    }
    assert!(!ctx.imports(MAIN).expect("document linked").import_failed());
}

// ============================================================================
// QMLDIR IMPORTS
// ============================================================================

#[rstest]
#[case(false, true)]
#[case(true, false)]
fn test_transitive_import_missing(#[case] optional: bool, #[case] reported: bool) {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let mut info = qml_library(&[]);
    let import = QmldirImport::new("Missing", v(1, 0));
    info.imports = vec![if optional { import.optional() } else { import }];
    fx.add_library("/qml/Gauges", info);
    fx.add(MAIN, import_module_doc(&b, "Gauges", "1.0"));

    let ctx = fx.link(ViewerContext::new().with_paths(["/qml"]));
    let missing: Vec<_> = ctx
        .diagnostics_for(MAIN)
        .filter(|d| d.code.as_deref() == Some(codes::IMPLICIT_IMPORT_MISSING))
        .collect();
    let gauges = ctx
        .imports(MAIN)
        .and_then(|imports| imports.all().iter().find(|i| i.info.name == "Gauges"))
        .expect("Gauges import")
        .clone();
    if reported {
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message.contains("'Missing'"));
        assert!(!gauges.valid);
    } else {
        assert!(missing.is_empty());
        assert!(gauges.valid);
    }
}

#[rstest]
#[case::automatic(true, false)]
#[case::explicit(false, true)]
fn test_qtquick3d_auto_import_skipped(#[case] auto: bool, #[case] reported: bool) {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let mut info = qml_library(&[]);
    let import = QmldirImport::new("QtQuick3D.Helpers", v(6, 0));
    info.imports = vec![if auto { import.auto() } else { import }];
    fx.add_library("/qml/Scene", info);
    fx.add(MAIN, import_module_doc(&b, "Scene", "6.0"));

    let ctx = fx.link(ViewerContext::new().with_paths(["/qml"]));
    let missing = ctx
        .diagnostics_for(MAIN)
        .filter(|d| d.code.as_deref() == Some(codes::IMPLICIT_IMPORT_MISSING))
        .count();
    let scene = ctx
        .imports(MAIN)
        .and_then(|imports| imports.all().iter().find(|i| i.info.name == "Scene"))
        .expect("Scene import")
        .clone();
    assert_eq!(missing, usize::from(reported));
    assert_eq!(scene.valid, !reported);
}

#[test]
fn test_qtquick3d_explicit_import_followed() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let mut scene = qml_library(&[]);
    scene.imports = vec![QmldirImport::new("QtQuick3D.Helpers", v(6, 0))];
    fx.add_library("/qml/Scene", scene);
    fx.add_library("/qml/QtQuick3D/Helpers", qml_library(&[("Grid", "Grid.qml", v(6, 0))]));
    let grid = fx.add("/qml/QtQuick3D/Helpers/Grid.qml", b.ui_program(vec![], b.object("Item", vec![])));
    fx.add(MAIN, import_module_doc(&b, "Scene", "6.0"));

    let ctx = fx.link(ViewerContext::new().with_paths(["/qml"]));
    assert_eq!(ctx.lookup_type(MAIN, &["Grid"]), grid.bind().root_object());
    assert!(diagnostics_are_empty(&ctx, MAIN));
}

#[test]
fn test_transitive_import_contributes_types() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let mut controls = qml_library(&[("Button", "Button.qml", v(2, 0))]);
    controls.imports = vec![QmldirImport::new("Base", v(1, 0)), QmldirImport::new("Style", v(1, 0)).auto()];
    fx.add_library("/qml/Controls", controls);
    fx.add_library("/qml/Base", qml_library(&[("Frame", "Frame.qml", v(1, 0))]));
    fx.add_library("/qml/Style.2.0", qml_library(&[("Palette", "Palette.qml", v(2, 0))]));
    fx.add("/qml/Controls/Button.qml", b.ui_program(vec![], b.object("Item", vec![])));
    let frame = fx.add("/qml/Base/Frame.qml", b.ui_program(vec![], b.object("Item", vec![])));
    let palette = fx.add("/qml/Style.2.0/Palette.qml", b.ui_program(vec![], b.object("Item", vec![])));
    fx.add(MAIN, import_module_doc(&b, "Controls", "2.0"));

    let ctx = fx.link(ViewerContext::new().with_paths(["/qml"]));
    assert_eq!(ctx.lookup_type(MAIN, &["Frame"]), frame.bind().root_object());
    // `auto` imports follow the importing statement's version.
    assert_eq!(ctx.lookup_type(MAIN, &["Palette"]), palette.bind().root_object());
    assert!(diagnostics_are_empty(&ctx, MAIN));
}

// ============================================================================
// DEPENDENCY INDEX FALLBACK
// ============================================================================

#[test]
fn test_library_found_through_dependency_index() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    fx.add_library("/opt/Widgets.2.0", qml_library(&[("Knob", "Knob.qml", v(2, 0))]));
    let knob = fx.add("/opt/Widgets.2.0/Knob.qml", b.ui_program(vec![], b.object("Item", vec![])));
    fx.add(MAIN, import_module_doc(&b, "Widgets", "2.1"));

    let ctx = fx.link(ViewerContext::new().with_paths(["/opt"]));
    let import = ctx
        .imports(MAIN)
        .and_then(|imports| imports.all().iter().find(|i| i.info.name == "Widgets"))
        .expect("Widgets import");
    assert!(import.valid);
    assert_eq!(import.library_path, "/opt/Widgets.2.0");
    assert_eq!(ctx.lookup_type(MAIN, &["Knob"]), knob.bind().root_object());
}

#[test]
fn test_context_properties_scope() {
    let b = AstBuilder::new();
    let env = Environment::new()
        .with_cpp_exports(
            "backend.cpp",
            vec![Arc::new(FakeMetaObject::new("Backend").with_property("status", "QString"))],
        )
        .with_context_property("backend", "Backend")
        .with_context_property("opaque", "NotRegistered");
    let mut fx = Fixture::with_env(env);
    fx.add(MAIN, b.ui_program(vec![], b.object("Item", vec![])));

    let ctx = fx.link(ViewerContext::new());
    let properties = ctx.cpp_context_properties().expect("context properties");
    let backend = ctx
        .lookup_member(properties, "backend")
        .and_then(|value| value.as_object())
        .expect("backend object");
    assert!(matches!(ctx.lookup_member(backend, "status"), Some(Value::Property { .. })));
    assert_eq!(ctx.lookup_member(properties, "opaque"), Some(Value::Unknown));
}
