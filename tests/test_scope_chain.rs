//! Scope chains built from linked snapshots.

mod common;

use common::{Fixture, qtquick_builtins};
use qmljs::hir::{Environment, MemoryProbe, Scope, ScopeChain, Severity, Value, codes};
use qmljs::syntax::AstBuilder;
use qmljs::ViewerContext;

const MAIN: &str = "/proj/Main.qml";

#[test]
fn test_lookup_order() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let main = fx.add(
        MAIN,
        b.ui_program(
            vec![b.import_module("QtQuick", "2.0", None)],
            b.object(
                "Item",
                vec![
                    b.id_binding("root"),
                    b.property("int", "count", None),
                    b.object("Rectangle", vec![b.id_binding("rect")]),
                ],
            ),
        ),
    );
    let ctx = fx.link_with_builtins(ViewerContext::new(), qtquick_builtins());
    let chain = ScopeChain::new(main.clone(), ctx.clone());

    let root = main.bind().root_object().expect("root object");
    let count = chain.lookup("count").expect("count");
    assert_eq!(count.scope, Scope::Object(root));
    assert!(matches!(count.value, Value::Property { .. }));

    let rect = chain.lookup("rect").expect("rect");
    assert_eq!(rect.scope, Scope::Object(main.bind().id_environment()));

    let math = chain.lookup("Math").expect("Math");
    assert_eq!(math.scope, Scope::Object(ctx.global_object()));

    let rectangle = chain.lookup("Rectangle").expect("Rectangle");
    assert_eq!(rectangle.scope, Scope::TypeScope(MAIN.into()));

    // Members inherited from the C++ type are found through the root.
    assert!(matches!(chain.lookup_value("width"), Value::Property { .. }));
    assert_eq!(chain.lookup("nothing"), None);
    assert_eq!(chain.lookup_value("nothing"), Value::Undefined);
}

#[test]
fn test_chain_layout() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let main = fx.add(MAIN, b.ui_program(vec![], b.object("Item", vec![])));
    let ctx = fx.link(ViewerContext::new());
    let chain = ScopeChain::new(main.clone(), ctx.clone());

    let bind = main.bind();
    assert_eq!(
        chain.all(),
        &[
            Scope::Object(ctx.global_object()),
            Scope::Object(bind.root_object().expect("root object")),
            Scope::Object(bind.id_environment()),
            Scope::TypeScope(MAIN.into()),
            Scope::JsImportScope(MAIN.into()),
        ]
    );
}

#[test]
fn test_inner_scope_shadows_outer() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    // An id named like a global shadows it.
    let main = fx.add(
        MAIN,
        b.ui_program(vec![], b.object("Item", vec![b.object("Item", vec![b.id_binding("Math")])])),
    );
    let ctx = fx.link(ViewerContext::new());
    let chain = ScopeChain::new(main.clone(), ctx);
    let math = chain.lookup("Math").expect("Math");
    assert_eq!(math.scope, Scope::Object(main.bind().id_environment()));
}

#[test]
fn test_instantiating_component_scopes() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let button = fx.add(
        "/proj/Button.qml",
        b.ui_program(vec![], b.object("Item", vec![b.property("string", "label", None)])),
    );
    let main = fx.add(
        MAIN,
        b.ui_program(
            vec![],
            b.object("Item", vec![b.id_binding("window"), b.object("Button", vec![b.id_binding("ok")])]),
        ),
    );
    let ctx = fx.link(ViewerContext::new());
    let chain = ScopeChain::new(button, ctx);

    let component_chain = chain.qml_component_chain().expect("component chain");
    let instantiating = component_chain.instantiating_components();
    assert_eq!(instantiating.len(), 1);
    assert_eq!(instantiating[0].document().file_name(), MAIN);

    let window = chain.lookup("window").expect("window from Main.qml");
    assert_eq!(window.scope, Scope::Object(main.bind().id_environment()));
    assert!(chain.lookup("label").is_some());
    assert!(chain.diagnostics().is_empty());
}

#[test]
fn test_scope_annotation() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let main = fx.add(MAIN, b.ui_program(vec![], b.object("Item", vec![b.id_binding("mainRoot")])));
    let delegate = fx.add_with_source(
        "/proj/Delegate.qml",
        "// @scope Main.qml\nItem {}\n",
        b.ui_program(vec![], b.object("Item", vec![])),
    );
    let ctx = fx.link(ViewerContext::new());
    let chain = ScopeChain::new(delegate, ctx);

    assert!(chain.diagnostics().is_empty());
    let found = chain.lookup("mainRoot").expect("mainRoot via @scope");
    assert_eq!(found.scope, Scope::Object(main.bind().id_environment()));
}

#[test]
fn test_scope_annotation_problems() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let itself = fx.add_with_source(
        "/proj/Self.qml",
        "// @scope Self.qml\nItem {}\n",
        b.ui_program(vec![], b.object("Item", vec![])),
    );
    let missing = fx.add_with_source(
        "/proj/Lonely.qml",
        "/* @scope Gone.qml */\nItem {}\n",
        b.ui_program(vec![], b.object("Item", vec![])),
    );
    let ctx = fx.link(ViewerContext::new());

    let chain = ScopeChain::new(itself, ctx.clone());
    assert_eq!(chain.diagnostics().len(), 1);
    assert_eq!(chain.diagnostics()[0].code.as_deref(), Some(codes::CONFLICTING_SCOPE));

    let chain = ScopeChain::new(missing, ctx);
    assert_eq!(chain.diagnostics().len(), 1);
    assert_eq!(chain.diagnostics()[0].severity, Severity::Warning);
    assert!(chain.diagnostics()[0].message.contains("/proj/Gone.qml"));
}

#[test]
fn test_js_file_sees_importer_only_inside_functions() {
    let b = AstBuilder::new();
    let env = Environment::new().with_probe(MemoryProbe::new().with_file("/proj/logic.js"));
    let mut fx = Fixture::with_env(env);
    let logic = fx.add_with_source(
        "/proj/logic.js",
        "function helper() {}\n",
        b.js_program(vec![b.function_declaration("helper", &[], vec![])]),
    );
    let main = fx.add(
        MAIN,
        b.ui_program(
            vec![b.import_path("logic.js", Some("Logic"))],
            b.object("Item", vec![b.id_binding("window")]),
        ),
    );
    let ctx = fx.link(ViewerContext::new());

    let mut chain = ScopeChain::new(logic.clone(), ctx.clone());
    assert_eq!(chain.js_scopes(), &[logic.bind().root_object().expect("script scope")]);
    assert!(chain.lookup("helper").is_some());
    assert_eq!(chain.lookup("window"), None);

    chain.append_js_scope(logic.bind().id_environment());
    let window = chain.lookup("window").expect("window inside a function scope");
    assert_eq!(window.scope, Scope::Object(main.bind().id_environment()));

    let main_chain = ScopeChain::new(main.clone(), ctx);
    let imported = main_chain.lookup("Logic").expect("Logic");
    assert_eq!(imported.scope, Scope::JsImportScope(MAIN.into()));
    assert_eq!(imported.value, Value::Object(logic.bind().root_object().expect("script scope")));
}

#[test]
fn test_library_script_has_no_instantiating_components() {
    let b = AstBuilder::new();
    let env = Environment::new().with_probe(MemoryProbe::new().with_file("/proj/util.js"));
    let mut fx = Fixture::with_env(env);
    let util = fx.add_with_source(
        "/proj/util.js",
        ".pragma library\nvar x = 1;\n",
        b.js_program(vec![b.var("x", None)]),
    );
    fx.add(
        MAIN,
        b.ui_program(vec![b.import_path("util.js", Some("Util"))], b.object("Item", vec![])),
    );
    let ctx = fx.link(ViewerContext::new());
    assert!(util.bind().is_js_library());

    let chain = ScopeChain::new(util, ctx);
    let component_chain = chain.qml_component_chain().expect("component chain");
    assert!(component_chain.instantiating_components().is_empty());
    assert!(matches!(chain.lookup_value("x"), Value::Variable { .. }));
}

#[test]
fn test_modification_resets_flattened_chain() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let main = fx.add(
        MAIN,
        b.ui_program(vec![], b.object("Item", vec![b.object("Item", vec![b.id_binding("inner")])])),
    );
    let ctx = fx.link(ViewerContext::new());
    let mut chain = ScopeChain::new(main.clone(), ctx);

    assert!(chain.is_modified());
    let before = chain.all().len();
    assert!(!chain.is_modified());

    chain.set_global_scope(None);
    assert!(chain.is_modified());
    assert_eq!(chain.all().len(), before - 1);
    assert_eq!(chain.lookup("Math"), None);

    let bind = main.bind();
    let root = bind.root_object().expect("root object");
    chain.set_qml_scope_objects(vec![root]);
    assert!(chain.is_modified());
    // The root is listed once even when it is also a scope object.
    let roots = chain.all().iter().filter(|s| **s == Scope::Object(root)).count();
    assert_eq!(roots, 1);
}

#[test]
fn test_self_qualified_prototype_terminates() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let a = fx.add("/p/A.qml", b.ui_program(vec![], b.object("A.Foo", vec![])));
    let ctx = fx.link(ViewerContext::new());

    let root = a.bind().root_object().expect("root object");
    assert_eq!(ctx.prototype_of(root), None);
    assert_eq!(ctx.lookup_type("/p/A.qml", &["A", "Foo"]), None);

    let chain = ScopeChain::new(a, ctx);
    assert_eq!(chain.lookup("missing"), None);
    assert_eq!(chain.lookup_value("missing"), Value::Undefined);
}

#[test]
fn test_mutually_qualified_prototypes_terminate() {
    let b = AstBuilder::new();
    let mut fx = Fixture::new();
    let a = fx.add("/p/A.qml", b.ui_program(vec![], b.object("B.Foo", vec![])));
    let other = fx.add("/p/B.qml", b.ui_program(vec![], b.object("A.Bar", vec![])));
    let ctx = fx.link(ViewerContext::new());

    assert_eq!(ctx.prototype_of(a.bind().root_object().expect("A root")), None);
    assert_eq!(ctx.prototype_of(other.bind().root_object().expect("B root")), None);
    let chain = ScopeChain::new(a, ctx);
    assert_eq!(chain.lookup("missing"), None);
}
