//! Loading sources from disk and publishing snapshots.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use qmljs::hir::{Document, Environment, Scope, Snapshot, codes};
use qmljs::project::{AnalysisConfig, LoadError, Workspace, WorkspaceLoader, collect_file_paths};
use qmljs::syntax::{AstBuilder, ParseGoal, ParseOutput, Parser, StaticParser};
use qmljs::{Dialect, ViewerContext};

fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(&path, contents).expect("write source file");
    path
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// A project with a main file, a component directory and a script.
struct Project {
    _dir: tempfile::TempDir,
    root: PathBuf,
    main: PathBuf,
    knob: PathBuf,
    script: PathBuf,
    parser: StaticParser,
}

fn project() -> Project {
    let dir = tempfile::tempdir().expect("temporary directory");
    let root = dir.path().to_path_buf();
    let main = write(&root, "Main.qml", "import \"controls\" as C\nItem { C.Knob { id: knob } }\n");
    let knob = write(&root, "controls/Knob.qml", "Item {}\n");
    let script = write(&root, "logic.js", "function helper() {}\n");
    write(&root, "controls/qmldir", "Knob 1.0 Knob.qml\n");
    write(&root, "README.md", "not a source file\n");

    let b = AstBuilder::new();
    let parser = StaticParser::new()
        .with(
            key(&main),
            ParseOutput::success(b.ui_program(
                vec![b.import_path("controls", Some("C"))],
                b.object("Item", vec![b.object("C.Knob", vec![b.id_binding("knob")])]),
            )),
        )
        .with(key(&knob), ParseOutput::success(b.ui_program(vec![], b.object("Item", vec![]))))
        .with(
            key(&script),
            ParseOutput::success(b.js_program(vec![b.function_declaration("helper", &[], vec![])])),
        );
    Project {
        _dir: dir,
        root,
        main,
        knob,
        script,
        parser,
    }
}

#[test]
fn test_collect_file_paths() {
    let project = project();
    let paths = collect_file_paths(&project.root).expect("walk");
    let mut expected = vec![project.main.clone(), project.knob.clone(), project.script.clone()];
    expected.sort();
    assert_eq!(paths, expected);
}

#[test]
fn test_loader_fills_snapshot() {
    let project = project();
    let env = Environment::new();
    let mut snapshot = Snapshot::new();
    let report = WorkspaceLoader::new(&project.parser, &env)
        .load_directory_into_snapshot(&project.root, &mut snapshot)
        .expect("load");

    assert_eq!(report.loaded, 3);
    assert!(report.is_complete());
    assert_eq!(snapshot.len(), 3);
    let knob = snapshot.document(&key(&project.knob)).expect("Knob.qml");
    assert_eq!(knob.component_name(), "Knob");
    assert_eq!(knob.source(), "Item {}\n");
}

#[test]
fn test_loader_keeps_unparsed_files() {
    let project = project();
    let broken = write(&project.root, "Broken.qml", "Item {\n");
    let env = Environment::new();
    let mut snapshot = Snapshot::new();
    let report = WorkspaceLoader::new(&project.parser, &env)
        .load_directory_into_snapshot(&project.root, &mut snapshot)
        .expect("load");

    assert_eq!(report.loaded, 4);
    let doc = snapshot.document(&key(&broken)).expect("Broken.qml");
    assert!(!doc.is_parsed_correctly());
    assert!(doc.diagnostics().iter().any(|d| d.code.as_deref() == Some(codes::SYNTAX_ERROR)));
}

#[test]
fn test_loader_rejects_files() {
    let project = project();
    let env = Environment::new();
    let mut snapshot = Snapshot::new();
    let err = WorkspaceLoader::new(&project.parser, &env)
        .load_directory_into_snapshot(&project.main, &mut snapshot)
        .expect_err("not a directory");
    assert!(matches!(err, LoadError::NotADirectory(_)));
    assert!(snapshot.is_empty());
}

#[test]
fn test_workspace_links_loaded_project() {
    let project = project();
    let workspace = Workspace::new(ViewerContext::new(), Environment::new());
    workspace.load_directory(&project.root, &project.parser).expect("load");

    let main = key(&project.main);
    let ctx = workspace.link();
    let imports = ctx.imports(&main).expect("Main.qml linked");
    assert!(!imports.import_failed());
    let knob_root = ctx
        .snapshot()
        .document(&key(&project.knob))
        .and_then(|doc| doc.bind().root_object());
    assert_eq!(ctx.lookup_type(&main, &["C", "Knob"]), knob_root);

    let chain = workspace.scope_chain(&main).expect("scope chain");
    let main_doc = ctx.snapshot().document(&main).expect("Main.qml").clone();
    let knob = chain.lookup("knob").expect("knob id");
    assert_eq!(knob.scope, Scope::Object(main_doc.bind().id_environment()));
    assert!(workspace.scope_chain("/nowhere/Missing.qml").is_none());
}

#[test]
fn test_published_snapshots_are_stable() {
    let project = project();
    let workspace = Workspace::from_config(&AnalysisConfig::new());
    workspace.load_directory(&project.root, &project.parser).expect("load");

    let before = workspace.snapshot();
    workspace.remove_document(&key(&project.script));
    let after = workspace.snapshot();

    assert_eq!(before.len(), 3);
    assert_eq!(after.len(), 2);
    assert!(before.document(&key(&project.script)).is_some());
    assert!(after.document(&key(&project.script)).is_none());
}

/// Publishes a document through the workspace while the load is parsing.
struct InterleavingParser<'w> {
    inner: &'w StaticParser,
    workspace: &'w Workspace,
    pending: Mutex<Option<Arc<Document>>>,
}

impl Parser for InterleavingParser<'_> {
    fn parse(&self, file_name: &str, source: &str, goal: ParseGoal) -> ParseOutput {
        if let Some(document) = self.pending.lock().take() {
            self.workspace.update_document(document);
        }
        self.inner.parse(file_name, source, goal)
    }
}

#[test]
fn test_load_keeps_concurrent_updates() {
    let project = project();
    let workspace = Workspace::new(ViewerContext::new(), Environment::new());

    let b = AstBuilder::new();
    let outside = "/elsewhere/Extra.qml";
    project
        .parser
        .register(outside, ParseOutput::success(b.ui_program(vec![], b.object("Item", vec![]))));
    let extra = Document::parse(outside, "Item {}\n", Dialect::Qml, 0, &project.parser, workspace.environment());

    let parser = InterleavingParser {
        inner: &project.parser,
        workspace: &workspace,
        pending: Mutex::new(Some(extra)),
    };
    let report = workspace.load_directory(&project.root, &parser).expect("load");

    assert_eq!(report.loaded, 3);
    let snapshot = workspace.snapshot();
    assert_eq!(snapshot.len(), 4);
    assert!(snapshot.document(outside).is_some());
    assert!(snapshot.document(&key(&project.main)).is_some());
}
