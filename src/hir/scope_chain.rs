//! Scope chains for name lookup.
//!
//! A [`ScopeChain`] lists, for one document under one [`Context`], every
//! scope a name can come from, weakest first: the global object, C++
//! context properties, the components instantiating this one, the
//! document's own root object and id environment, its imported types, its
//! JavaScript imports and finally JavaScript scopes pushed by the caller.
//! Lookups scan from the end.

use std::sync::{Arc, LazyLock, OnceLock};

use regex::Regex;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use super::context::Context;
use super::diagnostics::{Diagnostic, codes};
use super::document::Document;
use super::environment::join_path;
use super::ids::ObjectRef;
use super::value::Value;
use crate::base::{Dialect, SourceLocation};
use crate::imports::ImportType;

static SCOPE_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@scope\s+(\S+)").expect("valid regex"));

/// One entry of a scope chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Object(ObjectRef),
    /// The types imported by a document.
    TypeScope(SmolStr),
    /// The JavaScript files imported by a document.
    JsImportScope(SmolStr),
}

/// A successful [`ScopeChain::lookup`].
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeMember {
    pub value: Value,
    /// The chain entry the name was found in.
    pub scope: Scope,
}

// ============================================================================
// COMPONENT CHAIN
// ============================================================================

/// A document together with the documents instantiating it, recursively.
#[derive(Clone, Debug)]
pub struct QmlComponentChain {
    document: Arc<Document>,
    instantiating: Vec<QmlComponentChain>,
}

/// `@scope <path>` annotations of a document, resolved against its
/// directory.
fn scope_annotations(doc: &Document) -> Vec<(String, SourceLocation)> {
    doc.comments()
        .iter()
        .flat_map(|comment| {
            SCOPE_ANNOTATION
                .captures_iter(&comment.text)
                .map(|caps| (join_path(doc.path(), &caps[1]), comment.location))
                .collect::<Vec<_>>()
        })
        .collect()
}

impl QmlComponentChain {
    pub fn new(document: Arc<Document>) -> Self {
        Self {
            document,
            instantiating: Vec::new(),
        }
    }

    /// The chain of `document` under `ctx`: every other document whose
    /// objects use `document` as their type, plus the targets of its
    /// `@scope` annotations, each with its own chain.
    pub fn build(document: Arc<Document>, ctx: &Context, diagnostics: &mut Vec<Diagnostic>) -> Self {
        let mut visited = FxHashSet::default();
        visited.insert(SmolStr::new(document.file_name()));
        let mut chain = Self::new(document);
        chain.make(ctx, &mut visited, diagnostics);
        chain
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn instantiating_components(&self) -> &[QmlComponentChain] {
        &self.instantiating
    }

    pub fn add_instantiating_component(&mut self, component: QmlComponentChain) {
        self.instantiating.push(component);
    }

    fn make(&mut self, ctx: &Context, visited: &mut FxHashSet<SmolStr>, diagnostics: &mut Vec<Diagnostic>) {
        let doc = self.document.clone();
        if doc.qml_program().is_none() {
            return;
        }
        if let Some(root) = doc.bind().root_object() {
            for other in ctx.snapshot().iter() {
                if other.file_name() == doc.file_name() {
                    continue;
                }
                if other.bind().uses_qml_prototype(root, ctx)
                    && visited.insert(SmolStr::new(other.file_name()))
                {
                    let mut component = QmlComponentChain::new(other.clone());
                    component.make(ctx, visited, diagnostics);
                    self.instantiating.push(component);
                }
            }
        }

        for (target, location) in scope_annotations(&doc) {
            if target == doc.file_name() {
                diagnostics.push(
                    Diagnostic::error(
                        doc.file_name(),
                        location,
                        "@scope refers to the document itself",
                    )
                    .with_code(codes::CONFLICTING_SCOPE),
                );
                continue;
            }
            let Some(other) = ctx.snapshot().document(&target) else {
                diagnostics.push(Diagnostic::warning(
                    doc.file_name(),
                    location,
                    format!("@scope target not found: {target}"),
                ));
                continue;
            };
            if visited.insert(SmolStr::new(&target)) {
                let mut component = QmlComponentChain::new(other.clone());
                component.make(ctx, visited, diagnostics);
                self.instantiating.push(component);
            } else if !self
                .instantiating
                .iter()
                .any(|c| c.document.file_name() == target)
            {
                diagnostics.push(
                    Diagnostic::error(
                        doc.file_name(),
                        location,
                        format!("@scope {target} conflicts with the component chain"),
                    )
                    .with_code(codes::CONFLICTING_SCOPE),
                );
            }
        }
    }

    /// Root objects and id environments of the instantiating components,
    /// outermost first, followed by this component's own.
    fn collect_scopes(&self, out: &mut Vec<Scope>) {
        for parent in &self.instantiating {
            parent.collect_scopes(out);
        }
        let bind = self.document.bind();
        if let Some(root) = bind.root_object() {
            out.push(Scope::Object(root));
        }
        out.push(Scope::Object(bind.id_environment()));
    }
}

// ============================================================================
// SCOPE CHAIN
// ============================================================================

#[derive(Clone, Debug)]
pub struct ScopeChain {
    document: Arc<Document>,
    context: Arc<Context>,
    global_scope: Option<ObjectRef>,
    cpp_context_properties: Option<ObjectRef>,
    component_chain: Option<Arc<QmlComponentChain>>,
    qml_scope_objects: Vec<ObjectRef>,
    qml_types: Option<Scope>,
    js_imports: Option<Scope>,
    js_scopes: Vec<ObjectRef>,
    diagnostics: Vec<Diagnostic>,
    /// Flattened chain; empty while the inputs changed since the last
    /// [`all`](Self::all).
    all: OnceLock<Vec<Scope>>,
}

impl ScopeChain {
    /// The root scope chain of `document`.
    pub fn new(document: Arc<Document>, context: Arc<Context>) -> Self {
        let mut diagnostics = Vec::new();
        let mut chain = QmlComponentChain::new(document.clone());
        let snapshot = context.snapshot();

        if document.qml_program().is_some() {
            chain = QmlComponentChain::build(document.clone(), &context, &mut diagnostics);
        } else if !document.bind().is_js_library() {
            let mut visited = FxHashSet::default();
            visited.insert(SmolStr::new(document.file_name()));
            for other in snapshot.iter() {
                let imports_this = other
                    .bind()
                    .imports()
                    .iter()
                    .any(|import| import.ty == ImportType::File && import.path == document.file_name());
                if imports_this && visited.insert(SmolStr::new(other.file_name())) {
                    let mut component = QmlComponentChain::new(other.clone());
                    component.make(&context, &mut visited, &mut diagnostics);
                    chain.add_instantiating_component(component);
                }
            }
        }

        let mut js_scopes = Vec::new();
        if document.qml_program().is_none() {
            js_scopes.extend(document.bind().root_object());
        }
        let has_imports = context.imports(document.file_name()).is_some();
        let file_name = SmolStr::new(document.file_name());
        Self {
            global_scope: Some(context.global_object()),
            cpp_context_properties: context.cpp_context_properties(),
            component_chain: Some(Arc::new(chain)),
            qml_scope_objects: Vec::new(),
            qml_types: has_imports.then(|| Scope::TypeScope(file_name.clone())),
            js_imports: has_imports.then(|| Scope::JsImportScope(file_name)),
            js_scopes,
            diagnostics,
            all: OnceLock::new(),
            document,
            context,
        }
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Problems found while following `@scope` annotations.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn modified(&mut self) {
        self.all = OnceLock::new();
    }

    /// Whether the flattened chain must be recomputed.
    pub fn is_modified(&self) -> bool {
        self.all.get().is_none()
    }

    pub fn global_scope(&self) -> Option<ObjectRef> {
        self.global_scope
    }

    pub fn set_global_scope(&mut self, global: Option<ObjectRef>) {
        self.global_scope = global;
        self.modified();
    }

    pub fn cpp_context_properties(&self) -> Option<ObjectRef> {
        self.cpp_context_properties
    }

    pub fn set_cpp_context_properties(&mut self, properties: Option<ObjectRef>) {
        self.cpp_context_properties = properties;
        self.modified();
    }

    pub fn qml_component_chain(&self) -> Option<&Arc<QmlComponentChain>> {
        self.component_chain.as_ref()
    }

    pub fn set_qml_component_chain(&mut self, chain: Option<Arc<QmlComponentChain>>) {
        self.component_chain = chain;
        self.modified();
    }

    pub fn qml_scope_objects(&self) -> &[ObjectRef] {
        &self.qml_scope_objects
    }

    pub fn set_qml_scope_objects(&mut self, objects: Vec<ObjectRef>) {
        self.qml_scope_objects = objects;
        self.modified();
    }

    pub fn qml_types(&self) -> Option<&Scope> {
        self.qml_types.as_ref()
    }

    pub fn set_qml_types(&mut self, types: Option<Scope>) {
        self.qml_types = types;
        self.modified();
    }

    pub fn js_imports(&self) -> Option<&Scope> {
        self.js_imports.as_ref()
    }

    pub fn set_js_imports(&mut self, imports: Option<Scope>) {
        self.js_imports = imports;
        self.modified();
    }

    pub fn js_scopes(&self) -> &[ObjectRef] {
        &self.js_scopes
    }

    pub fn set_js_scopes(&mut self, scopes: Vec<ObjectRef>) {
        self.js_scopes = scopes;
        self.modified();
    }

    pub fn append_js_scope(&mut self, scope: ObjectRef) {
        self.js_scopes.push(scope);
        self.modified();
    }

    /// The flattened chain, weakest scope first.
    pub fn all(&self) -> &[Scope] {
        self.all.get_or_init(|| self.flatten())
    }

    fn flatten(&self) -> Vec<Scope> {
        let mut all = Vec::new();
        all.extend(self.global_scope.map(Scope::Object));
        all.extend(self.cpp_context_properties.map(Scope::Object));

        // The top-level scope of a JavaScript file does not see the
        // components instantiating it.
        let js_root_only = self.document.language() == Dialect::JavaScript
            && self.js_scopes.len() == 1;
        if !js_root_only {
            if let Some(chain) = &self.component_chain {
                for parent in chain.instantiating_components() {
                    parent.collect_scopes(&mut all);
                }
            }
        }

        let (root, ids) = match &self.component_chain {
            Some(chain) => {
                let bind = chain.document().bind();
                (bind.root_object(), Some(bind.id_environment()))
            }
            None => (None, None),
        };
        if let Some(root) = root {
            if !self.qml_scope_objects.contains(&root) {
                all.push(Scope::Object(root));
            }
        }
        all.extend(self.qml_scope_objects.iter().copied().map(Scope::Object));
        all.extend(ids.map(Scope::Object));
        all.extend(self.qml_types.clone());
        all.extend(self.js_imports.clone());
        all.extend(self.js_scopes.iter().copied().map(Scope::Object));
        all
    }

    /// Find `name`, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<ScopeMember> {
        self.all().iter().rev().find_map(|scope| {
            let value = match scope {
                Scope::Object(obj) => self.context.lookup_member(*obj, name),
                Scope::TypeScope(file_name) => self
                    .context
                    .imports(file_name)?
                    .type_scope_lookup(name, &self.context)
                    .map(|(value, _)| value),
                Scope::JsImportScope(file_name) => self
                    .context
                    .imports(file_name)?
                    .js_import_lookup(name)
                    .map(|(value, _)| value),
            }?;
            Some(ScopeMember {
                value,
                scope: scope.clone(),
            })
        })
    }

    /// Like [`lookup`](Self::lookup), yielding [`Value::Undefined`] for
    /// unknown names.
    pub fn lookup_value(&self, name: &str) -> Value {
        self.lookup(name).map_or(Value::Undefined, |member| member.value)
    }
}
