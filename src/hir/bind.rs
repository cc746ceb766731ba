//! Binding: one walk over a document's syntax tree.
//!
//! [`Bind`] turns a parsed document into its object graph: one object per
//! QML instantiation, one scope object per JavaScript function or binding
//! block, the document-wide id environment, and the list of import
//! declarations. Types are not resolved here; each QML object only records
//! the type name it was instantiated from, which linking resolves later.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use super::context::Context;
use super::diagnostics::{Diagnostic, DiagnosticCollector, codes};
use super::environment::{Environment, directory_of};
use super::ids::ObjectRef;
use super::imports::ImportInfo;
use super::value::{ObjectKind, ObjectValue, Prototype, Value, ValueOwner};
use crate::base::{Dialect, SourceLocation};
use crate::imports::ComponentVersion;
use crate::syntax::ast::*;
use crate::syntax::{Directive, NodeId, Program};

/// What binding needs to know about the document being bound.
#[derive(Clone, Copy, Debug)]
pub struct BindInput<'a> {
    pub file_name: &'a str,
    pub component_name: &'a str,
    pub language: Dialect,
    pub program: Option<&'a Program>,
    pub directives: &'a [Directive],
}

/// The object graph of one document.
#[derive(Debug)]
pub struct Bind {
    owner: ValueOwner,
    root_object: Option<ObjectRef>,
    id_environment: ObjectRef,
    qml_objects: FxHashMap<NodeId, ObjectRef>,
    attached_js_scopes: FxHashMap<NodeId, ObjectRef>,
    grouped_property_bindings: FxHashSet<NodeId>,
    qml_objects_by_prototype_name: FxHashMap<SmolStr, Vec<ObjectRef>>,
    inline_components: IndexMap<SmolStr, ObjectRef>,
    imports: Vec<ImportInfo>,
    diagnostics: Vec<Diagnostic>,
    detected_dialect: Option<Dialect>,
    is_js_library: bool,
}

impl Bind {
    pub fn new(input: BindInput<'_>, env: &Environment) -> Self {
        let mut owner = ValueOwner::new();
        let id_environment = owner.new_object("", ObjectKind::IdEnvironment);
        let bind = Bind {
            owner,
            root_object: None,
            id_environment,
            qml_objects: FxHashMap::default(),
            attached_js_scopes: FxHashMap::default(),
            grouped_property_bindings: FxHashSet::default(),
            qml_objects_by_prototype_name: FxHashMap::default(),
            inline_components: IndexMap::new(),
            imports: Vec::new(),
            diagnostics: Vec::new(),
            detected_dialect: None,
            is_js_library: false,
        };
        let mut binder = Binder {
            env,
            input,
            doc_dir: directory_of(input.file_name),
            bind,
            current: None,
            inline_component_name: None,
            depth: 0,
            depth_reported: false,
            diagnostics: DiagnosticCollector::new(),
        };
        binder.run();
        let mut bind = binder.bind;
        bind.diagnostics = binder.diagnostics.take();
        bind
    }

    /// The arena holding this document's objects.
    pub fn owner(&self) -> &ValueOwner {
        &self.owner
    }

    pub fn object(&self, obj: ObjectRef) -> Option<&ObjectValue> {
        self.owner.get(obj)
    }

    /// The first top-level QML object, or the root scope of a JS file.
    pub fn root_object(&self) -> Option<ObjectRef> {
        self.root_object
    }

    pub fn id_environment(&self) -> ObjectRef {
        self.id_environment
    }

    /// The object created for a QML object definition or binding node.
    pub fn find_qml_object(&self, node: NodeId) -> Option<ObjectRef> {
        self.qml_objects.get(&node).copied()
    }

    /// The scope attached to a function, script binding or property node.
    pub fn find_attached_js_scope(&self, node: NodeId) -> Option<ObjectRef> {
        self.attached_js_scopes.get(&node).copied()
    }

    pub fn is_grouped_property_binding(&self, node: NodeId) -> bool {
        self.grouped_property_bindings.contains(&node)
    }

    /// Inline component roots by (possibly dotted) name.
    pub fn inline_components(&self) -> &IndexMap<SmolStr, ObjectRef> {
        &self.inline_components
    }

    /// Import declarations in lookup order.
    pub fn imports(&self) -> &[ImportInfo] {
        &self.imports
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The dialect the document turned out to be written in, when its
    /// imports say more than its file name.
    pub fn detected_dialect(&self) -> Option<Dialect> {
        self.detected_dialect
    }

    /// Whether a JS document declared `.pragma library`.
    pub fn is_js_library(&self) -> bool {
        self.is_js_library
    }

    /// Whether some object in this document is instantiated from the type
    /// `prototype` resolves to under `ctx`.
    pub fn uses_qml_prototype(&self, prototype: ObjectRef, ctx: &Context) -> bool {
        let Some(proto) = ctx.object(prototype) else {
            return false;
        };
        if proto.class_name.is_empty() {
            return false;
        }
        self.qml_objects_by_prototype_name
            .get(&proto.class_name)
            .is_some_and(|objects| {
                objects
                    .iter()
                    .any(|&obj| ctx.prototype_of(obj) == Some(prototype))
            })
    }
}

// ============================================================================
// BINDER
// ============================================================================

struct Binder<'a> {
    env: &'a Environment,
    input: BindInput<'a>,
    doc_dir: &'a str,
    bind: Bind,
    /// Object receiving members: a QML object or a JS scope. `None` inside
    /// grouped property bindings.
    current: Option<ObjectRef>,
    inline_component_name: Option<SmolStr>,
    depth: u32,
    depth_reported: bool,
    diagnostics: DiagnosticCollector,
}

fn member_location(member: &UiObjectMember) -> SourceLocation {
    match member {
        UiObjectMember::ObjectDefinition(def) => def.location,
        UiObjectMember::ObjectBinding(b) => b.location,
        UiObjectMember::ScriptBinding(b) => b.location,
        UiObjectMember::ArrayBinding(b) => b.location,
        UiObjectMember::PublicMember(m) => m.location,
        UiObjectMember::InlineComponent(c) => c.location,
        UiObjectMember::EnumDeclaration(e) => e.location,
        UiObjectMember::SourceElement(Statement::FunctionDeclaration(f)) => f.location,
        UiObjectMember::SourceElement(_) => SourceLocation::default(),
    }
}

fn capitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Binder<'_> {
    fn run(&mut self) {
        let input = self.input;
        for directive in input.directives {
            self.bind_directive(directive);
        }
        match input.program {
            Some(Program::Ui(program)) => self.bind_ui_program(program),
            Some(Program::Js(program)) => {
                let scope = self.bind.owner.new_object("", ObjectKind::Scope);
                self.bind.root_object = Some(scope);
                self.current = Some(scope);
                for stmt in &program.statements {
                    self.walk_statement(stmt);
                }
                self.current = None;
            }
            Some(Program::Expression(expr)) => self.walk_expr(expr),
            None => {}
        }
    }

    /// Increase the walk depth; false once the limit is hit, in which case
    /// the caller must not descend.
    fn enter(&mut self, location: SourceLocation) -> bool {
        if self.depth >= self.env.max_bind_depth() {
            if !self.depth_reported {
                self.depth_reported = true;
                self.diagnostics.max_recursion(self.input.file_name, location);
            }
            return false;
        }
        self.depth += 1;
        true
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ------------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------------

    fn bind_directive(&mut self, directive: &Directive) {
        match directive {
            Directive::PragmaLibrary { .. } => self.bind.is_js_library = true,
            Directive::ImportFile {
                file_name,
                as_name,
                location,
            } => {
                let info = ImportInfo::path(
                    self.doc_dir,
                    file_name,
                    ComponentVersion::none(),
                    as_name,
                    *location,
                    None,
                    self.env,
                );
                self.bind.imports.push(info);
            }
            Directive::ImportModule {
                uri,
                version,
                as_name,
                location,
            } => {
                let uri = self.env.map_module(uri);
                let info = ImportInfo::module(uri, *version, as_name, *location, None);
                self.bind.imports.push(info);
            }
        }
    }

    fn bind_import(&mut self, import: &UiImport) {
        let version = import.version.unwrap_or_default();
        let as_name = import.as_name.as_deref().unwrap_or("");
        if let Some(uri) = &import.uri {
            let joined = uri.joined();
            let name = self.env.map_module(&joined);
            let info = ImportInfo::module(name, version, as_name, import.location, Some(import.id));
            if name == "QtQuick" {
                if self.input.language == Dialect::Qml && (version.major >= 2 || !version.is_valid()) {
                    self.bind.detected_dialect = Some(Dialect::QmlQtQuick2);
                }
                self.bind.imports.insert(0, info);
            } else {
                self.bind.imports.push(info);
            }
        } else if let Some(file_name) = &import.file_name {
            let info = ImportInfo::path(
                self.doc_dir,
                file_name,
                version,
                as_name,
                import.location,
                Some(import.id),
                self.env,
            );
            self.bind.imports.push(info);
        } else {
            self.bind
                .imports
                .push(ImportInfo::invalid(import.location, Some(import.id)));
        }
    }

    // ------------------------------------------------------------------------
    // QML
    // ------------------------------------------------------------------------

    fn bind_ui_program(&mut self, program: &UiProgram) {
        for import in &program.imports {
            self.bind_import(import);
        }
        for member in &program.members {
            self.walk_member(member);
        }
    }

    fn walk_member(&mut self, member: &UiObjectMember) {
        if !self.enter(member_location(member)) {
            return;
        }
        self.visit_member(member);
        self.leave();
    }

    fn visit_member(&mut self, member: &UiObjectMember) {
        match member {
            UiObjectMember::ObjectDefinition(def) => self.bind_object_definition(def),
            UiObjectMember::ObjectBinding(binding) => {
                let obj = self.bind_object(&binding.qualified_type_name, &binding.members, binding.id);
                self.bind.qml_objects.insert(binding.id, obj);
            }
            UiObjectMember::ScriptBinding(binding) => self.bind_script_binding(binding),
            UiObjectMember::ArrayBinding(binding) => {
                for member in &binding.members {
                    self.walk_member(member);
                }
            }
            UiObjectMember::PublicMember(member) => self.bind_public_member(member),
            UiObjectMember::SourceElement(stmt) => self.walk_statement(stmt),
            UiObjectMember::InlineComponent(component) => self.bind_inline_component(component),
            UiObjectMember::EnumDeclaration(decl) => self.bind_enum(decl),
        }
    }

    fn bind_object_definition(&mut self, def: &UiObjectDefinition) {
        if def.is_grouped_binding() {
            self.bind.grouped_property_bindings.insert(def.id);
            let saved = self.current.take();
            for member in &def.members {
                self.walk_member(member);
            }
            self.current = saved;
        } else {
            let obj = self.bind_object(&def.qualified_type_name, &def.members, def.id);
            self.bind.qml_objects.insert(def.id, obj);
        }
    }

    fn bind_object(
        &mut self,
        type_name: &UiQualifiedId,
        members: &[UiObjectMember],
        node: NodeId,
    ) -> ObjectRef {
        let mut value = ObjectValue::new(
            type_name.last().cloned().unwrap_or_default(),
            ObjectKind::QmlObject,
        );
        value.node = Some(node);
        value.prototype = Prototype::QmlType {
            document: SmolStr::new(self.input.file_name),
            names: type_name.names.clone(),
        };
        let obj = self.bind.owner.insert(value);
        if let Some(last) = type_name.last().filter(|n| !n.is_empty()) {
            self.bind
                .qml_objects_by_prototype_name
                .entry(last.clone())
                .or_default()
                .push(obj);
        }

        let parent = self.current.replace(obj);
        match parent {
            Some(parent) => self.bind.owner.set_member(obj, "parent", Value::Object(parent)),
            None if self.bind.root_object.is_none() => {
                self.bind.root_object = Some(obj);
                let class_name = match &self.inline_component_name {
                    Some(name) => name.rsplit('.').next().map(SmolStr::new).unwrap_or_default(),
                    None => SmolStr::new(self.input.component_name),
                };
                if let Some(root) = self.bind.owner.get_mut(obj) {
                    root.class_name = class_name;
                }
            }
            None => {}
        }
        for member in members {
            self.walk_member(member);
        }
        self.current = parent;
        obj
    }

    fn bind_script_binding(&mut self, binding: &UiScriptBinding) {
        if binding.qualified_id.is_single("id") {
            if let (Some(name), Some(current)) = (binding.statement.as_identifier(), self.current) {
                self.bind
                    .owner
                    .set_member(self.bind.id_environment, name.clone(), Value::Object(current));
            }
        }
        self.bind_attached_statement(binding.id, &binding.statement);
    }

    /// A block statement gets its own scope, keyed by the owning binding
    /// node rather than the block.
    fn bind_attached_statement(&mut self, owner_node: NodeId, statement: &Statement) {
        if let Statement::Block(block) = statement {
            let scope = self.bind.owner.new_object("", ObjectKind::Scope);
            self.bind.attached_js_scopes.insert(owner_node, scope);
            let parent = self.current.replace(scope);
            for stmt in &block.statements {
                self.walk_statement(stmt);
            }
            self.current = parent;
        } else {
            self.walk_statement(statement);
        }
    }

    fn bind_public_member(&mut self, member: &UiPublicMember) {
        if let Some(current) = self.current {
            match member.kind {
                PublicMemberKind::Property => {
                    let type_name = member.member_type.clone().unwrap_or_default();
                    self.bind.owner.set_member(
                        current,
                        member.name.clone(),
                        Value::Property {
                            type_name,
                            read_only: member.is_readonly,
                        },
                    );
                    let changed = format!("{}Changed", member.name);
                    let handler = format!("on{}", capitalized(&changed));
                    self.bind.owner.set_member(
                        current,
                        changed.as_str(),
                        Value::Signal { parameters: Vec::new() },
                    );
                    self.bind.owner.set_member(
                        current,
                        handler,
                        Value::SignalHandler {
                            signal: SmolStr::new(changed),
                        },
                    );
                }
                PublicMemberKind::Signal => {
                    let parameters = member.parameters.iter().map(|p| p.name.clone()).collect();
                    self.bind
                        .owner
                        .set_member(current, member.name.clone(), Value::Signal { parameters });
                    self.bind.owner.set_member(
                        current,
                        format!("on{}", capitalized(&member.name)),
                        Value::SignalHandler {
                            signal: member.name.clone(),
                        },
                    );
                }
            }
        }
        if let Some(statement) = &member.statement {
            self.bind_attached_statement(member.id, statement);
        }
        if let Some(binding) = &member.binding {
            self.walk_member(binding);
        }
    }

    fn bind_inline_component(&mut self, component: &UiInlineComponent) {
        let enclosing_name = self.inline_component_name.clone();
        let enclosing_root = self.bind.root_object;
        let full_name = match &enclosing_name {
            Some(outer) => {
                self.diagnostics.add(
                    Diagnostic::error(
                        self.input.file_name,
                        component.location,
                        "Nested inline components are not supported",
                    )
                    .with_code(codes::NESTED_INLINE_COMPONENT),
                );
                SmolStr::new(format!("{outer}.{}", component.name))
            }
            None => component.name.clone(),
        };

        self.inline_component_name = Some(full_name.clone());
        self.bind.root_object = None;
        let saved_current = self.current.take();
        let obj = self.bind_object(
            &component.component.qualified_type_name,
            &component.component.members,
            component.component.id,
        );
        self.bind.qml_objects.insert(component.component.id, obj);
        self.current = saved_current;
        self.bind.root_object = enclosing_root;
        self.inline_component_name = enclosing_name;

        // The enclosing root is the parent inline component when nested,
        // otherwise the document root.
        let member_name = full_name.rsplit('.').next().unwrap_or(&full_name).to_string();
        if let Some(parent) = enclosing_root {
            self.bind.owner.set_member(parent, member_name, Value::Object(obj));
        }
        self.bind.inline_components.insert(full_name, obj);
    }

    fn bind_enum(&mut self, decl: &UiEnumDeclaration) {
        let Some(current) = self.current else {
            return;
        };
        let enum_obj = self.bind.owner.new_object(decl.name.clone(), ObjectKind::Enum);
        for (key, _) in &decl.members {
            self.bind.owner.set_member(enum_obj, key.clone(), Value::Number);
        }
        self.bind
            .owner
            .set_member(current, decl.name.clone(), Value::Object(enum_obj));
    }

    // ------------------------------------------------------------------------
    // JavaScript
    // ------------------------------------------------------------------------

    fn walk_statement(&mut self, stmt: &Statement) {
        let location = match stmt {
            Statement::FunctionDeclaration(f) => f.location,
            Statement::Block(b) => b.location,
            _ => SourceLocation::default(),
        };
        if !self.enter(location) {
            return;
        }
        match stmt {
            Statement::Expression(expr) => self.walk_expr(expr),
            Statement::Block(block) => {
                for stmt in &block.statements {
                    self.walk_statement(stmt);
                }
            }
            Statement::Var(decls) => {
                for decl in decls {
                    if let Some(current) = self.current {
                        self.bind.owner.set_member(
                            current,
                            decl.name.clone(),
                            Value::Variable {
                                name: decl.name.clone(),
                            },
                        );
                    }
                    if let Some(init) = &decl.initializer {
                        self.walk_expr(init);
                    }
                }
            }
            Statement::FunctionDeclaration(function) => self.bind_function(function, true),
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.walk_expr(condition);
                self.walk_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.walk_statement(else_branch);
                }
            }
            Statement::Return(expr) => {
                if let Some(expr) = expr {
                    self.walk_expr(expr);
                }
            }
            Statement::Empty => {}
        }
        self.leave();
    }

    fn walk_expr(&mut self, expr: &Expr) {
        if !self.enter(SourceLocation::default()) {
            return;
        }
        match expr {
            Expr::Function(function) => self.bind_function(function, false),
            Expr::Member { object, .. } => self.walk_expr(object),
            Expr::Call { callee, arguments } => {
                self.walk_expr(callee);
                for arg in arguments {
                    self.walk_expr(arg);
                }
            }
            Expr::Binary { left, right, .. } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            Expr::Array(items) => {
                for item in items {
                    self.walk_expr(item);
                }
            }
            Expr::Object(props) => {
                for (_, value) in props {
                    self.walk_expr(value);
                }
            }
            Expr::Identifier { .. }
            | Expr::String(_)
            | Expr::Number(_)
            | Expr::Bool(_)
            | Expr::Null => {}
        }
        self.leave();
    }

    fn bind_function(&mut self, function: &Function, declaration: bool) {
        let mut value = ObjectValue::new(
            function.name.clone().unwrap_or_default(),
            ObjectKind::Function,
        );
        value.node = Some(function.id);
        let function_obj = self.bind.owner.insert(value);
        if declaration {
            if let (Some(current), Some(name)) = (self.current, &function.name) {
                self.bind
                    .owner
                    .set_member(current, name.clone(), Value::Object(function_obj));
            }
        }

        let scope = self.bind.owner.new_object("", ObjectKind::Scope);
        self.bind.attached_js_scopes.insert(function.id, scope);
        for param in &function.parameters {
            self.bind.owner.set_member(scope, param.clone(), Value::Unknown);
        }
        let arguments = self.bind.owner.new_object("arguments", ObjectKind::Plain);
        self.bind
            .owner
            .set_member(arguments, "callee", Value::Object(function_obj));
        self.bind.owner.set_member(arguments, "length", Value::Number);
        self.bind
            .owner
            .set_member(scope, "arguments", Value::Object(arguments));

        let parent = self.current.replace(scope);
        for stmt in &function.body {
            self.walk_statement(stmt);
        }
        self.current = parent;
    }
}
