//! Syntax tree consumed by the binder.
//!
//! Trees are produced by an external parser and never mutated afterwards.
//! Every node that analysis needs to attach information to carries a
//! [`NodeId`], unique within one parse; side tables are keyed by it.

use smol_str::SmolStr;

use crate::base::SourceLocation;
use crate::imports::ComponentVersion;

/// Identity of a syntax node within one document.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

// ============================================================================
// PROGRAMS
// ============================================================================

/// The root of a parse.
#[derive(Clone, Debug, PartialEq)]
pub enum Program {
    Ui(UiProgram),
    Js(JsProgram),
    /// A bare expression, as parsed for JSON documents.
    Expression(Expr),
}

impl Program {
    pub fn as_ui(&self) -> Option<&UiProgram> {
        match self {
            Program::Ui(program) => Some(program),
            _ => None,
        }
    }

    pub fn as_js(&self) -> Option<&JsProgram> {
        match self {
            Program::Js(program) => Some(program),
            _ => None,
        }
    }
}

/// A QML document: header imports followed by (normally one) root object.
#[derive(Clone, Debug, PartialEq)]
pub struct UiProgram {
    pub id: NodeId,
    pub pragmas: Vec<UiPragma>,
    pub imports: Vec<UiImport>,
    pub members: Vec<UiObjectMember>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UiPragma {
    pub name: SmolStr,
    pub location: SourceLocation,
}

/// `import QtQuick 2.15 as QQ` or `import "dir" as D`.
///
/// A well-formed import has exactly one of `uri` and `file_name`.
#[derive(Clone, Debug, PartialEq)]
pub struct UiImport {
    pub id: NodeId,
    pub uri: Option<UiQualifiedId>,
    pub file_name: Option<SmolStr>,
    pub version: Option<ComponentVersion>,
    pub as_name: Option<SmolStr>,
    pub location: SourceLocation,
}

/// A dotted name such as `QtQuick.Controls` or `anchors.fill`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UiQualifiedId {
    pub names: Vec<SmolStr>,
    pub location: SourceLocation,
}

impl UiQualifiedId {
    pub fn new<I, S>(names: I, location: SourceLocation) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            location,
        }
    }

    pub fn first(&self) -> Option<&SmolStr> {
        self.names.first()
    }

    pub fn last(&self) -> Option<&SmolStr> {
        self.names.last()
    }

    pub fn is_single(&self, name: &str) -> bool {
        self.names.len() == 1 && self.names[0] == name
    }

    pub fn joined(&self) -> String {
        self.names.join(".")
    }
}

// ============================================================================
// QML OBJECT MEMBERS
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum UiObjectMember {
    /// `Type { ... }` or a grouped binding `anchors { ... }`.
    ObjectDefinition(UiObjectDefinition),
    /// `prop: Type { ... }` / `Behavior on x { ... }`.
    ObjectBinding(UiObjectBinding),
    /// `name: <statement>`.
    ScriptBinding(UiScriptBinding),
    /// `name: [ Type {}, Type {} ]`.
    ArrayBinding(UiArrayBinding),
    /// `property T name` / `signal name(...)`.
    PublicMember(UiPublicMember),
    /// `function f() {}` or `var x` inside an object body.
    SourceElement(Statement),
    /// `component Name: Type { ... }`.
    InlineComponent(UiInlineComponent),
    EnumDeclaration(UiEnumDeclaration),
}

#[derive(Clone, Debug, PartialEq)]
pub struct UiObjectDefinition {
    pub id: NodeId,
    pub qualified_type_name: UiQualifiedId,
    pub members: Vec<UiObjectMember>,
    pub location: SourceLocation,
}

impl UiObjectDefinition {
    /// A definition whose type name starts lowercase groups property
    /// bindings of the enclosing object (`anchors { ... }`).
    pub fn is_grouped_binding(&self) -> bool {
        self.qualified_type_name
            .first()
            .and_then(|n| n.chars().next())
            .is_some_and(char::is_lowercase)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UiObjectBinding {
    pub id: NodeId,
    pub qualified_id: UiQualifiedId,
    pub qualified_type_name: UiQualifiedId,
    pub members: Vec<UiObjectMember>,
    pub has_on_token: bool,
    pub location: SourceLocation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UiScriptBinding {
    pub id: NodeId,
    pub qualified_id: UiQualifiedId,
    pub statement: Statement,
    pub location: SourceLocation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UiArrayBinding {
    pub id: NodeId,
    pub qualified_id: UiQualifiedId,
    pub members: Vec<UiObjectMember>,
    pub location: SourceLocation,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PublicMemberKind {
    Property,
    Signal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UiParameter {
    pub name: SmolStr,
    pub type_name: Option<SmolStr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UiPublicMember {
    pub id: NodeId,
    pub kind: PublicMemberKind,
    pub name: SmolStr,
    /// Declared type (`int`, `Item`, `list<Item>`); `None` for signals.
    pub member_type: Option<SmolStr>,
    pub parameters: Vec<UiParameter>,
    pub statement: Option<Statement>,
    /// `property Item foo: Item { ... }`.
    pub binding: Option<Box<UiObjectMember>>,
    pub is_default: bool,
    pub is_readonly: bool,
    pub is_required: bool,
    pub location: SourceLocation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UiInlineComponent {
    pub id: NodeId,
    /// May be dotted when nested inside another inline component.
    pub name: SmolStr,
    pub component: UiObjectDefinition,
    pub location: SourceLocation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UiEnumDeclaration {
    pub id: NodeId,
    pub name: SmolStr,
    pub members: Vec<(SmolStr, Option<f64>)>,
    pub location: SourceLocation,
}

// ============================================================================
// JAVASCRIPT
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct JsProgram {
    pub id: NodeId,
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: NodeId,
    pub statements: Vec<Statement>,
    pub location: SourceLocation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDeclaration {
    pub name: SmolStr,
    pub initializer: Option<Expr>,
    pub location: SourceLocation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub id: NodeId,
    pub name: Option<SmolStr>,
    pub parameters: Vec<SmolStr>,
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Expression(Expr),
    Block(Block),
    Var(Vec<VarDeclaration>),
    FunctionDeclaration(Function),
    If {
        condition: Expr,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    Return(Option<Expr>),
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Identifier {
        id: NodeId,
        name: SmolStr,
        location: SourceLocation,
    },
    String(SmolStr),
    Number(f64),
    Bool(bool),
    Null,
    Member {
        object: Box<Expr>,
        name: SmolStr,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Function(Box<Function>),
    Binary {
        left: Box<Expr>,
        op: SmolStr,
        right: Box<Expr>,
    },
    Array(Vec<Expr>),
    Object(Vec<(SmolStr, Expr)>),
}

impl Expr {
    /// The name of a bare identifier expression.
    pub fn as_identifier(&self) -> Option<&SmolStr> {
        match self {
            Expr::Identifier { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl Statement {
    /// The identifier of `foo` in a statement consisting only of `foo`.
    pub fn as_identifier(&self) -> Option<&SmolStr> {
        match self {
            Statement::Expression(expr) => expr.as_identifier(),
            _ => None,
        }
    }
}
