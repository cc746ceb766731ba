//! Programmatic construction of syntax trees.
//!
//! Used wherever a tree is needed without a real parser: tests, generated
//! documents and [`StaticParser`](super::StaticParser) registrations.
//! Every node receives a fresh [`NodeId`] and a distinct one-byte
//! location so that side tables and diagnostics can be told apart.

use std::cell::Cell;

use smol_str::SmolStr;

use super::ast::*;
use crate::base::{LineCol, SourceLocation, TextRange, TextSize};
use crate::imports::ComponentVersion;

#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: Cell<u32>,
    next_offset: Cell<u32>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_id(&self) -> NodeId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        NodeId(id)
    }

    pub fn loc(&self) -> SourceLocation {
        let offset = self.next_offset.get();
        self.next_offset.set(offset + 1);
        SourceLocation::new(
            TextRange::at(TextSize::from(offset), TextSize::from(1)),
            LineCol::new(0, offset),
        )
    }

    pub fn qualified(&self, dotted: &str) -> UiQualifiedId {
        UiQualifiedId::new(dotted.split('.'), self.loc())
    }

    // ------------------------------------------------------------------------
    // Programs and imports
    // ------------------------------------------------------------------------

    pub fn ui_program(&self, imports: Vec<UiImport>, root: UiObjectMember) -> Program {
        Program::Ui(UiProgram {
            id: self.node_id(),
            pragmas: Vec::new(),
            imports,
            members: vec![root],
        })
    }

    pub fn js_program(&self, statements: Vec<Statement>) -> Program {
        Program::Js(JsProgram {
            id: self.node_id(),
            statements,
        })
    }

    /// `import <uri> <version> [as <alias>]`; an empty version is omitted.
    pub fn import_module(&self, uri: &str, version: &str, as_name: Option<&str>) -> UiImport {
        UiImport {
            id: self.node_id(),
            uri: Some(self.qualified(uri)),
            file_name: None,
            version: (!version.is_empty()).then(|| ComponentVersion::parse(version)),
            as_name: as_name.map(SmolStr::new),
            location: self.loc(),
        }
    }

    /// `import "<path>" [as <alias>]`.
    pub fn import_path(&self, path: &str, as_name: Option<&str>) -> UiImport {
        UiImport {
            id: self.node_id(),
            uri: None,
            file_name: Some(SmolStr::new(path)),
            version: None,
            as_name: as_name.map(SmolStr::new),
            location: self.loc(),
        }
    }

    // ------------------------------------------------------------------------
    // Object members
    // ------------------------------------------------------------------------

    pub fn object_definition(
        &self,
        type_name: &str,
        members: Vec<UiObjectMember>,
    ) -> UiObjectDefinition {
        UiObjectDefinition {
            id: self.node_id(),
            qualified_type_name: self.qualified(type_name),
            members,
            location: self.loc(),
        }
    }

    pub fn object(&self, type_name: &str, members: Vec<UiObjectMember>) -> UiObjectMember {
        UiObjectMember::ObjectDefinition(self.object_definition(type_name, members))
    }

    /// `name: Type { ... }`.
    pub fn object_binding(
        &self,
        name: &str,
        type_name: &str,
        members: Vec<UiObjectMember>,
    ) -> UiObjectMember {
        UiObjectMember::ObjectBinding(UiObjectBinding {
            id: self.node_id(),
            qualified_id: self.qualified(name),
            qualified_type_name: self.qualified(type_name),
            members,
            has_on_token: false,
            location: self.loc(),
        })
    }

    /// `Type on target { ... }`.
    pub fn on_binding(
        &self,
        type_name: &str,
        target: &str,
        members: Vec<UiObjectMember>,
    ) -> UiObjectMember {
        UiObjectMember::ObjectBinding(UiObjectBinding {
            id: self.node_id(),
            qualified_id: self.qualified(target),
            qualified_type_name: self.qualified(type_name),
            members,
            has_on_token: true,
            location: self.loc(),
        })
    }

    pub fn script_binding(&self, name: &str, statement: Statement) -> UiObjectMember {
        UiObjectMember::ScriptBinding(UiScriptBinding {
            id: self.node_id(),
            qualified_id: self.qualified(name),
            statement,
            location: self.loc(),
        })
    }

    /// `id: <name>`.
    pub fn id_binding(&self, name: &str) -> UiObjectMember {
        self.script_binding("id", Statement::Expression(self.ident(name)))
    }

    pub fn array_binding(&self, name: &str, members: Vec<UiObjectMember>) -> UiObjectMember {
        UiObjectMember::ArrayBinding(UiArrayBinding {
            id: self.node_id(),
            qualified_id: self.qualified(name),
            members,
            location: self.loc(),
        })
    }

    pub fn property(
        &self,
        member_type: &str,
        name: &str,
        statement: Option<Statement>,
    ) -> UiObjectMember {
        UiObjectMember::PublicMember(UiPublicMember {
            id: self.node_id(),
            kind: PublicMemberKind::Property,
            name: SmolStr::new(name),
            member_type: Some(SmolStr::new(member_type)),
            parameters: Vec::new(),
            statement,
            binding: None,
            is_default: false,
            is_readonly: false,
            is_required: false,
            location: self.loc(),
        })
    }

    pub fn signal(&self, name: &str, parameters: &[&str]) -> UiObjectMember {
        UiObjectMember::PublicMember(UiPublicMember {
            id: self.node_id(),
            kind: PublicMemberKind::Signal,
            name: SmolStr::new(name),
            member_type: None,
            parameters: parameters
                .iter()
                .map(|p| UiParameter {
                    name: SmolStr::new(p),
                    type_name: None,
                })
                .collect(),
            statement: None,
            binding: None,
            is_default: false,
            is_readonly: false,
            is_required: false,
            location: self.loc(),
        })
    }

    pub fn inline_component(&self, name: &str, component: UiObjectDefinition) -> UiObjectMember {
        UiObjectMember::InlineComponent(UiInlineComponent {
            id: self.node_id(),
            name: SmolStr::new(name),
            component,
            location: self.loc(),
        })
    }

    pub fn enum_declaration(&self, name: &str, members: &[&str]) -> UiObjectMember {
        UiObjectMember::EnumDeclaration(UiEnumDeclaration {
            id: self.node_id(),
            name: SmolStr::new(name),
            members: members.iter().map(|m| (SmolStr::new(m), None)).collect(),
            location: self.loc(),
        })
    }

    /// `function name(params) { body }` as an object member.
    pub fn function_member(&self, name: &str, parameters: &[&str], body: Vec<Statement>) -> UiObjectMember {
        UiObjectMember::SourceElement(Statement::FunctionDeclaration(self.function(
            Some(name),
            parameters,
            body,
        )))
    }

    // ------------------------------------------------------------------------
    // JavaScript
    // ------------------------------------------------------------------------

    pub fn function(&self, name: Option<&str>, parameters: &[&str], body: Vec<Statement>) -> Function {
        Function {
            id: self.node_id(),
            name: name.map(SmolStr::new),
            parameters: parameters.iter().map(|p| SmolStr::new(p)).collect(),
            body,
            location: self.loc(),
        }
    }

    pub fn function_expr(&self, parameters: &[&str], body: Vec<Statement>) -> Expr {
        Expr::Function(Box::new(self.function(None, parameters, body)))
    }

    pub fn ident(&self, name: &str) -> Expr {
        Expr::Identifier {
            id: self.node_id(),
            name: SmolStr::new(name),
            location: self.loc(),
        }
    }

    pub fn member(&self, object: Expr, name: &str) -> Expr {
        Expr::Member {
            object: Box::new(object),
            name: SmolStr::new(name),
        }
    }

    pub fn call(&self, callee: Expr, arguments: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            arguments,
        }
    }

    pub fn expr(&self, expr: Expr) -> Statement {
        Statement::Expression(expr)
    }

    pub fn block(&self, statements: Vec<Statement>) -> Statement {
        Statement::Block(Block {
            id: self.node_id(),
            statements,
            location: self.loc(),
        })
    }

    pub fn var(&self, name: &str, initializer: Option<Expr>) -> Statement {
        Statement::Var(vec![VarDeclaration {
            name: SmolStr::new(name),
            initializer,
            location: self.loc(),
        }])
    }

    pub fn function_declaration(&self, name: &str, parameters: &[&str], body: Vec<Statement>) -> Statement {
        Statement::FunctionDeclaration(self.function(Some(name), parameters, body))
    }

    pub fn ret(&self, expr: Option<Expr>) -> Statement {
        Statement::Return(expr)
    }
}
