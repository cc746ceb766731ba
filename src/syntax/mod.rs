//! Syntax trees and the parser boundary.
//!
//! - [`ast`] - Node types for QML programs and the JavaScript subset the
//!   binder walks
//! - [`Parser`] - Trait implemented by the external parser
//! - [`AstBuilder`] - Builds trees in code

pub mod ast;
mod builder;
mod parser;

pub use ast::{NodeId, Program};
pub use builder::AstBuilder;
pub use parser::{
    Comment, Directive, ParseGoal, ParseOutput, Parser, StaticParser, SyntaxError,
    collect_comments, collect_directives,
};
