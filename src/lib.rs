//! # qmljs-base
//!
//! Import resolution, binding and scope-chain construction for QML and
//! JavaScript documents.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! project → configuration, loading from disk, published snapshots
//!   ↓
//! hir     → documents, snapshots, Bind, Link, ScopeChain
//!   ↓
//! syntax  → syntax-tree interface consumed from the external parser
//!   ↓
//! imports → import keys, versions, the dependency index
//!   ↓
//! base    → primitives (SourceLocation, LineIndex, Dialect)
//! ```

/// Foundation types: source locations, dialects
pub mod base;

/// Import keys, matching and the dependency index
pub mod imports;

/// Syntax trees and the parser boundary
pub mod syntax;

/// Semantic model: documents, snapshots, binding, linking, scope chains
pub mod hir;

/// Configuration and workspace loading
pub mod project;

pub use base::{Dialect, LineCol, LineIndex, SourceLocation, TextRange, TextSize};
pub use imports::{ComponentVersion, ImportDependencies, ImportKey, ImportType, ViewerContext};
