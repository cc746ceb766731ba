//! Semantic model: documents, libraries, snapshots, binding and linking.
//!
//! ## Layers
//!
//! ```text
//! ScopeChain   → name lookup for one document under one Context
//!   ↓
//! Link/Context → imports resolved into namespace objects
//!   ↓
//! Snapshot     → documents + libraries + dependency index
//!   ↓
//! Document     → parse output + Bind (per-document object graph)
//! ```
//!
//! Documents and snapshots are immutable once built and can be shared
//! across threads. Every pass reports problems as [`Diagnostic`]s instead
//! of failing.

mod bind;
mod context;
mod cpp_types;
mod diagnostics;
mod document;
mod environment;
mod ids;
mod imports;
mod library;
mod link;
mod scope_chain;
mod snapshot;
mod value;

pub use bind::{Bind, BindInput};
pub use context::Context;
pub use cpp_types::{CppQmlTypes, DEFAULT_PACKAGE, default_qt_objects};
pub use diagnostics::{Diagnostic, DiagnosticCollector, RelatedInfo, Severity, codes};
pub use document::Document;
pub use environment::{
    Environment, FileProbe, FsProbe, MemoryProbe, PathKind, PluginDumper, QrcTable, base_name,
    clean_path, directory_of, join_path,
};
pub use ids::{ObjectRef, OwnerId};
pub use imports::{Import, ImportInfo, Imports};
pub use library::{
    FakeEnum, FakeExport, FakeMetaObject, FakeMethod, FakeProperty, ImportFlags, LibraryInfo,
    LibraryStatus, ModuleApiInfo, PluginTypeInfoStatus, QmldirComponent, QmldirImport,
    QmldirPlugin,
};
pub use link::{Link, module_paths};
pub use scope_chain::{QmlComponentChain, Scope, ScopeChain, ScopeMember};
pub use snapshot::Snapshot;
pub use value::{ObjectKind, ObjectValue, Prototype, Value, ValueOwner};
