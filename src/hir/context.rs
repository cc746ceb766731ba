//! The result of linking a snapshot.
//!
//! A [`Context`] owns the link pass's object arena and the resolved
//! [`Imports`] of every document, and answers type and member lookups
//! across document arenas.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use super::diagnostics::Diagnostic;
use super::document::Document;
use super::ids::{ObjectRef, OwnerId};
use super::imports::Imports;
use super::snapshot::Snapshot;
use super::value::{ObjectValue, Prototype, Value, ValueOwner};
use crate::imports::ViewerContext;

/// Objects whose QML prototype is being resolved further up the stack.
#[derive(Debug, Default)]
pub(crate) struct Resolving {
    prototypes: FxHashSet<ObjectRef>,
}

#[derive(Debug)]
pub struct Context {
    pub(crate) snapshot: Snapshot,
    pub(crate) vctx: ViewerContext,
    pub(crate) owner: ValueOwner,
    pub(crate) imports: FxHashMap<SmolStr, Imports>,
    pub(crate) global: ObjectRef,
    pub(crate) cpp_context_properties: Option<ObjectRef>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Arena of every document's binder, by document file name.
    pub(crate) owners: FxHashMap<OwnerId, SmolStr>,
}

impl Context {
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn viewer_context(&self) -> &ViewerContext {
        &self.vctx
    }

    /// Arena of the objects the link pass created.
    pub fn owner(&self) -> &ValueOwner {
        &self.owner
    }

    pub fn global_object(&self) -> ObjectRef {
        self.global
    }

    pub fn cpp_context_properties(&self) -> Option<ObjectRef> {
        self.cpp_context_properties
    }

    /// Resolved imports of the document `file_name`.
    pub fn imports(&self, file_name: &str) -> Option<&Imports> {
        self.imports.get(file_name)
    }

    /// Every link diagnostic, in document order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn diagnostics_for(&self, file_name: &str) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| &*d.path == file_name)
    }

    /// The document whose binder created `obj`.
    pub fn document_for_object(&self, obj: ObjectRef) -> Option<&std::sync::Arc<Document>> {
        let file_name = self.owners.get(&obj.owner)?;
        self.snapshot.document(file_name)
    }

    /// Resolve a handle from any arena reachable from this context.
    pub fn object(&self, obj: ObjectRef) -> Option<&ObjectValue> {
        if obj.owner == self.owner.id() {
            return self.owner.get(obj);
        }
        self.document_for_object(obj)?.bind().object(obj)
    }

    /// The object `obj` inherits from, resolving QML type names lazily.
    pub fn prototype_of(&self, obj: ObjectRef) -> Option<ObjectRef> {
        self.prototype_in(obj, &mut Resolving::default())
    }

    /// Resolve a possibly qualified type name (`Controls.Button`) as seen
    /// from the document `file_name`.
    pub fn lookup_type<S: AsRef<str>>(&self, file_name: &str, names: &[S]) -> Option<ObjectRef> {
        self.lookup_type_in(file_name, names, &mut Resolving::default())
    }

    /// Find `name` on `obj` or along its prototype chain.
    pub fn lookup_member(&self, obj: ObjectRef, name: &str) -> Option<Value> {
        self.lookup_member_with_owner(obj, name).map(|(value, _)| value)
    }

    /// Like [`lookup_member`](Self::lookup_member), also returning the
    /// object the member was found on.
    pub fn lookup_member_with_owner(&self, obj: ObjectRef, name: &str) -> Option<(Value, ObjectRef)> {
        self.lookup_member_in(obj, name, &mut Resolving::default())
    }

    // ========================================================================
    // RESOLUTION WITH A SHARED GUARD
    // ========================================================================

    fn prototype_in(&self, obj: ObjectRef, resolving: &mut Resolving) -> Option<ObjectRef> {
        match &self.object(obj)?.prototype {
            Prototype::None => None,
            Prototype::Object(proto) => Some(*proto),
            Prototype::QmlType { document, names } => {
                // A type name that resolves through the object itself
                // (`A.Foo` inside `A.qml`) has no prototype.
                if !resolving.prototypes.insert(obj) {
                    return None;
                }
                let resolved = self.lookup_type_in(document, names, resolving);
                resolving.prototypes.remove(&obj);
                resolved
            }
        }
    }

    fn lookup_type_in<S: AsRef<str>>(
        &self,
        file_name: &str,
        names: &[S],
        resolving: &mut Resolving,
    ) -> Option<ObjectRef> {
        let (first, rest) = names.split_first()?;
        let first = first.as_ref();
        let inline = self
            .snapshot
            .document(file_name)
            .and_then(|doc| doc.bind().inline_components().get(first).copied());
        let mut obj = match inline {
            Some(obj) => obj,
            None => {
                let imports = self.imports(file_name)?;
                imports
                    .type_scope_lookup_in(first, self, resolving)?
                    .0
                    .as_object()?
            }
        };
        for name in rest {
            obj = self.lookup_member_in(obj, name.as_ref(), resolving)?.0.as_object()?;
        }
        Some(obj)
    }

    pub(crate) fn lookup_member_in(
        &self,
        obj: ObjectRef,
        name: &str,
        resolving: &mut Resolving,
    ) -> Option<(Value, ObjectRef)> {
        let mut visited = FxHashSet::default();
        let mut current = obj;
        loop {
            if !visited.insert(current) {
                return None;
            }
            if let Some(value) = self.object(current)?.member(name) {
                return Some((value.clone(), current));
            }
            current = self.prototype_in(current, resolving)?;
        }
    }

    /// Whether `obj` has `ancestor` on its prototype chain (or is it).
    pub fn inherits(&self, obj: ObjectRef, ancestor: ObjectRef) -> bool {
        let mut visited = FxHashSet::default();
        let mut current = Some(obj);
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            if !visited.insert(cur) {
                return false;
            }
            current = self.prototype_of(cur);
        }
        false
    }
}
