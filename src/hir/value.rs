//! The object/value graph.
//!
//! Objects live in a [`ValueOwner`] arena and refer to each other through
//! [`ObjectRef`] handles: prototypes, member targets and scope parents are
//! all plain indices. A document's binder owns one arena; a link pass owns
//! another for the import namespaces and C++ types it materializes.

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::ids::{ObjectRef, OwnerId};
use crate::syntax::NodeId;

// ============================================================================
// VALUES
// ============================================================================

/// What a member or lookup resolves to.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Undefined,
    /// Exists, but nothing is known about it (function parameters).
    Unknown,
    Null,
    Number,
    Boolean,
    String,
    Object(ObjectRef),
    /// A `var` declared in JavaScript.
    Variable { name: SmolStr },
    /// A declared QML property.
    Property { type_name: SmolStr, read_only: bool },
    Signal { parameters: Vec<SmolStr> },
    /// `onFoo` for signal `foo`.
    SignalHandler { signal: SmolStr },
    /// A method exposed from C++.
    Method { parameters: Vec<SmolStr> },
}

impl Value {
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(obj) => Some(*obj),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }
}

// ============================================================================
// OBJECTS
// ============================================================================

/// What an object stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Plain,
    /// One QML object instantiation.
    QmlObject,
    /// A JavaScript function/block scope or a JS file's root scope.
    Scope,
    Function,
    /// The document-wide `id` namespace.
    IdEnvironment,
    Enum,
    /// The namespace object of a resolved import.
    Import,
    /// A type exported from C++.
    CppComponent,
    Global,
    ContextProperties,
}

/// Where an object inherits from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Prototype {
    #[default]
    None,
    Object(ObjectRef),
    /// A QML type name, resolved lazily against the imports of `document`.
    QmlType {
        document: SmolStr,
        names: Vec<SmolStr>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectValue {
    pub class_name: SmolStr,
    pub kind: ObjectKind,
    pub prototype: Prototype,
    /// Syntax node this object was created for, if any.
    pub node: Option<NodeId>,
    members: IndexMap<SmolStr, Value>,
}

impl ObjectValue {
    pub fn new(class_name: impl Into<SmolStr>, kind: ObjectKind) -> Self {
        Self {
            class_name: class_name.into(),
            kind,
            prototype: Prototype::None,
            node: None,
            members: IndexMap::new(),
        }
    }

    /// Own member, not following the prototype.
    pub fn member(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn set_member(&mut self, name: impl Into<SmolStr>, value: Value) {
        self.members.insert(name.into(), value);
    }

    pub fn remove_member(&mut self, name: &str) -> Option<Value> {
        self.members.shift_remove(name)
    }

    /// Members in insertion order.
    pub fn members(&self) -> impl Iterator<Item = (&SmolStr, &Value)> {
        self.members.iter()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

// ============================================================================
// OWNER
// ============================================================================

/// Arena owning every object of one document or one link pass.
#[derive(Debug)]
pub struct ValueOwner {
    id: OwnerId,
    objects: Vec<ObjectValue>,
}

impl Default for ValueOwner {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueOwner {
    pub fn new() -> Self {
        Self::with_id(OwnerId::fresh())
    }

    pub(crate) fn with_id(id: OwnerId) -> Self {
        Self {
            id,
            objects: Vec::new(),
        }
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn new_object(&mut self, class_name: impl Into<SmolStr>, kind: ObjectKind) -> ObjectRef {
        self.insert(ObjectValue::new(class_name, kind))
    }

    pub fn insert(&mut self, object: ObjectValue) -> ObjectRef {
        let index = self.objects.len() as u32;
        self.objects.push(object);
        ObjectRef::new(self.id, index)
    }

    /// The object behind `obj`, if it belongs to this arena.
    pub fn get(&self, obj: ObjectRef) -> Option<&ObjectValue> {
        if obj.owner != self.id {
            return None;
        }
        self.objects.get(obj.index as usize)
    }

    pub fn get_mut(&mut self, obj: ObjectRef) -> Option<&mut ObjectValue> {
        if obj.owner != self.id {
            return None;
        }
        self.objects.get_mut(obj.index as usize)
    }

    /// Set a member; a handle from another arena is ignored.
    pub fn set_member(&mut self, obj: ObjectRef, name: impl Into<SmolStr>, value: Value) {
        if let Some(object) = self.get_mut(obj) {
            object.set_member(name, value);
        }
    }

    pub fn set_prototype(&mut self, obj: ObjectRef, prototype: Prototype) {
        if let Some(object) = self.get_mut(obj) {
            object.prototype = prototype;
        }
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectRef, &ObjectValue)> {
        let id = self.id;
        self.objects
            .iter()
            .enumerate()
            .map(move |(i, o)| (ObjectRef::new(id, i as u32), o))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_keep_insertion_order() {
        let mut owner = ValueOwner::new();
        let obj = owner.new_object("Item", ObjectKind::QmlObject);
        owner.set_member(obj, "width", Value::Number);
        owner.set_member(obj, "height", Value::Number);
        owner.set_member(obj, "width", Value::Unknown);

        let names: Vec<&str> = owner.get(obj).unwrap().members().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["width", "height"]);
        assert_eq!(owner.get(obj).unwrap().member("width"), Some(&Value::Unknown));
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut a = ValueOwner::new();
        let b = ValueOwner::new();
        let obj = a.new_object("A", ObjectKind::Plain);
        assert!(b.get(obj).is_none());
        assert!(a.get(obj).is_some());
    }

    #[test]
    fn test_prototype_handles() {
        let mut owner = ValueOwner::new();
        let base = owner.new_object("Base", ObjectKind::Plain);
        let derived = owner.new_object("Derived", ObjectKind::Plain);
        owner.set_prototype(derived, Prototype::Object(base));
        assert_eq!(owner.get(derived).unwrap().prototype, Prototype::Object(base));
        assert_eq!(owner.objects().count(), 2);
    }
}
