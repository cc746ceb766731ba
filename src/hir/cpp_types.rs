//! Types registered from C++.
//!
//! [`CppQmlTypes`] materializes [`FakeMetaObject`]s as objects in a link
//! pass's arena and indexes them by package, QML name and C++ class name.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::trace;

use super::ids::ObjectRef;
use super::library::FakeMetaObject;
use super::value::{ObjectKind, ObjectValue, Prototype, Value, ValueOwner};
use crate::imports::ComponentVersion;

/// Package of exports declared without one.
pub const DEFAULT_PACKAGE: &str = "<default>";

#[derive(Clone, Debug, PartialEq, Eq)]
struct CppComponent {
    type_name: SmolStr,
    version: ComponentVersion,
    object: ObjectRef,
}

#[derive(Clone, Debug, Default)]
pub struct CppQmlTypes {
    by_package: BTreeMap<SmolStr, Vec<CppComponent>>,
    by_cpp_name: FxHashMap<SmolStr, ObjectRef>,
    loaded: BTreeSet<SmolStr>,
    /// Objects whose superclass has not been loaded yet.
    pending_superclasses: Vec<(ObjectRef, SmolStr)>,
}

fn capitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn component_object(meta: &FakeMetaObject, owner: &mut ValueOwner) -> ObjectRef {
    let mut object = ObjectValue::new(meta.class_name.clone(), ObjectKind::CppComponent);
    for prop in &meta.properties {
        object.set_member(
            prop.name.clone(),
            Value::Property {
                type_name: prop.type_name.clone(),
                read_only: prop.read_only,
            },
        );
    }
    for signal in &meta.signals {
        object.set_member(
            signal.name.clone(),
            Value::Signal {
                parameters: signal.parameters.clone(),
            },
        );
        object.set_member(
            format!("on{}", capitalized(&signal.name)),
            Value::SignalHandler {
                signal: signal.name.clone(),
            },
        );
    }
    for method in &meta.methods {
        object.set_member(
            method.name.clone(),
            Value::Method {
                parameters: method.parameters.clone(),
            },
        );
    }
    let obj = owner.insert(object);
    for e in &meta.enums {
        let enum_obj = owner.new_object(e.name.clone(), ObjectKind::Enum);
        for key in &e.keys {
            owner.set_member(enum_obj, key.clone(), Value::Number);
        }
        owner.set_member(obj, e.name.clone(), Value::Object(enum_obj));
    }
    obj
}

impl CppQmlTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize `objects` into `owner`. Loading the same `origin` twice
    /// is a no-op.
    ///
    /// Exports without a package are filed under `override_package`, or
    /// under [`DEFAULT_PACKAGE`] when none is given.
    pub fn load(
        &mut self,
        owner: &mut ValueOwner,
        origin: &str,
        objects: &[Arc<FakeMetaObject>],
        override_package: Option<&str>,
    ) {
        if !self.loaded.insert(SmolStr::new(origin)) {
            return;
        }
        trace!(origin, count = objects.len(), "loading C++ types");
        for meta in objects {
            let object = match self.by_cpp_name.get(&meta.class_name) {
                Some(&existing) => existing,
                None => {
                    let object = component_object(meta, owner);
                    self.by_cpp_name.insert(meta.class_name.clone(), object);
                    if let Some(superclass) = &meta.superclass {
                        self.pending_superclasses.push((object, superclass.clone()));
                    }
                    object
                }
            };
            for export in &meta.exports {
                let package = if !export.package.is_empty() {
                    export.package.clone()
                } else {
                    SmolStr::new(override_package.unwrap_or(DEFAULT_PACKAGE))
                };
                let components = self.by_package.entry(package).or_default();
                let component = CppComponent {
                    type_name: export.type_name.clone(),
                    version: export.version,
                    object,
                };
                if !components.contains(&component) {
                    components.push(component);
                }
            }
        }
        self.resolve_superclasses(owner);
    }

    /// Link every waiting object to its superclass once that is loaded.
    fn resolve_superclasses(&mut self, owner: &mut ValueOwner) {
        let by_cpp_name = &self.by_cpp_name;
        self.pending_superclasses.retain(|(object, superclass)| {
            let Some(&base) = by_cpp_name.get(superclass) else {
                return true;
            };
            if base != *object {
                owner.set_prototype(*object, Prototype::Object(base));
            }
            false
        });
    }

    pub fn has_module(&self, package: &str) -> bool {
        self.by_package.contains_key(package)
    }

    /// The types `import <package> <version>` makes visible, by QML name.
    ///
    /// For every name the highest visible version wins.
    pub fn create_objects_for_import(
        &self,
        package: &str,
        version: ComponentVersion,
    ) -> Vec<(SmolStr, ObjectRef)> {
        let mut best: BTreeMap<SmolStr, (ComponentVersion, ObjectRef)> = BTreeMap::new();
        for component in self.by_package.get(package).into_iter().flatten() {
            if component.version.is_valid() && !component.version.is_visible_at(version) {
                continue;
            }
            match best.get(&component.type_name) {
                Some((v, _)) if *v >= component.version => {}
                _ => {
                    best.insert(
                        component.type_name.clone(),
                        (component.version, component.object),
                    );
                }
            }
        }
        best.into_iter().map(|(name, (_, obj))| (name, obj)).collect()
    }

    pub fn object_by_cpp_name(&self, cpp_name: &str) -> Option<ObjectRef> {
        self.by_cpp_name.get(cpp_name).copied()
    }
}

/// The minimal set of types available when no builtins library has been
/// dumped yet.
pub fn default_qt_objects() -> Vec<Arc<FakeMetaObject>> {
    let v1 = ComponentVersion::new(1, 0);
    vec![
        Arc::new(
            FakeMetaObject::new("QObject")
                .with_export("", "QtObject", v1)
                .with_property("objectName", "string")
                .with_signal("objectNameChanged", &[]),
        ),
        Arc::new(
            FakeMetaObject::new("QQmlComponent")
                .with_superclass("QObject")
                .with_export("", "Component", v1)
                .with_property("progress", "double")
                .with_property("status", "int")
                .with_property("url", "QUrl")
                .with_signal("completed", &[])
                .with_signal("destruction", &[])
                .with_method("createObject", &["parent", "properties"])
                .with_method("errorString", &[])
                .with_enum("Status", &["Null", "Ready", "Loading", "Error"]),
        ),
        Arc::new(
            FakeMetaObject::new("QQmlConnections")
                .with_superclass("QObject")
                .with_export("", "Connections", v1)
                .with_property("target", "QObject")
                .with_property("enabled", "bool")
                .with_property("ignoreUnknownSignals", "bool"),
        ),
        Arc::new(
            FakeMetaObject::new("QQmlBind")
                .with_superclass("QObject")
                .with_export("", "Binding", v1)
                .with_property("target", "QObject")
                .with_property("property", "string")
                .with_property("value", "QVariant")
                .with_property("when", "bool"),
        ),
    ]
}
