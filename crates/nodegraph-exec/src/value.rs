//! Runtime value representation for the flow engine.
//!
//! [`Value`] is the type-erased runtime counterpart to the graph model's
//! [`TypeRef`]s. Scalars are held inline; lists, objects and coroutines are
//! shared handles, so copying a `Value` never copies the referenced state.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use nodegraph_core::id::RootId;
use nodegraph_core::types::{natives, ConstValue, TypeRef};

use crate::host::RuntimeAccessible;
use crate::scheduler::CoroutineRef;

/// Shared, mutable list storage.
pub type ListRef = Arc<Mutex<Vec<Value>>>;

/// Shared handle to a live instance.
pub type ObjectRef = Arc<Mutex<Object>>;

/// A runtime value produced or consumed by node evaluation.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Object(ObjectRef),
    /// A type used as a value.
    Type(TypeRef),
    /// A running cooperative body.
    Coroutine(CoroutineRef),
}

/// A live instance: either interpreted graph state or a compiled object
/// reachable through its member capability.
pub enum Object {
    Graph(GraphObject),
    Native(Box<dyn RuntimeAccessible>),
}

/// State of an interpreted graph instance.
#[derive(Debug, Clone)]
pub struct GraphObject {
    /// Full type of the instance, possibly a generic instantiation.
    pub ty: TypeRef,
    /// Qualified name of the graph that defines the instance's members.
    pub graph_name: String,
    /// Instance variables and auto-property storage, in declaration order.
    pub fields: IndexMap<String, Value>,
    /// Locals that persist across activations, keyed by body and name.
    pub retained_locals: std::collections::HashMap<(RootId, String), Value>,
}

impl GraphObject {
    pub fn new(ty: TypeRef, graph_name: &str) -> Self {
        GraphObject {
            ty,
            graph_name: graph_name.to_string(),
            fields: IndexMap::new(),
            retained_locals: std::collections::HashMap::new(),
        }
    }
}

impl Object {
    /// Canonical type name of the instance.
    pub fn type_name(&self) -> String {
        match self {
            Object::Graph(obj) => obj.ty.to_string(),
            Object::Native(native) => native.type_name().to_string(),
        }
    }

    pub fn as_graph(&self) -> Option<&GraphObject> {
        match self {
            Object::Graph(obj) => Some(obj),
            Object::Native(_) => None,
        }
    }

    pub fn as_graph_mut(&mut self) -> Option<&mut GraphObject> {
        match self {
            Object::Graph(obj) => Some(obj),
            Object::Native(_) => None,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Graph(obj) => obj.fmt(f),
            Object::Native(native) => write!(f, "Native({})", native.type_name()),
        }
    }
}

impl Value {
    /// Converts a model literal into a runtime value.
    pub fn from_const(cv: &ConstValue) -> Value {
        match cv {
            ConstValue::Null => Value::Null,
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::Int(v) => Value::Int(*v),
            ConstValue::Float(v) => Value::Float(*v),
            ConstValue::Str(s) => Value::Str(s.clone()),
        }
    }

    pub fn object(object: Object) -> Value {
        Value::Object(Arc::new(Mutex::new(object)))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(Mutex::new(items)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns a human-readable description of the value's kind.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => natives::BOOL.to_string(),
            Value::Int(_) => natives::INT.to_string(),
            Value::Float(_) => natives::FLOAT.to_string(),
            Value::Str(_) => natives::STRING.to_string(),
            Value::List(_) => TypeRef::list_of(TypeRef::object()).to_string(),
            Value::Object(obj) => obj.lock().type_name(),
            Value::Type(_) => "Type".to_string(),
            Value::Coroutine(_) => natives::ENUMERATOR.to_string(),
        }
    }

    /// The runtime type of the value. List element types are erased to
    /// `object`.
    pub fn type_ref(&self) -> TypeRef {
        match self {
            Value::Null => TypeRef::object(),
            Value::Bool(_) => TypeRef::bool(),
            Value::Int(_) => TypeRef::int(),
            Value::Float(_) => TypeRef::float(),
            Value::Str(_) => TypeRef::string(),
            Value::List(_) => TypeRef::list_of(TypeRef::object()),
            Value::Object(obj) => match &*obj.lock() {
                Object::Graph(g) => g.ty.clone(),
                Object::Native(n) => TypeRef::native(n.type_name()),
            },
            Value::Type(_) => TypeRef::native("Type"),
            Value::Coroutine(_) => TypeRef::native(natives::ENUMERATOR),
        }
    }
}

/// Scalars compare by value, shared handles by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Coroutine(a), Value::Coroutine(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => f.debug_tuple("List").field(&*items.lock()).finish(),
            Value::Object(obj) => write!(f, "Object({})", obj.lock().type_name()),
            Value::Type(ty) => write!(f, "Type({ty})"),
            Value::Coroutine(_) => write!(f, "Coroutine"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.lock().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(obj) => write!(f, "<{}>", obj.lock().type_name()),
            Value::Type(ty) => write!(f, "{ty}"),
            Value::Coroutine(_) => write!(f, "<coroutine>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_compare_by_value() {
        assert_eq!(Value::Int(3), Value::Int(3));
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Str("a".into()), Value::Str("b".into()));
        assert_ne!(Value::Null, Value::Bool(false));
    }

    #[test]
    fn lists_compare_by_identity() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = Value::list(vec![Value::Int(1)]);
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn graph_object_reports_full_type() {
        let ty = TypeRef::generic(TypeRef::graph("Game.Box`1"), vec![TypeRef::int()]);
        let value = Value::object(Object::Graph(GraphObject::new(ty.clone(), "Game.Box`1")));
        assert_eq!(value.type_ref(), ty);
        assert_eq!(value.type_name(), "Game.Box`1[int]");
    }

    #[test]
    fn display_formats_lists() {
        let list = Value::list(vec![Value::Int(1), Value::Str("x".into())]);
        assert_eq!(list.to_string(), "[1, x]");
    }
}
