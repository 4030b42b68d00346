//! Root objects (function, constructor and accessor bodies) and the
//! variables and properties they operate on.
//!
//! A [`RootObject`] is metadata: its body lives as nodes owned by its
//! [`RootId`] in the graph's flat node arena, starting at `start_node`.

use serde::{Deserialize, Serialize};

use crate::id::{NodeId, RootId};
use crate::types::{ConstValue, GenericParameter, TypeRef, Visibility};

/// What a root object implements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RootKind {
    Function,
    Constructor,
    Getter { property: String },
    Setter { property: String },
}

/// A positional parameter of a root object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
}

impl Parameter {
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Parameter {
            name: name.to_string(),
            ty,
        }
    }
}

/// A local variable of a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVariable {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<ConstValue>,
    /// When `false` the value persists across activations of the body on the
    /// same instance.
    pub reset_on_entry: bool,
}

impl LocalVariable {
    pub fn new(name: &str, ty: TypeRef) -> Self {
        LocalVariable {
            name: name.to_string(),
            ty,
            default: None,
            reset_on_entry: true,
        }
    }

    pub fn with_default(mut self, value: ConstValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Marks the local as retained between activations.
    pub fn persistent(mut self) -> Self {
        self.reset_on_entry = false;
        self
    }

    /// The value the local starts with.
    pub fn initial(&self) -> ConstValue {
        self.default
            .clone()
            .unwrap_or_else(|| ConstValue::default_for(&self.ty))
    }
}

/// An instance variable of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<ConstValue>,
    pub visibility: Visibility,
}

impl Variable {
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Variable {
            name: name.to_string(),
            ty,
            default: None,
            visibility: Visibility::Public,
        }
    }

    pub fn with_default(mut self, value: ConstValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn initial(&self) -> ConstValue {
        self.default
            .clone()
            .unwrap_or_else(|| ConstValue::default_for(&self.ty))
    }
}

/// A property of a graph.
///
/// Without accessors the property is an auto-property backed by instance
/// storage under its own name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub ty: TypeRef,
    pub getter: Option<RootId>,
    pub setter: Option<RootId>,
    pub visibility: Visibility,
}

impl Property {
    pub fn is_auto(&self) -> bool {
        self.getter.is_none() && self.setter.is_none()
    }

    pub fn can_read(&self) -> bool {
        self.is_auto() || self.getter.is_some()
    }

    pub fn can_write(&self) -> bool {
        self.is_auto() || self.setter.is_some()
    }
}

/// A function, constructor or accessor body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootObject {
    pub id: RootId,
    pub name: String,
    pub kind: RootKind,
    pub params: Vec<Parameter>,
    pub generic_params: Vec<GenericParameter>,
    pub locals: Vec<LocalVariable>,
    /// `void` for procedures, constructors and setters.
    pub return_type: TypeRef,
    /// First flow node. `None` for bodiless declarations (interfaces).
    pub start_node: Option<NodeId>,
    /// Qualified name of the owning graph.
    pub owner: String,
    pub is_static: bool,
    pub visibility: Visibility,
}

impl RootObject {
    pub fn new(
        id: RootId,
        name: String,
        kind: RootKind,
        owner: String,
        params: Vec<Parameter>,
        return_type: TypeRef,
    ) -> Self {
        RootObject {
            id,
            name,
            kind,
            params,
            generic_params: Vec::new(),
            locals: Vec::new(),
            return_type,
            start_node: None,
            owner,
            is_static: false,
            visibility: Visibility::Public,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the body must reach a `Return` outcome with a value.
    pub fn requires_return(&self) -> bool {
        !self.return_type.is_void() && !self.is_cooperative()
    }

    /// Returns `true` if the body runs under the cooperative scheduler.
    pub fn is_cooperative(&self) -> bool {
        self.return_type.is_iterator_contract()
    }

    pub fn local(&self, name: &str) -> Option<&LocalVariable> {
        self.locals.iter().find(|l| l.name == name)
    }
}
