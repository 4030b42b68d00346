//! Member wrappers.
//!
//! A [`MemberInfo`] describes one field, property, method or constructor of
//! a type and can act on a live instance. Graph-declared members go through
//! the interpreter's by-name dispatch, which also reaches compiled instances;
//! host-declared members go straight to the execution host.

use serde::{Deserialize, Serialize};

use nodegraph_core::types::TypeRef;
use nodegraph_exec::{Interpreter, RuntimeError, Value};

use crate::descriptor::TypeHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    Field,
    Property { can_read: bool, can_write: bool },
    Method,
    Constructor,
}

/// How a member of a generic instantiation relates to the open definition's
/// member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Substitution {
    /// The signature mentions no generic parameter.
    Unchanged,
    /// Every generic parameter in the signature was replaced.
    Substituted,
    /// Substitution failed; the open signature is exposed as is.
    Degraded,
}

/// Where a member is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberOrigin {
    /// Declared by a graph; resolved on the instance by name.
    Graph,
    /// Declared by a host type; served by the execution host.
    Native,
}

/// One member of a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub name: String,
    pub kind: MemberKind,
    /// The type that declares the member (a base type for inherited members).
    pub declaring_type: TypeHandle,
    /// Reference form of `declaring_type`; reaches static members,
    /// constructors and native members.
    pub owner: TypeRef,
    pub origin: MemberOrigin,
    /// Field or property type, or method return type.
    pub ty: TypeHandle,
    pub params: Vec<TypeHandle>,
    pub is_static: bool,
    pub substitution: Substitution,
    /// Host-side form of a substituted signature, graph types erased to
    /// `object`. `None` unless `substitution` is `Substituted`.
    pub host_signature: Option<HostSignature>,
}

/// A closed signature as the host names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSignature {
    pub ty: TypeRef,
    pub params: Vec<TypeRef>,
}

impl MemberInfo {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_method(&self) -> bool {
        self.kind == MemberKind::Method
    }

    fn receiver(&self, target: &Value) -> Value {
        if self.is_static {
            Value::Type(self.owner.clone())
        } else {
            target.clone()
        }
    }

    fn native_receiver<'a>(&self, target: &'a Value) -> Option<&'a Value> {
        (!self.is_static).then_some(target)
    }

    /// Reads the field or property on `target`.
    pub fn get(&self, interp: &Interpreter, target: &Value) -> Result<Value, RuntimeError> {
        match self.origin {
            MemberOrigin::Native => {
                interp
                    .host()
                    .native_get(&self.owner, self.native_receiver(target), &self.name)
            }
            MemberOrigin::Graph => interp.get_member(&self.receiver(target), &self.name),
        }
    }

    /// Writes the field or property on `target`.
    pub fn set(&self, interp: &Interpreter, target: &Value, value: Value) -> Result<(), RuntimeError> {
        match self.origin {
            MemberOrigin::Native => interp.host().native_set(
                &self.owner,
                self.native_receiver(target),
                &self.name,
                value,
            ),
            MemberOrigin::Graph => interp.set_member(&self.receiver(target), &self.name, value),
        }
    }

    /// Calls the method on `target`, or constructs an instance for a
    /// constructor (`target` is ignored).
    pub fn invoke(
        &self,
        interp: &Interpreter,
        target: &Value,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if self.kind == MemberKind::Constructor {
            return interp.construct(&self.owner, args);
        }
        match self.origin {
            MemberOrigin::Native => interp.host().native_invoke(
                &self.owner,
                self.native_receiver(target),
                &self.name,
                args,
            ),
            MemberOrigin::Graph => interp.invoke_member(&self.receiver(target), &self.name, args),
        }
    }
}

/// The members of one type, inherited members included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberSet {
    pub fields: Vec<MemberInfo>,
    pub properties: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub constructors: Vec<MemberInfo>,
}

impl MemberSet {
    pub fn iter(&self) -> impl Iterator<Item = &MemberInfo> {
        self.fields
            .iter()
            .chain(&self.properties)
            .chain(&self.methods)
            .chain(&self.constructors)
    }

    pub fn len(&self) -> usize {
        self.fields.len() + self.properties.len() + self.methods.len() + self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first field or property named `name`.
    pub fn data_member(&self, name: &str) -> Option<&MemberInfo> {
        self.fields
            .iter()
            .chain(&self.properties)
            .find(|m| m.name == name)
    }

    pub fn method(&self, name: &str, arity: usize) -> Option<&MemberInfo> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.arity() == arity)
    }

    /// Adds an inherited member unless a member of the same shape is already
    /// present.
    pub(crate) fn inherit(&mut self, member: MemberInfo) {
        let shadowed = match member.kind {
            MemberKind::Method => self.method(&member.name, member.arity()).is_some(),
            MemberKind::Field | MemberKind::Property { .. } => {
                self.data_member(&member.name).is_some()
            }
            MemberKind::Constructor => true,
        };
        if !shadowed {
            self.push(member);
        }
    }

    pub(crate) fn push(&mut self, member: MemberInfo) {
        match member.kind {
            MemberKind::Field => self.fields.push(member),
            MemberKind::Property { .. } => self.properties.push(member),
            MemberKind::Method => self.methods.push(member),
            MemberKind::Constructor => self.constructors.push(member),
        }
    }
}

/// A member of a generic instantiation exposed with its open signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedSubstitution {
    pub instantiation: TypeHandle,
    /// Full name of the instantiation, e.g. ``Pair`2[Game.Enemy,int]``.
    pub type_name: String,
    pub member: String,
    pub reason: String,
}
