//! Member references: the lazily resolved links between nodes and the
//! things they read, write and call.
//!
//! A [`MemberReference`] only stores names, indices and ids, never pointers,
//! so two references compare equal after a serialization round-trip exactly
//! when they compared equal before it.

use serde::{Deserialize, Serialize};

use crate::id::NodeId;
use crate::types::{ConstValue, TypeRef};

/// What a port, assignment target or invocation points at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum MemberReference {
    /// No source; reads produce `Null`.
    #[default]
    None,
    /// The instance the current body runs on.
    This,
    /// Constant literal.
    Literal(ConstValue),
    /// A type used as a value (for `New`, type tests, static calls).
    Type(TypeRef),
    /// An instance variable of the current graph.
    Variable { name: String },
    /// A property of the current graph (auto or accessor-backed).
    Property { name: String },
    /// A function of the current graph.
    Function { name: String },
    /// A local variable of the current body.
    Local { name: String },
    /// A positional parameter of the current body.
    Parameter { index: usize },
    /// A member looked up by name on a runtime value supplied through the
    /// node's first input port.
    Instance { name: String },
    /// A member of a host type. Static members ignore the target port.
    Native {
        owner: TypeRef,
        name: String,
        is_static: bool,
    },
    /// Output port of another node in the same body.
    NodePort { node: NodeId, port: u16 },
}

impl MemberReference {
    pub fn literal(value: ConstValue) -> Self {
        MemberReference::Literal(value)
    }

    pub fn variable(name: &str) -> Self {
        MemberReference::Variable {
            name: name.to_string(),
        }
    }

    pub fn property(name: &str) -> Self {
        MemberReference::Property {
            name: name.to_string(),
        }
    }

    pub fn function(name: &str) -> Self {
        MemberReference::Function {
            name: name.to_string(),
        }
    }

    pub fn local(name: &str) -> Self {
        MemberReference::Local {
            name: name.to_string(),
        }
    }

    pub fn instance(name: &str) -> Self {
        MemberReference::Instance {
            name: name.to_string(),
        }
    }

    pub fn native(owner: TypeRef, name: &str, is_static: bool) -> Self {
        MemberReference::Native {
            owner,
            name: name.to_string(),
            is_static,
        }
    }

    pub fn port(node: NodeId, port: u16) -> Self {
        MemberReference::NodePort { node, port }
    }

    /// The member name, for references that name one.
    pub fn name(&self) -> Option<&str> {
        match self {
            MemberReference::Variable { name }
            | MemberReference::Property { name }
            | MemberReference::Function { name }
            | MemberReference::Local { name }
            | MemberReference::Instance { name }
            | MemberReference::Native { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns `true` if the reference can be the target of an assignment.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            MemberReference::Variable { .. }
                | MemberReference::Property { .. }
                | MemberReference::Local { .. }
                | MemberReference::Parameter { .. }
                | MemberReference::Instance { .. }
                | MemberReference::Native { .. }
        )
    }
}
