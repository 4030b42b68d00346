//! Type handles and descriptors.
//!
//! Every type the context knows about is one [`TypeDescriptor`] in a table,
//! addressed by a stable [`TypeHandle`]. Compound descriptors refer to their
//! parts by handle, so the table has no ownership cycles.

use std::fmt;

use serde::{Deserialize, Serialize};

use nodegraph_core::types::GenericConstraint;

/// Stable index of a type in its [`TypeContext`](crate::TypeContext).
///
/// Handles are only meaningful within the context that issued them; compare
/// [`SyntheticType`](crate::SyntheticType)s across contexts instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeHandle(pub u32);

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a type is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeDescriptor {
    /// A host type from the native registry, open or closed.
    Native { name: String },
    /// A graph-defined class, by qualified name.
    GraphClass { graph: String },
    /// A graph-defined interface, by qualified name.
    GraphInterface { graph: String },
    GenericParameter {
        name: String,
        constraints: Vec<GenericConstraint>,
    },
    /// An open definition closed over arguments.
    GenericInstantiation {
        definition: TypeHandle,
        arguments: Vec<TypeHandle>,
    },
    ArrayInstantiation { element: TypeHandle },
    /// A name nothing resolves to; dependents keep working with an empty
    /// member set.
    Missing { name: String },
}

/// The variant of a [`TypeDescriptor`], without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Native,
    GraphClass,
    GraphInterface,
    GenericParameter,
    GenericInstantiation,
    ArrayInstantiation,
    Missing,
}

impl TypeDescriptor {
    pub fn kind(&self) -> TypeKind {
        match self {
            TypeDescriptor::Native { .. } => TypeKind::Native,
            TypeDescriptor::GraphClass { .. } => TypeKind::GraphClass,
            TypeDescriptor::GraphInterface { .. } => TypeKind::GraphInterface,
            TypeDescriptor::GenericParameter { .. } => TypeKind::GenericParameter,
            TypeDescriptor::GenericInstantiation { .. } => TypeKind::GenericInstantiation,
            TypeDescriptor::ArrayInstantiation { .. } => TypeKind::ArrayInstantiation,
            TypeDescriptor::Missing { .. } => TypeKind::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, TypeDescriptor::Missing { .. })
    }

    /// Handles this descriptor is built from.
    pub fn parts(&self) -> Vec<TypeHandle> {
        match self {
            TypeDescriptor::GenericInstantiation {
                definition,
                arguments,
            } => std::iter::once(*definition).chain(arguments.iter().copied()).collect(),
            TypeDescriptor::ArrayInstantiation { element } => vec![*element],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_of_compound_descriptors() {
        let inst = TypeDescriptor::GenericInstantiation {
            definition: TypeHandle(3),
            arguments: vec![TypeHandle(5), TypeHandle(1)],
        };
        assert_eq!(inst.parts(), vec![TypeHandle(3), TypeHandle(5), TypeHandle(1)]);
        assert_eq!(inst.kind(), TypeKind::GenericInstantiation);

        let native = TypeDescriptor::Native { name: "int".into() };
        assert!(native.parts().is_empty());
        assert!(!native.is_missing());
    }
}
