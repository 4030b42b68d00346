//! Type references, literals and generic parameters of the graph model.
//!
//! The model never holds resolved types. Every signature, variable and port
//! names its type through a [`TypeRef`], which stays meaningful across
//! serialization and reload boundaries. Resolution into live type descriptors
//! is the job of the reflection layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known native type names understood by the engine.
pub mod natives {
    pub const OBJECT: &str = "object";
    pub const VOID: &str = "void";
    pub const BOOL: &str = "bool";
    pub const INT: &str = "int";
    pub const FLOAT: &str = "float";
    pub const STRING: &str = "string";
    pub const LIST: &str = "List`1";
    pub const NULLABLE: &str = "Nullable`1";
    pub const ENUMERATOR: &str = "IEnumerator";
    pub const ENUMERATOR_OF: &str = "IEnumerator`1";
    pub const ENUMERABLE_OF: &str = "IEnumerable`1";
}

/// A reference to a type, as stored in the graph model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    /// A type provided by the host (`int`, ``List`1``, ...).
    Native(String),
    /// A graph-defined class or interface, by qualified name.
    Graph(String),
    /// A generic parameter of the enclosing graph or function.
    GenericParam(String),
    /// A generic definition closed (or partially closed) over arguments.
    Generic {
        definition: Box<TypeRef>,
        arguments: Vec<TypeRef>,
    },
    /// A single-dimension array of the element type.
    Array(Box<TypeRef>),
}

impl TypeRef {
    pub fn native(name: &str) -> Self {
        TypeRef::Native(name.to_string())
    }

    pub fn graph(qualified_name: &str) -> Self {
        TypeRef::Graph(qualified_name.to_string())
    }

    pub fn param(name: &str) -> Self {
        TypeRef::GenericParam(name.to_string())
    }

    pub fn generic(definition: TypeRef, arguments: Vec<TypeRef>) -> Self {
        TypeRef::Generic {
            definition: Box::new(definition),
            arguments,
        }
    }

    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    pub fn void() -> Self {
        Self::native(natives::VOID)
    }

    pub fn object() -> Self {
        Self::native(natives::OBJECT)
    }

    pub fn bool() -> Self {
        Self::native(natives::BOOL)
    }

    pub fn int() -> Self {
        Self::native(natives::INT)
    }

    pub fn float() -> Self {
        Self::native(natives::FLOAT)
    }

    pub fn string() -> Self {
        Self::native(natives::STRING)
    }

    /// `List<element>`.
    pub fn list_of(element: TypeRef) -> Self {
        Self::generic(Self::native(natives::LIST), vec![element])
    }

    /// Returns `true` for the native `void` type.
    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Native(name) if name == natives::VOID)
    }

    /// Returns `true` if any generic parameter occurs anywhere in this type.
    pub fn contains_generic_params(&self) -> bool {
        match self {
            TypeRef::GenericParam(_) => true,
            TypeRef::Native(_) | TypeRef::Graph(_) => false,
            TypeRef::Generic {
                definition,
                arguments,
            } => {
                definition.contains_generic_params()
                    || arguments.iter().any(TypeRef::contains_generic_params)
            }
            TypeRef::Array(element) => element.contains_generic_params(),
        }
    }

    /// Returns `true` if a body returning this type runs cooperatively.
    ///
    /// Recognises the host's iterator contracts: `IEnumerator`, and the
    /// generic ``IEnumerator`1`` / ``IEnumerable`1`` over any argument.
    pub fn is_iterator_contract(&self) -> bool {
        match self {
            TypeRef::Native(name) => name == natives::ENUMERATOR,
            TypeRef::Generic { definition, .. } => matches!(
                definition.as_ref(),
                TypeRef::Native(name)
                    if name == natives::ENUMERATOR_OF || name == natives::ENUMERABLE_OF
            ),
            _ => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Native(name) | TypeRef::Graph(name) | TypeRef::GenericParam(name) => {
                write!(f, "{name}")
            }
            TypeRef::Generic {
                definition,
                arguments,
            } => {
                write!(f, "{definition}[")?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, "]")
            }
            TypeRef::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// A constraint on a generic parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenericConstraint {
    /// The argument must be a reference (class) type.
    ReferenceType,
    /// The argument must be a value type.
    ValueType,
    /// The argument must have a parameterless constructor.
    DefaultConstructor,
    /// The argument must be assignable to the given type.
    Subtype(TypeRef),
}

/// A named generic parameter with its constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenericParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<GenericConstraint>,
}

impl GenericParameter {
    pub fn new(name: &str) -> Self {
        GenericParameter {
            name: name.to_string(),
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: GenericConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// Visibility of a graph member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

/// Literal values stored in the model (defaults, literal ports).
///
/// Only `PartialEq` is derived because `Float` holds an `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConstValue {
    /// The native type of this literal.
    pub fn type_ref(&self) -> TypeRef {
        match self {
            ConstValue::Null => TypeRef::object(),
            ConstValue::Bool(_) => TypeRef::bool(),
            ConstValue::Int(_) => TypeRef::int(),
            ConstValue::Float(_) => TypeRef::float(),
            ConstValue::Str(_) => TypeRef::string(),
        }
    }

    /// The default literal for a type, or `Null` for reference types.
    pub fn default_for(ty: &TypeRef) -> ConstValue {
        match ty {
            TypeRef::Native(name) => match name.as_str() {
                natives::BOOL => ConstValue::Bool(false),
                natives::INT => ConstValue::Int(0),
                natives::FLOAT => ConstValue::Float(0.0),
                _ => ConstValue::Null,
            },
            _ => ConstValue::Null,
        }
    }
}
