//! Host type registry.
//!
//! Native types are described by their open signatures (``List`1`` with a
//! generic parameter `T`), so the reflection layer can substitute them the
//! same way it substitutes graph definitions. A member may carry an
//! implementation; members without one are served by the engine's
//! intrinsics.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use nodegraph_core::types::{natives, GenericConstraint, GenericParameter, TypeRef};
use nodegraph_exec::intrinsics;
use nodegraph_exec::{ListRef, RuntimeError, Value};

use crate::member::MemberKind;

/// Name of the pseudo-definition that array types are described by.
pub const ARRAY: &str = "Array";

pub use nodegraph_exec::intrinsics::MATH;

/// Implementation of a native member: `(receiver, args) -> result`.
/// `receiver` is `None` for static members.
pub type NativeFn = Arc<dyn Fn(Option<&Value>, Vec<Value>) -> Result<Value, RuntimeError> + Send + Sync>;

/// One member of a native type.
#[derive(Clone)]
pub struct NativeMember {
    pub name: String,
    pub kind: MemberKind,
    pub ty: TypeRef,
    pub params: Vec<TypeRef>,
    pub is_static: bool,
    /// Method body or property getter.
    pub call: Option<NativeFn>,
    /// Property setter.
    pub assign: Option<NativeFn>,
}

impl fmt::Debug for NativeMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeMember")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("ty", &self.ty)
            .field("params", &self.params)
            .field("is_static", &self.is_static)
            .finish_non_exhaustive()
    }
}

impl NativeMember {
    pub fn method(name: &str, params: Vec<TypeRef>, ret: TypeRef) -> Self {
        NativeMember {
            name: name.to_string(),
            kind: MemberKind::Method,
            ty: ret,
            params,
            is_static: false,
            call: None,
            assign: None,
        }
    }

    /// A read-only property.
    pub fn getter(name: &str, ty: TypeRef) -> Self {
        NativeMember {
            kind: MemberKind::Property {
                can_read: true,
                can_write: false,
            },
            ..Self::method(name, Vec::new(), ty)
        }
    }

    pub fn field(name: &str, ty: TypeRef) -> Self {
        NativeMember {
            kind: MemberKind::Field,
            ..Self::method(name, Vec::new(), ty)
        }
    }

    pub fn constructor(params: Vec<TypeRef>) -> Self {
        NativeMember {
            kind: MemberKind::Constructor,
            ..Self::method(".ctor", params, TypeRef::void())
        }
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_impl(
        mut self,
        call: impl Fn(Option<&Value>, Vec<Value>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) -> Self {
        self.call = Some(Arc::new(call));
        self
    }
}

/// A host type.
#[derive(Debug, Clone)]
pub struct NativeType {
    /// Definition name: `int`, ``List`1``.
    pub name: String,
    pub generic_params: Vec<GenericParameter>,
    pub members: Vec<NativeMember>,
    /// `None` only for `object`.
    pub base: Option<String>,
    pub is_value_type: bool,
    pub default_constructible: bool,
}

impl NativeType {
    /// A reference type deriving from `object`.
    pub fn class(name: &str) -> Self {
        NativeType {
            name: name.to_string(),
            generic_params: Vec::new(),
            members: Vec::new(),
            base: Some(natives::OBJECT.to_string()),
            is_value_type: false,
            default_constructible: false,
        }
    }

    pub fn value_type(name: &str) -> Self {
        NativeType {
            is_value_type: true,
            default_constructible: true,
            ..Self::class(name)
        }
    }

    pub fn with_generic(mut self, param: GenericParameter) -> Self {
        self.generic_params.push(param);
        self
    }

    pub fn with_member(mut self, member: NativeMember) -> Self {
        if member.kind == MemberKind::Constructor && member.params.is_empty() {
            self.default_constructible = true;
        }
        self.members.push(member);
        self
    }

    pub fn is_generic_definition(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// The open type this definition describes, e.g. ``List`1[T]``.
    pub fn open_ref(&self) -> TypeRef {
        let definition = TypeRef::native(&self.name);
        if self.generic_params.is_empty() {
            return definition;
        }
        let arguments = self
            .generic_params
            .iter()
            .map(|p| TypeRef::param(&p.name))
            .collect();
        TypeRef::generic(definition, arguments)
    }

    pub fn data_member(&self, name: &str) -> Option<&NativeMember> {
        self.members.iter().find(|m| {
            m.name == name && matches!(m.kind, MemberKind::Field | MemberKind::Property { .. })
        })
    }

    pub fn method(&self, name: &str, arity: usize) -> Option<&NativeMember> {
        self.members
            .iter()
            .find(|m| m.name == name && m.kind == MemberKind::Method && m.params.len() == arity)
    }
}

/// The host types known to a type context.
#[derive(Debug, Clone, Default)]
pub struct NativeRegistry {
    types: IndexMap<String, NativeType>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in host types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for ty in builtins() {
            registry.register(ty);
        }
        registry
    }

    /// Registers or replaces a type under its definition name.
    pub fn register(&mut self, ty: NativeType) {
        self.types.insert(ty.name.clone(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&NativeType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// `name` followed by its native bases.
    pub fn base_chain<'a>(&'a self, name: &str) -> Vec<&'a NativeType> {
        let mut chain = Vec::new();
        let mut next = self.types.get(name);
        while let Some(ty) = next {
            if chain.iter().any(|seen: &&NativeType| seen.name == ty.name) {
                break;
            }
            chain.push(ty);
            next = ty.base.as_deref().and_then(|base| self.types.get(base));
        }
        chain
    }

    /// The first implemented getter named `name` along the base chain.
    pub fn getter(&self, definition: &str, name: &str) -> Option<NativeFn> {
        self.base_chain(definition)
            .into_iter()
            .filter_map(|ty| ty.data_member(name))
            .find_map(|m| m.call.clone())
    }

    pub fn setter(&self, definition: &str, name: &str) -> Option<NativeFn> {
        self.base_chain(definition)
            .into_iter()
            .filter_map(|ty| ty.data_member(name))
            .find_map(|m| m.assign.clone())
    }

    /// The first implemented method named `name` taking `arity` arguments.
    pub fn method_impl(&self, definition: &str, name: &str, arity: usize) -> Option<NativeFn> {
        self.base_chain(definition)
            .into_iter()
            .filter_map(|ty| ty.method(name, arity))
            .find_map(|m| m.call.clone())
    }
}

fn expect_list<'a>(receiver: Option<&'a Value>, member: &str) -> Result<&'a ListRef, RuntimeError> {
    match receiver {
        Some(Value::List(list)) => Ok(list),
        Some(Value::Null) | None => Err(RuntimeError::NullReference {
            member: member.to_string(),
        }),
        Some(other) => Err(RuntimeError::TypeMismatch {
            expected: natives::LIST.to_string(),
            got: other.type_name(),
        }),
    }
}

fn copy_list(receiver: Option<&Value>, member: &str) -> Result<Value, RuntimeError> {
    let list = expect_list(receiver, member)?;
    let items = list.lock().clone();
    Ok(Value::list(items))
}

fn builtins() -> Vec<NativeType> {
    let t = || TypeRef::param("T");
    let list_t = || TypeRef::list_of(TypeRef::param("T"));

    let mut object = NativeType::class(natives::OBJECT)
        .with_member(NativeMember::method("ToString", vec![], TypeRef::string()))
        .with_member(NativeMember::method("Equals", vec![TypeRef::object()], TypeRef::bool()))
        .with_member(NativeMember::constructor(vec![]));
    object.base = None;

    let string = NativeType::class(natives::STRING)
        .with_member(NativeMember::getter("Length", TypeRef::int()))
        .with_member(NativeMember::method("ToUpper", vec![], TypeRef::string()))
        .with_member(NativeMember::method("ToLower", vec![], TypeRef::string()))
        .with_member(NativeMember::method("Contains", vec![TypeRef::string()], TypeRef::bool()))
        .with_member(NativeMember::constructor(vec![]));

    let list = NativeType::class(natives::LIST)
        .with_generic(GenericParameter::new("T"))
        .with_member(NativeMember::constructor(vec![]))
        .with_member(NativeMember::getter("Count", TypeRef::int()))
        .with_member(NativeMember::method("Add", vec![t()], TypeRef::void()))
        .with_member(NativeMember::method("Get", vec![TypeRef::int()], t()))
        .with_member(NativeMember::method("Set", vec![TypeRef::int(), t()], TypeRef::void()))
        .with_member(NativeMember::method("Clear", vec![], TypeRef::void()))
        .with_member(NativeMember::method("Contains", vec![t()], TypeRef::bool()))
        .with_member(NativeMember::method("Remove", vec![t()], TypeRef::bool()))
        .with_member(
            NativeMember::method("Clone", vec![], list_t())
                .with_impl(|receiver, _| copy_list(receiver, "Clone")),
        )
        .with_member(
            NativeMember::method("ToArray", vec![], TypeRef::array(t()))
                .with_impl(|receiver, _| copy_list(receiver, "ToArray")),
        );

    let array = NativeType::class(ARRAY)
        .with_generic(GenericParameter::new("T"))
        .with_member(NativeMember::getter("Length", TypeRef::int()).with_impl(|receiver, _| {
            let list = expect_list(receiver, "Length")?;
            let len = list.lock().len();
            Ok(Value::Int(len as i64))
        }))
        .with_member(
            NativeMember::method("Get", vec![TypeRef::int()], t()).with_impl(|receiver, args| {
                let list = expect_list(receiver, "Get")?;
                intrinsics::list_invoke(list, "Get", &args)
                    .unwrap_or(Ok(Value::Null))
            }),
        )
        .with_member(
            NativeMember::method("Set", vec![TypeRef::int(), t()], TypeRef::void()).with_impl(
                |receiver, args| {
                    let list = expect_list(receiver, "Set")?;
                    intrinsics::list_invoke(list, "Set", &args)
                        .unwrap_or(Ok(Value::Null))
                },
            ),
        );

    let nullable = NativeType::value_type(natives::NULLABLE)
        .with_generic(GenericParameter::new("T").with_constraint(GenericConstraint::ValueType))
        .with_member(
            NativeMember::getter("HasValue", TypeRef::bool())
                .with_impl(|receiver, _| Ok(Value::Bool(!receiver.map_or(true, Value::is_null)))),
        )
        .with_member(NativeMember::getter("Value", t()).with_impl(|receiver, _| {
            match receiver {
                Some(value) if !value.is_null() => Ok(value.clone()),
                _ => Err(RuntimeError::NullReference {
                    member: "Value".to_string(),
                }),
            }
        }));

    let math = NativeType::class(MATH)
        .with_member(NativeMember::getter("PI", TypeRef::float()).static_member())
        .with_member(
            NativeMember::method("Max", vec![TypeRef::float(), TypeRef::float()], TypeRef::float())
                .static_member(),
        )
        .with_member(
            NativeMember::method("Min", vec![TypeRef::float(), TypeRef::float()], TypeRef::float())
                .static_member(),
        )
        .with_member(
            NativeMember::method("Abs", vec![TypeRef::float()], TypeRef::float()).static_member(),
        );

    let enumerator = NativeType::class(natives::ENUMERATOR);

    vec![
        object,
        NativeType::value_type(natives::VOID),
        NativeType::value_type(natives::BOOL),
        NativeType::value_type(natives::INT),
        NativeType::value_type(natives::FLOAT),
        string,
        list,
        array,
        nullable,
        math,
        enumerator,
    ]
}
