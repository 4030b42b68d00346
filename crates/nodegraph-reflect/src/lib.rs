//! Reflection over graph-defined and host types.
//!
//! A [`TypeContext`] presents graphs, host types and their generic and array
//! instantiations through one introspection surface: members, base types,
//! interfaces, assignability and instance checks. [`SyntheticType`] is the
//! value handed to callers; it compares by canonical full name, so the same
//! logical type is equal across contexts and reloads.
//!
//! The context also implements the engine's
//! [`ExecutionHost`](nodegraph_exec::ExecutionHost), serving graphs and host
//! members to the interpreter.

pub mod context;
pub mod descriptor;
pub mod error;
pub mod fingerprint;
pub mod host;
pub mod member;
pub mod native;
mod resolve;
pub mod synthetic;

pub use context::TypeContext;
pub use descriptor::{TypeDescriptor, TypeHandle, TypeKind};
pub use error::ReflectError;
pub use member::{
    DegradedSubstitution, HostSignature, MemberInfo, MemberKind, MemberOrigin, MemberSet,
    Substitution,
};
pub use native::{NativeFn, NativeMember, NativeRegistry, NativeType};
pub use synthetic::SyntheticType;
