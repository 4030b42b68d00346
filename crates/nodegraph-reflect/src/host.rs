//! The type context as the engine's execution host.
//!
//! Native members with an implementation in the registry are served from
//! there, searching the native base chain; everything else falls back to the
//! engine's intrinsics.

use std::sync::Arc;

use nodegraph_core::graph::Graph;
use nodegraph_core::types::{natives, ConstValue, TypeRef};
use nodegraph_exec::{intrinsics, ExecutionHost, RuntimeError, Value};

use crate::context::TypeContext;
use crate::native::ARRAY;

/// The registry definition that serves members of `owner`.
fn native_definition(owner: &TypeRef) -> String {
    match owner {
        TypeRef::Array(_) => ARRAY.to_string(),
        other => intrinsics::definition_name(other),
    }
}

impl ExecutionHost for TypeContext {
    fn graph(&self, qualified_name: &str) -> Option<Arc<Graph>> {
        self.graphs.read().get(qualified_name).cloned()
    }

    fn native_get(
        &self,
        owner: &TypeRef,
        receiver: Option<&Value>,
        name: &str,
    ) -> Result<Value, RuntimeError> {
        let getter = self.natives.read().getter(&native_definition(owner), name);
        match getter {
            Some(getter) => getter(receiver, Vec::new()),
            None => intrinsics::get(owner, receiver, name),
        }
    }

    fn native_set(
        &self,
        owner: &TypeRef,
        receiver: Option<&Value>,
        name: &str,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let setter = self.natives.read().setter(&native_definition(owner), name);
        match setter {
            Some(setter) => setter(receiver, vec![value]).map(|_| ()),
            None => Err(RuntimeError::UnresolvedMember {
                owner: owner.to_string(),
                member: name.to_string(),
            }),
        }
    }

    fn native_invoke(
        &self,
        owner: &TypeRef,
        receiver: Option<&Value>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let method = self
            .natives
            .read()
            .method_impl(&native_definition(owner), name, args.len());
        match method {
            Some(method) => method(receiver, args),
            None => intrinsics::invoke(owner, receiver, name, args),
        }
    }

    fn construct_native(&self, ty: &TypeRef, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match (ty, args.as_slice()) {
            // `new T[n]`, filled with the element default.
            (TypeRef::Array(element), [Value::Int(len)]) => {
                let len = usize::try_from(*len).map_err(|_| RuntimeError::IndexOutOfRange {
                    index: *len,
                    len: 0,
                })?;
                let default = Value::from_const(&ConstValue::default_for(element));
                Ok(Value::list(vec![default; len]))
            }
            (TypeRef::Generic { definition, .. }, [])
                if intrinsics::definition_name(definition) == natives::NULLABLE =>
            {
                Ok(Value::Null)
            }
            (TypeRef::Generic { definition, .. }, [value])
                if intrinsics::definition_name(definition) == natives::NULLABLE =>
            {
                Ok(value.clone())
            }
            _ => intrinsics::construct(ty, args),
        }
    }
}
