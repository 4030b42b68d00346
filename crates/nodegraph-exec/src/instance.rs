//! Instantiation of graph-defined classes.
//!
//! A new instance gets one field per variable and auto-property along its
//! base chain (bases first), initialised to the declared defaults, and then
//! runs the constructor whose arity matches the arguments.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use nodegraph_core::types::{ConstValue, TypeRef};

use crate::error::RuntimeError;
use crate::interpreter::{graph_name_of, Interpreter};
use crate::value::{GraphObject, Object, ObjectRef, Value};

impl Interpreter {
    /// Creates an interpreted instance of a graph class.
    pub fn instantiate(&self, ty: &TypeRef, args: Vec<Value>) -> Result<ObjectRef, RuntimeError> {
        self.instantiate_at(ty, args, 0)
    }

    pub(crate) fn instantiate_at(
        &self,
        ty: &TypeRef,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<ObjectRef, RuntimeError> {
        let not_constructible = || RuntimeError::NotConstructible {
            type_name: ty.to_string(),
        };
        let graph_name = graph_name_of(ty).ok_or_else(not_constructible)?;
        let graph = self.graph_of(graph_name)?;
        if graph.is_interface() {
            return Err(not_constructible());
        }

        let mut state = GraphObject::new(ty.clone(), graph_name);
        for g in self.base_chain(&graph).iter().rev() {
            for variable in g.variables() {
                state
                    .fields
                    .insert(variable.name.clone(), Value::from_const(&variable.initial()));
            }
            for property in g.properties().iter().filter(|p| p.is_auto()) {
                state.fields.insert(
                    property.name.clone(),
                    Value::from_const(&ConstValue::default_for(&property.ty)),
                );
            }
        }
        let obj: ObjectRef = Arc::new(Mutex::new(Object::Graph(state)));

        match graph.constructor(args.len()) {
            Some(ctor) => {
                let ctor = ctor.id;
                self.call_root(Arc::clone(&graph), ctor, Some(Arc::clone(&obj)), args, depth + 1)?;
            }
            None if args.is_empty() => {}
            None => {
                return Err(RuntimeError::UnresolvedMember {
                    owner: ty.to_string(),
                    member: ".ctor".to_string(),
                })
            }
        }
        debug!(ty = %ty, "instantiated");
        Ok(obj)
    }
}
