//! The interpreter: call entry points and by-name member dispatch.
//!
//! [`Interpreter`] is a cheap handle (host + config) that creates an
//! [`Activation`] per call. Synchronous bodies run to completion inside the
//! call; cooperative bodies come back as a [`Value::Coroutine`] for the
//! [`Scheduler`](crate::scheduler::Scheduler) to drive.
//!
//! Members of a graph instance are resolved by name at call time, walking the
//! graph's base chain. Native instances go through their
//! [`RuntimeAccessible`](crate::host::RuntimeAccessible) capability; every
//! other value goes to the host.

use std::sync::Arc;

use tracing::debug;

use nodegraph_core::graph::Graph;
use nodegraph_core::id::RootId;
use nodegraph_core::root::Property;
use nodegraph_core::types::{ConstValue, TypeRef};

use crate::config::EngineConfig;
use crate::error::RuntimeError;
use crate::flow::Activation;
use crate::host::ExecutionHost;
use crate::scheduler::{coroutine, GraphCoroutine};
use crate::value::{Object, ObjectRef, Value};

/// Base chains longer than this are treated as cyclic.
const MAX_BASE_DEPTH: usize = 64;

/// The qualified graph name behind a type, if it names a graph.
pub fn graph_name_of(ty: &TypeRef) -> Option<&str> {
    match ty {
        TypeRef::Graph(name) => Some(name),
        TypeRef::Generic { definition, .. } => graph_name_of(definition),
        _ => None,
    }
}

/// Graph interpreter handle.
#[derive(Clone)]
pub struct Interpreter {
    host: Arc<dyn ExecutionHost>,
    config: EngineConfig,
}

/// A graph-side member found by name.
enum GraphMember {
    /// Stored in the instance's fields.
    Field(TypeRef),
    Accessor(Arc<Graph>, Property),
}

impl Interpreter {
    pub fn new(host: Arc<dyn ExecutionHost>, config: EngineConfig) -> Self {
        Interpreter { host, config }
    }

    pub fn host(&self) -> &Arc<dyn ExecutionHost> {
        &self.host
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn graph_of(&self, name: &str) -> Result<Arc<Graph>, RuntimeError> {
        self.host.graph(name).ok_or_else(|| RuntimeError::GraphNotFound {
            name: name.to_string(),
        })
    }

    /// The graph and its bases, most derived first.
    pub fn base_chain(&self, graph: &Arc<Graph>) -> Vec<Arc<Graph>> {
        let mut chain = vec![Arc::clone(graph)];
        while chain.len() < MAX_BASE_DEPTH {
            let base = chain
                .last()
                .and_then(|g| g.base.as_ref())
                .and_then(graph_name_of)
                .and_then(|name| self.host.graph(name));
            match base {
                Some(base) => chain.push(base),
                None => break,
            }
        }
        chain
    }

    /// Finds a function by name and arity on the graph or its bases.
    pub fn resolve_function(
        &self,
        graph: &Arc<Graph>,
        name: &str,
        arity: usize,
    ) -> Option<(Arc<Graph>, RootId)> {
        self.base_chain(graph)
            .into_iter()
            .find_map(|g| {
                let id = g.function(name, arity)?.id;
                Some((g, id))
            })
    }

    fn resolve_data_member(&self, graph: &Arc<Graph>, name: &str) -> Option<GraphMember> {
        self.base_chain(graph).into_iter().find_map(|g| {
            if let Some(variable) = g.variable(name) {
                return Some(GraphMember::Field(variable.ty.clone()));
            }
            let property = g.property(name)?.clone();
            if property.is_auto() {
                Some(GraphMember::Field(property.ty))
            } else {
                Some(GraphMember::Accessor(g, property))
            }
        })
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// Runs a body. Cooperative bodies are returned unstarted as a coroutine.
    pub fn call_root(
        &self,
        graph: Arc<Graph>,
        root: RootId,
        this: Option<ObjectRef>,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value, RuntimeError> {
        if depth > self.config.max_call_depth {
            return Err(RuntimeError::RecursionLimitExceeded {
                limit: self.config.max_call_depth,
            });
        }
        let cooperative = graph.root(root).map(|r| r.is_cooperative()).unwrap_or(false);
        let mut activation = Activation::new(self.clone(), graph, root, this, args)?.with_depth(depth);

        if cooperative {
            debug!(function = %activation.function_name(), "created coroutine");
            return Ok(Value::Coroutine(coroutine(GraphCoroutine::new(activation))));
        }
        activation.start();
        activation.run();
        activation.take_result()
    }

    /// Calls a function by name on a graph instance or, with `this = None`,
    /// a static function.
    pub fn call(
        &self,
        graph: &Arc<Graph>,
        function: &str,
        this: Option<ObjectRef>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let (owner, root) = self
            .resolve_function(graph, function, args.len())
            .ok_or_else(|| RuntimeError::UnresolvedMember {
                owner: graph.qualified_name(),
                member: function.to_string(),
            })?;
        self.call_root(owner, root, this, args, 0)
    }

    // -----------------------------------------------------------------------
    // By-name member access
    // -----------------------------------------------------------------------

    pub fn get_member(&self, receiver: &Value, name: &str) -> Result<Value, RuntimeError> {
        self.get_member_at(receiver, name, 0)
    }

    pub fn set_member(&self, receiver: &Value, name: &str, value: Value) -> Result<(), RuntimeError> {
        self.set_member_at(receiver, name, value, 0)
    }

    pub fn invoke_member(
        &self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        self.invoke_member_at(receiver, name, args, 0)
    }

    /// Locks a graph instance just long enough to find its defining graph.
    /// Native instances yield `None`.
    fn graph_identity(&self, obj: &ObjectRef) -> Option<(String, String)> {
        match &*obj.lock() {
            Object::Graph(g) => Some((g.graph_name.clone(), g.ty.to_string())),
            Object::Native(_) => None,
        }
    }

    pub(crate) fn get_member_at(
        &self,
        receiver: &Value,
        name: &str,
        depth: usize,
    ) -> Result<Value, RuntimeError> {
        let obj = match receiver {
            Value::Null => {
                return Err(RuntimeError::NullReference {
                    member: name.to_string(),
                })
            }
            Value::Object(obj) => obj,
            Value::Type(ty) => return self.host.native_get(ty, None, name),
            other => return self.host.native_get(&other.type_ref(), Some(other), name),
        };
        let Some((graph_name, type_name)) = self.graph_identity(obj) else {
            return match &*obj.lock() {
                Object::Native(native) => native.get_member(name).map_err(Into::into),
                Object::Graph(_) => Ok(Value::Null),
            };
        };

        let graph = self.graph_of(&graph_name)?;
        match self.resolve_data_member(&graph, name) {
            Some(GraphMember::Field(ty)) => {
                let guard = obj.lock();
                let value = guard
                    .as_graph()
                    .and_then(|g| g.fields.get(name))
                    .cloned()
                    .unwrap_or_else(|| Value::from_const(&ConstValue::default_for(&ty)));
                Ok(value)
            }
            Some(GraphMember::Accessor(owner, property)) => match property.getter {
                Some(getter) => {
                    self.call_root(owner, getter, Some(Arc::clone(obj)), Vec::new(), depth + 1)
                }
                None => Err(RuntimeError::UnresolvedMember {
                    owner: type_name,
                    member: format!("get_{name}"),
                }),
            },
            None => Err(RuntimeError::UnresolvedMember {
                owner: type_name,
                member: name.to_string(),
            }),
        }
    }

    pub(crate) fn set_member_at(
        &self,
        receiver: &Value,
        name: &str,
        value: Value,
        depth: usize,
    ) -> Result<(), RuntimeError> {
        let obj = match receiver {
            Value::Null => {
                return Err(RuntimeError::NullReference {
                    member: name.to_string(),
                })
            }
            Value::Object(obj) => obj,
            Value::Type(ty) => return self.host.native_set(ty, None, name, value),
            other => return self.host.native_set(&other.type_ref(), Some(other), name, value),
        };
        let Some((graph_name, type_name)) = self.graph_identity(obj) else {
            return match &mut *obj.lock() {
                Object::Native(native) => native.set_member(name, value).map_err(Into::into),
                Object::Graph(_) => Ok(()),
            };
        };

        let graph = self.graph_of(&graph_name)?;
        match self.resolve_data_member(&graph, name) {
            Some(GraphMember::Field(_)) => {
                if let Object::Graph(g) = &mut *obj.lock() {
                    g.fields.insert(name.to_string(), value);
                }
                Ok(())
            }
            Some(GraphMember::Accessor(owner, property)) => match property.setter {
                Some(setter) => self
                    .call_root(owner, setter, Some(Arc::clone(obj)), vec![value], depth + 1)
                    .map(|_| ()),
                None => Err(RuntimeError::UnresolvedMember {
                    owner: type_name,
                    member: format!("set_{name}"),
                }),
            },
            None => Err(RuntimeError::UnresolvedMember {
                owner: type_name,
                member: name.to_string(),
            }),
        }
    }

    pub(crate) fn invoke_member_at(
        &self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value, RuntimeError> {
        let obj = match receiver {
            Value::Null => {
                return Err(RuntimeError::NullReference {
                    member: name.to_string(),
                })
            }
            Value::Object(obj) => obj,
            Value::Type(ty) => return self.invoke_static_at(ty, name, args, depth),
            other => return self.host.native_invoke(&other.type_ref(), Some(other), name, args),
        };
        let Some((graph_name, type_name)) = self.graph_identity(obj) else {
            return match &mut *obj.lock() {
                Object::Native(native) => native.invoke_member(name, args).map_err(Into::into),
                Object::Graph(_) => Ok(Value::Null),
            };
        };

        let graph = self.graph_of(&graph_name)?;
        match self.resolve_function(&graph, name, args.len()) {
            Some((owner, root)) => {
                let is_static = owner.root(root).map(|r| r.is_static).unwrap_or(false);
                let this = if is_static { None } else { Some(Arc::clone(obj)) };
                self.call_root(owner, root, this, args, depth + 1)
            }
            None => Err(RuntimeError::UnresolvedMember {
                owner: type_name,
                member: name.to_string(),
            }),
        }
    }

    /// Static call on a type: a graph function without instance, or a
    /// native static method.
    fn invoke_static_at(
        &self,
        ty: &TypeRef,
        name: &str,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value, RuntimeError> {
        let Some(graph_name) = graph_name_of(ty) else {
            return self.host.native_invoke(ty, None, name, args);
        };
        let graph = self.graph_of(graph_name)?;
        let (owner, root) = self
            .resolve_function(&graph, name, args.len())
            .ok_or_else(|| RuntimeError::UnresolvedMember {
                owner: ty.to_string(),
                member: name.to_string(),
            })?;
        self.call_root(owner, root, None, args, depth + 1)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Constructs any type: graph types are instantiated, others go to the
    /// host.
    pub fn construct(&self, ty: &TypeRef, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.construct_at(ty, args, 0)
    }

    pub(crate) fn construct_at(
        &self,
        ty: &TypeRef,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value, RuntimeError> {
        match graph_name_of(ty) {
            Some(_) => self.instantiate_at(ty, args, depth).map(Value::Object),
            None => self.host.construct_native(ty, args),
        }
    }
}
