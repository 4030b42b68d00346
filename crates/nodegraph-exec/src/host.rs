//! Seams between the engine and the environment it runs in.
//!
//! - [`ExecutionHost`] supplies graphs by qualified name and implements native
//!   members and constructors. The reflection layer's type context is the
//!   production host; [`GraphSet`] is a minimal one backed by a map.
//! - [`RuntimeAccessible`] is the by-name member capability a compiled
//!   instance implements so it can stand in for an interpreted one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use nodegraph_core::graph::Graph;
use nodegraph_core::types::TypeRef;

use crate::error::RuntimeError;
use crate::intrinsics;
use crate::value::Value;

/// Failure of a by-name member access on a [`RuntimeAccessible`] instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemberAccessError {
    #[error("member '{member}' not found on '{owner}'")]
    NotFound { owner: String, member: String },
    #[error("{0}")]
    Fault(String),
}

impl From<MemberAccessError> for RuntimeError {
    fn from(err: MemberAccessError) -> Self {
        match err {
            MemberAccessError::NotFound { owner, member } => {
                RuntimeError::UnresolvedMember { owner, member }
            }
            MemberAccessError::Fault(message) => RuntimeError::NativeFault { message },
        }
    }
}

/// By-name member access on a live instance.
///
/// Member names are case-sensitive; argument lists are positional.
pub trait RuntimeAccessible: Send {
    fn type_name(&self) -> &str;

    fn get_member(&self, name: &str) -> Result<Value, MemberAccessError>;

    fn set_member(&mut self, name: &str, value: Value) -> Result<(), MemberAccessError>;

    fn invoke_member(&mut self, name: &str, args: Vec<Value>) -> Result<Value, MemberAccessError>;
}

/// Everything the engine needs from its environment.
pub trait ExecutionHost: Send + Sync {
    /// Looks up a graph by qualified name.
    fn graph(&self, qualified_name: &str) -> Option<Arc<Graph>>;

    /// Reads a native member. `receiver` is `None` for static members.
    fn native_get(
        &self,
        owner: &TypeRef,
        receiver: Option<&Value>,
        name: &str,
    ) -> Result<Value, RuntimeError>;

    /// Writes a native member.
    fn native_set(
        &self,
        owner: &TypeRef,
        receiver: Option<&Value>,
        name: &str,
        value: Value,
    ) -> Result<(), RuntimeError>;

    /// Invokes a native method.
    fn native_invoke(
        &self,
        owner: &TypeRef,
        receiver: Option<&Value>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError>;

    /// Constructs an instance of a non-graph type.
    fn construct_native(&self, ty: &TypeRef, args: Vec<Value>) -> Result<Value, RuntimeError>;
}

/// A plain set of graphs with the built-in native members.
#[derive(Default)]
pub struct GraphSet {
    graphs: RwLock<HashMap<String, Arc<Graph>>>,
}

impl GraphSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a graph under its qualified name.
    pub fn insert(&self, graph: Graph) -> Arc<Graph> {
        let graph = Arc::new(graph);
        self.graphs
            .write()
            .insert(graph.qualified_name(), Arc::clone(&graph));
        graph
    }

    pub fn remove(&self, qualified_name: &str) -> Option<Arc<Graph>> {
        self.graphs.write().remove(qualified_name)
    }

    pub fn len(&self) -> usize {
        self.graphs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.read().is_empty()
    }
}

impl ExecutionHost for GraphSet {
    fn graph(&self, qualified_name: &str) -> Option<Arc<Graph>> {
        self.graphs.read().get(qualified_name).cloned()
    }

    fn native_get(
        &self,
        owner: &TypeRef,
        receiver: Option<&Value>,
        name: &str,
    ) -> Result<Value, RuntimeError> {
        intrinsics::get(owner, receiver, name)
    }

    fn native_set(
        &self,
        owner: &TypeRef,
        _receiver: Option<&Value>,
        name: &str,
        _value: Value,
    ) -> Result<(), RuntimeError> {
        Err(RuntimeError::UnresolvedMember {
            owner: owner.to_string(),
            member: name.to_string(),
        })
    }

    fn native_invoke(
        &self,
        owner: &TypeRef,
        receiver: Option<&Value>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        intrinsics::invoke(owner, receiver, name, args)
    }

    fn construct_native(&self, ty: &TypeRef, args: Vec<Value>) -> Result<Value, RuntimeError> {
        intrinsics::construct(ty, args)
    }
}
