//! Compiled artifacts registered for graph types.
//!
//! A [`CompiledArtifact`] is a factory for native instances of one type,
//! stamped with the hash of the graph it was generated from. An artifact
//! whose stamp no longer matches the registered graph is stale; the runtime
//! skips it and interprets the graph instead.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use nodegraph_core::graph::Graph;
use nodegraph_exec::{RuntimeAccessible, RuntimeError, Value};

use crate::error::BridgeError;

/// Creates a native instance from positional constructor arguments.
pub type InstanceFactory =
    Arc<dyn Fn(Vec<Value>) -> Result<Box<dyn RuntimeAccessible>, RuntimeError> + Send + Sync>;

/// Content hash of a graph: blake3 over its JSON serialization.
///
/// Graph storage is ordered, so equal graphs always hash equal.
pub fn graph_hash(graph: &Graph) -> Result<[u8; 32], BridgeError> {
    let bytes = serde_json::to_vec(graph).map_err(|e| BridgeError::Generation {
        graph: graph.qualified_name(),
        message: e.to_string(),
    })?;
    Ok(*blake3::hash(&bytes).as_bytes())
}

/// A native implementation of one graph type.
#[derive(Clone)]
pub struct CompiledArtifact {
    pub type_name: String,
    /// Hash of the graph the artifact was built from.
    pub graph_hash: [u8; 32],
    factory: InstanceFactory,
}

impl std::fmt::Debug for CompiledArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledArtifact")
            .field("type_name", &self.type_name)
            .field("graph_hash", &blake3::Hash::from(self.graph_hash).to_hex())
            .finish()
    }
}

impl CompiledArtifact {
    pub fn new<F>(type_name: &str, graph_hash: [u8; 32], factory: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Box<dyn RuntimeAccessible>, RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        CompiledArtifact {
            type_name: type_name.to_string(),
            graph_hash,
            factory: Arc::new(factory),
        }
    }

    /// An artifact stamped with the current hash of `graph`.
    pub fn for_graph<F>(graph: &Graph, factory: F) -> Result<Self, BridgeError>
    where
        F: Fn(Vec<Value>) -> Result<Box<dyn RuntimeAccessible>, RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        Ok(CompiledArtifact::new(
            &graph.qualified_name(),
            graph_hash(graph)?,
            factory,
        ))
    }

    /// Whether the artifact was built from this exact graph.
    pub fn matches(&self, graph: &Graph) -> bool {
        graph_hash(graph).is_ok_and(|hash| hash == self.graph_hash)
    }

    pub fn create(&self, args: Vec<Value>) -> Result<Box<dyn RuntimeAccessible>, RuntimeError> {
        (self.factory)(args)
    }
}

/// Artifacts keyed by type name.
#[derive(Default)]
pub struct CompiledRegistry {
    artifacts: RwLock<HashMap<String, CompiledArtifact>>,
}

impl CompiledRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an artifact, replacing any previous one for the same type.
    pub fn register(&self, artifact: CompiledArtifact) -> Option<CompiledArtifact> {
        debug!(ty = %artifact.type_name, "compiled artifact registered");
        self.artifacts
            .write()
            .insert(artifact.type_name.clone(), artifact)
    }

    pub fn remove(&self, type_name: &str) -> Option<CompiledArtifact> {
        self.artifacts.write().remove(type_name)
    }

    pub fn get(&self, type_name: &str) -> Option<CompiledArtifact> {
        self.artifacts.read().get(type_name).cloned()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.artifacts.read().contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }
}
