//! Core error types for nodegraph-core.
//!
//! Uses `thiserror` for structured, matchable variants covering the failure
//! modes of building and editing the graph model.

use crate::id::{NodeId, RootId};
use thiserror::Error;

/// Errors produced while building or editing a [`Graph`](crate::graph::Graph).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A variable, property or same-arity function already uses the name.
    #[error("duplicate member '{name}' on graph '{graph}'")]
    DuplicateMember { graph: String, name: String },

    /// A root object id was not found in the graph.
    #[error("root not found: RootId({id})", id = id.0)]
    RootNotFound { id: RootId },

    /// A node id was not found in the node arena.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// A flow edge failed validation.
    #[error("invalid flow edge: {reason}")]
    InvalidEdge { reason: String },

    /// The operation is not allowed on this kind of graph.
    #[error("graph '{graph}' does not support {operation}")]
    Unsupported { graph: String, operation: String },
}
