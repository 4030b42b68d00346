//! Runtime error types for the flow engine.
//!
//! Failures raised while a node or block unit runs are wrapped in
//! [`RuntimeError::Fault`] carrying the unit's identity, once per unit the
//! failure passes through. A fault in a nested call therefore lists every call
//! site on its way out; [`RuntimeError::trace`] returns them outermost first
//! and [`RuntimeError::root_cause`] the original failure.

use std::fmt;

use nodegraph_core::id::NodeId;
use serde::{Deserialize, Serialize};

/// Identity of the unit a fault passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultOrigin {
    /// A node inside a graph body.
    Node {
        graph: String,
        function: String,
        node: NodeId,
    },
    /// A unit of a block list.
    Block { index: usize, name: String },
}

impl fmt::Display for FaultOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultOrigin::Node {
                graph,
                function,
                node,
            } => write!(f, "{graph}.{function} node {node}"),
            FaultOrigin::Block { index, name } => write!(f, "block #{index} '{name}'"),
        }
    }
}

/// Runtime errors produced by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum RuntimeError {
    /// A non-void function finished without a `Return` outcome.
    #[error("missing return in function '{function}'")]
    MissingReturn { function: String },

    /// A named member does not exist on the type.
    #[error("member '{member}' not found on '{owner}'")]
    UnresolvedMember { owner: String, member: String },

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("member '{member}' accessed on null")]
    NullReference { member: String },

    #[error("divide by zero")]
    DivideByZero,

    #[error("integer overflow")]
    IntegerOverflow,

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// `Wait` or `Yield` reached in a body that does not run cooperatively.
    #[error("suspension in synchronous function '{function}'")]
    SuspendInSynchronousBody { function: String },

    #[error("call depth limit ({limit}) exceeded")]
    RecursionLimitExceeded { limit: usize },

    #[error("step limit ({limit}) exceeded")]
    StepLimitExceeded { limit: u64 },

    #[error("cyclic data dependency through node {node}")]
    CyclicDataDependency { node: NodeId },

    #[error("node not found: {node}")]
    NodeNotFound { node: NodeId },

    #[error("graph not found: {name}")]
    GraphNotFound { name: String },

    #[error("function '{function}' has no start node")]
    MissingStartNode { function: String },

    #[error("'{function}' expects {expected} arguments, got {got}")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("cannot instantiate '{type_name}'")]
    NotConstructible { type_name: String },

    #[error("'{target}' cannot be invoked")]
    NotInvocable { target: String },

    #[error("'{target}' cannot be assigned")]
    NotAssignable { target: String },

    #[error("activation of '{function}' did not finish")]
    Incomplete { function: String },

    /// A host-provided member raised an error.
    #[error("native fault: {message}")]
    NativeFault { message: String },

    /// The cooperative task was stopped before it finished.
    #[error("task stopped")]
    Stopped,

    /// A failure raised inside `origin`.
    #[error("fault in {origin}: {source}")]
    Fault {
        origin: FaultOrigin,
        source: Box<RuntimeError>,
    },
}

impl RuntimeError {
    /// Wraps the error with the identity of the unit it passed through.
    pub fn at(self, origin: FaultOrigin) -> RuntimeError {
        RuntimeError::Fault {
            origin,
            source: Box::new(self),
        }
    }

    /// The innermost, unwrapped error.
    pub fn root_cause(&self) -> &RuntimeError {
        let mut current = self;
        while let RuntimeError::Fault { source, .. } = current {
            current = source;
        }
        current
    }

    /// Every unit the fault passed through, outermost first.
    pub fn trace(&self) -> Vec<&FaultOrigin> {
        let mut origins = Vec::new();
        let mut current = self;
        while let RuntimeError::Fault { origin, source } = current {
            origins.push(origin);
            current = source;
        }
        origins
    }

    pub fn is_unresolved_member(&self) -> bool {
        matches!(self, RuntimeError::UnresolvedMember { .. })
    }
}
