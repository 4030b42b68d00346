//! Execution trace recording.
//!
//! When [`EngineConfig::trace_enabled`](crate::config::EngineConfig) is set,
//! each activation records a [`TraceEntry`] for every flow node it executes.

use nodegraph_core::id::NodeId;

use crate::value::Value;

/// One executed flow node.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub node_id: NodeId,
    /// Operation label, e.g. `SetValue`.
    pub label: &'static str,
    /// Value the node published on its output, if any.
    pub output: Option<Value>,
}
