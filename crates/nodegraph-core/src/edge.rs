//! Flow edges between nodes.
//!
//! Data dependencies are not edges: an input port names its source through a
//! [`MemberReference`](crate::member::MemberReference). Flow edges only decide
//! which node runs next, and may form cycles through loop bodies.

use serde::{Deserialize, Serialize};

/// Which outgoing flow slot of a node an edge leaves from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowSlot {
    /// Continuation after the node (and its nested bodies) finished.
    Next,
    /// `If` taken branch.
    True,
    /// `If` not-taken branch.
    False,
    /// Loop body.
    Body,
}

/// A flow edge in a graph's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub slot: FlowSlot,
}

impl FlowEdge {
    pub fn new(slot: FlowSlot) -> Self {
        FlowEdge { slot }
    }

    pub fn next() -> Self {
        FlowEdge::new(FlowSlot::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_roundtrip_flow_edge() {
        for slot in [FlowSlot::Next, FlowSlot::True, FlowSlot::False, FlowSlot::Body] {
            let edge = FlowEdge::new(slot);
            let json = serde_json::to_string(&edge).unwrap();
            let back: FlowEdge = serde_json::from_str(&json).unwrap();
            assert_eq!(back, edge);
        }
    }
}
