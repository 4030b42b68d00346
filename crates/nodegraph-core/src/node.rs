//! Nodes and their ports.
//!
//! All nodes of a graph live in one flat arena. A body's nodes are those whose
//! `owner` is the body's [`RootId`]; the owning graph is implied by the arena.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::{NodeId, RootId};
use crate::member::MemberReference;
use crate::ops::NodeKind;
use crate::types::TypeRef;

/// A typed input port and the source it reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPort {
    pub name: String,
    pub ty: TypeRef,
    pub source: MemberReference,
}

impl InputPort {
    pub fn new(name: &str, ty: TypeRef, source: MemberReference) -> Self {
        InputPort {
            name: name.to_string(),
            ty,
            source,
        }
    }

    /// An untyped (`object`) port reading `source`.
    pub fn from_source(name: &str, source: MemberReference) -> Self {
        Self::new(name, TypeRef::object(), source)
    }
}

/// A typed output port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPort {
    pub name: String,
    pub ty: TypeRef,
}

/// A computation or flow unit inside one body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    /// Body that owns this node.
    pub owner: RootId,
    pub inputs: SmallVec<[InputPort; 4]>,
    pub outputs: SmallVec<[OutputPort; 1]>,
}

impl Node {
    /// Creates a node with no ports; value-producing kinds get one `object`
    /// output.
    pub fn new(kind: NodeKind, owner: RootId) -> Self {
        let mut outputs = SmallVec::new();
        if kind.is_data() || matches!(kind, NodeKind::ForEach { .. }) {
            outputs.push(OutputPort {
                name: "value".to_string(),
                ty: TypeRef::object(),
            });
        }
        Node {
            kind,
            owner,
            inputs: SmallVec::new(),
            outputs,
        }
    }

    pub fn with_input(mut self, port: InputPort) -> Self {
        self.inputs.push(port);
        self
    }

    /// Adds an untyped input reading `source`.
    pub fn with_source(self, source: MemberReference) -> Self {
        let name = format!("in{}", self.inputs.len());
        self.with_input(InputPort::from_source(&name, source))
    }

    pub fn input(&self, port: u16) -> Option<&InputPort> {
        self.inputs.get(port as usize)
    }

    pub fn is_flow(&self) -> bool {
        self.kind.is_flow()
    }
}

/// How a node's activation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpKind {
    Normal,
    Return,
    Break,
    Continue,
}

/// The outcome a node reports when it finishes, with the node that raised it.
///
/// The engine keeps the last outcome per node and clears it whenever the node
/// is activated again, so outcomes never accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JumpStatement {
    pub kind: JumpKind,
    pub origin: NodeId,
}

impl JumpStatement {
    pub fn new(kind: JumpKind, origin: NodeId) -> Self {
        JumpStatement { kind, origin }
    }

    pub fn is_jump(&self) -> bool {
        self.kind != JumpKind::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConstValue;

    #[test]
    fn value_nodes_get_an_output_port() {
        let lit = Node::new(NodeKind::Literal(ConstValue::Int(1)), RootId(0));
        assert_eq!(lit.outputs.len(), 1);

        let branch = Node::new(NodeKind::If, RootId(0));
        assert!(branch.outputs.is_empty());
    }

    #[test]
    fn with_source_numbers_ports() {
        let node = Node::new(NodeKind::MakeList, RootId(1))
            .with_source(MemberReference::literal(ConstValue::Int(1)))
            .with_source(MemberReference::local("x"));
        assert_eq!(node.inputs.len(), 2);
        assert_eq!(node.input(1).map(|p| p.name.as_str()), Some("in1"));
        assert!(node.input(2).is_none());
    }

    #[test]
    fn normal_outcome_is_not_a_jump() {
        assert!(!JumpStatement::new(JumpKind::Normal, NodeId(0)).is_jump());
        assert!(JumpStatement::new(JumpKind::Break, NodeId(0)).is_jump());
    }
}
