//! Edit-time validation of a graph.
//!
//! [`validate_graph`] scans every body and reports all problems at once as
//! [`Diagnostic`]s. It only reads the graph and never fails; an empty list
//! means the graph is ready to run.
//!
//! Members inherited from a graph base cannot be checked without the base, so
//! lookups of variables, properties and functions are skipped when the graph
//! derives from another graph.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use nodegraph_core::graph::Graph;
use nodegraph_core::id::NodeId;
use nodegraph_core::member::MemberReference;
use nodegraph_core::node::Node;
use nodegraph_core::ops::NodeKind;
use nodegraph_core::root::{RootKind, RootObject};
use nodegraph_core::types::{ConstValue, TypeRef};

use crate::interpreter::graph_name_of;

/// Where a diagnostic applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub graph: String,
    pub function: String,
    pub node: Option<NodeId>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.graph, self.function)?;
        if let Some(node) = self.node {
            write!(f, " node {node}")?;
        }
        Ok(())
    }
}

/// The problem a diagnostic reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum DiagnosticKind {
    #[error("body has no start node")]
    MissingStartNode,

    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String },

    #[error("unknown property `{name}`")]
    UnknownProperty { name: String },

    #[error("unknown function `{name}` with {arity} argument(s)")]
    UnknownFunction { name: String, arity: usize },

    #[error("unknown local `{name}`")]
    UnknownLocal { name: String },

    /// A port reads a node that does not exist in this body.
    #[error("port reads missing node {node}")]
    DanglingPort { node: NodeId },

    #[error("parameter #{index} out of range for {arity} parameter(s)")]
    ParameterOutOfRange { index: usize, arity: usize },

    #[error("return without a value in a function returning {expected}")]
    MissingReturnValue { expected: TypeRef },

    #[error("return with a value in a body returning void")]
    UnexpectedReturnValue,

    #[error("no return reachable from the start node of a function returning {expected}")]
    NoReachableReturn { expected: TypeRef },

    #[error("suspension point in a body that does not return an iterator")]
    SuspendInSynchronousBody,

    #[error("literal of type {got} on a port of type {expected}")]
    LiteralTypeMismatch { expected: TypeRef, got: TypeRef },
}

/// A problem found by [`validate_graph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{location}: {kind}")]
pub struct Diagnostic {
    pub location: Location,
    pub kind: DiagnosticKind,
}

/// Validates every body of `graph`.
pub fn validate_graph(graph: &Graph) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let inherits = graph.base.as_ref().and_then(graph_name_of).is_some();

    for root in graph.roots() {
        let mut body = BodyCheck {
            graph,
            root,
            inherits,
            diagnostics: &mut diagnostics,
        };
        body.check();
    }
    diagnostics
}

struct BodyCheck<'a> {
    graph: &'a Graph,
    root: &'a RootObject,
    inherits: bool,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl BodyCheck<'_> {
    fn report(&mut self, node: Option<NodeId>, kind: DiagnosticKind) {
        self.diagnostics.push(Diagnostic {
            location: Location {
                graph: self.graph.qualified_name(),
                function: self.root.name.clone(),
                node,
            },
            kind,
        });
    }

    fn check(&mut self) {
        let graph = self.graph;
        let nodes = graph.body_nodes(self.root.id);
        match self.root.start_node {
            None => {
                // Interface members are declarations; an empty constructor is a no-op.
                let bodiless = self.graph.is_interface() || self.root.kind == RootKind::Constructor;
                if !bodiless || !nodes.is_empty() {
                    self.report(None, DiagnosticKind::MissingStartNode);
                }
            }
            Some(start) => {
                if self.root.requires_return() && !self.reaches_return(start) {
                    self.report(
                        None,
                        DiagnosticKind::NoReachableReturn {
                            expected: self.root.return_type.clone(),
                        },
                    );
                }
            }
        }

        let bound: HashSet<&str> = nodes
            .iter()
            .filter_map(|&id| match graph.node(id).map(|n| &n.kind) {
                Some(NodeKind::ForEach { item }) => Some(item.as_str()),
                _ => None,
            })
            .collect();

        for id in nodes {
            if let Some(node) = graph.node(id) {
                self.check_node(id, node, &bound);
            }
        }
    }

    fn reaches_return(&self, start: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if matches!(self.graph.node(id).map(|n| &n.kind), Some(NodeKind::Return)) {
                return true;
            }
            queue.extend(self.graph.flow_targets(id).into_iter().map(|(_, target)| target));
        }
        false
    }

    fn check_node(&mut self, id: NodeId, node: &Node, bound: &HashSet<&str>) {
        match &node.kind {
            NodeKind::SetValue { target, .. } => self.check_reference(id, target, 0, bound),
            NodeKind::Get { source } => self.check_reference(id, source, 0, bound),
            NodeKind::Invoke { target } => {
                let arity = if node.kind.takes_receiver() {
                    node.inputs.len().saturating_sub(1)
                } else {
                    node.inputs.len()
                };
                self.check_reference(id, target, arity, bound);
            }
            NodeKind::Return => {
                let has_value = !node.inputs.is_empty();
                if self.root.requires_return() && !has_value {
                    self.report(
                        Some(id),
                        DiagnosticKind::MissingReturnValue {
                            expected: self.root.return_type.clone(),
                        },
                    );
                }
                if self.root.return_type.is_void() && has_value {
                    self.report(Some(id), DiagnosticKind::UnexpectedReturnValue);
                }
            }
            kind if kind.is_suspension() && !self.root.is_cooperative() => {
                self.report(Some(id), DiagnosticKind::SuspendInSynchronousBody);
            }
            _ => {}
        }

        for port in &node.inputs {
            self.check_reference(id, &port.source, 0, bound);
            if let MemberReference::Literal(value) = &port.source {
                self.check_literal(id, value, &port.ty);
            }
        }
    }

    fn check_literal(&mut self, id: NodeId, value: &ConstValue, expected: &TypeRef) {
        let got = value.type_ref();
        let compatible = *expected == TypeRef::object()
            || matches!(value, ConstValue::Null)
            || got == *expected
            || (got == TypeRef::int() && *expected == TypeRef::float());
        if !compatible {
            self.report(
                Some(id),
                DiagnosticKind::LiteralTypeMismatch {
                    expected: expected.clone(),
                    got,
                },
            );
        }
    }

    fn check_reference(
        &mut self,
        id: NodeId,
        reference: &MemberReference,
        arity: usize,
        bound: &HashSet<&str>,
    ) {
        let kind = match reference {
            MemberReference::Variable { name }
                if !self.inherits && self.graph.variable(name).is_none() =>
            {
                DiagnosticKind::UnknownVariable { name: name.clone() }
            }
            MemberReference::Property { name }
                if !self.inherits && self.graph.property(name).is_none() =>
            {
                DiagnosticKind::UnknownProperty { name: name.clone() }
            }
            MemberReference::Function { name }
                if !self.inherits && self.graph.function(name, arity).is_none() =>
            {
                DiagnosticKind::UnknownFunction {
                    name: name.clone(),
                    arity,
                }
            }
            MemberReference::Local { name }
                if self.root.local(name).is_none() && !bound.contains(name.as_str()) =>
            {
                DiagnosticKind::UnknownLocal { name: name.clone() }
            }
            MemberReference::Parameter { index } if *index >= self.root.arity() => {
                DiagnosticKind::ParameterOutOfRange {
                    index: *index,
                    arity: self.root.arity(),
                }
            }
            MemberReference::NodePort { node, .. }
                if self.graph.node(*node).map(|n| n.owner) != Some(self.root.id) =>
            {
                DiagnosticKind::DanglingPort { node: *node }
            }
            _ => return,
        };
        self.report(Some(id), kind);
    }
}
