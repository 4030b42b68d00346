//! Graph: the class-like aggregate that owns variables, properties,
//! functions, constructors and the node arena their bodies live in.
//!
//! [`Graph`] is the single entry point for building and querying a
//! graph-defined type. All nodes live in one flat `StableGraph`; body
//! boundaries are the nodes' `owner` ids, and owners are referred to by id
//! rather than by reference, so there are no ownership cycles.
//!
//! Once published, a graph is identified by its qualified name
//! (`namespace.name`), never by the address of any particular copy.

use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use crate::edge::{FlowEdge, FlowSlot};
use crate::error::CoreError;
use crate::id::{EdgeId, NodeId, RootId};
use crate::node::Node;
use crate::ops::NodeKind;
use crate::root::{Parameter, Property, RootKind, RootObject, Variable};
use crate::types::{GenericParameter, TypeRef, Visibility};

/// Whether a graph declares a class or an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphKind {
    Class,
    Interface,
}

/// A graph-defined type and the bodies of its members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub name: String,
    pub namespace: String,
    pub kind: GraphKind,
    /// Base type; `None` means `object`.
    pub base: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub generic_params: Vec<GenericParameter>,
    variables: Vec<Variable>,
    properties: Vec<Property>,
    /// Functions, constructors and accessors in declaration order.
    roots: Vec<RootObject>,
    nodes: StableGraph<Node, FlowEdge, Directed, u32>,
    next_root_id: u32,
}

impl Graph {
    /// Creates an empty class graph.
    pub fn new(namespace: &str, name: &str) -> Self {
        Graph {
            name: name.to_string(),
            namespace: namespace.to_string(),
            kind: GraphKind::Class,
            base: None,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            variables: Vec::new(),
            properties: Vec::new(),
            roots: Vec::new(),
            nodes: StableGraph::new(),
            next_root_id: 0,
        }
    }

    /// Creates an empty interface graph.
    pub fn interface(namespace: &str, name: &str) -> Self {
        Graph {
            kind: GraphKind::Interface,
            ..Graph::new(namespace, name)
        }
    }

    /// `namespace.name`, or just `name` without a namespace.
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == GraphKind::Interface
    }

    pub fn is_generic_definition(&self) -> bool {
        !self.generic_params.is_empty()
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn roots(&self) -> &[RootObject] {
        &self.roots
    }

    pub fn root(&self, id: RootId) -> Option<&RootObject> {
        self.roots.iter().find(|r| r.id == id)
    }

    pub fn root_mut(&mut self, id: RootId) -> Option<&mut RootObject> {
        self.roots.iter_mut().find(|r| r.id == id)
    }

    /// Functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &RootObject> {
        self.roots
            .iter()
            .filter(|r| matches!(r.kind, RootKind::Function))
    }

    /// Constructors in declaration order.
    pub fn constructors(&self) -> impl Iterator<Item = &RootObject> {
        self.roots
            .iter()
            .filter(|r| matches!(r.kind, RootKind::Constructor))
    }

    /// First function with the given name, any arity.
    pub fn function_by_name(&self, name: &str) -> Option<&RootObject> {
        self.functions().find(|f| f.name == name)
    }

    /// Function overload with the given name and arity.
    pub fn function(&self, name: &str, arity: usize) -> Option<&RootObject> {
        self.functions()
            .find(|f| f.name == name && f.arity() == arity)
    }

    /// Constructor with the given arity.
    pub fn constructor(&self, arity: usize) -> Option<&RootObject> {
        self.constructors().find(|c| c.arity() == arity)
    }

    /// Returns a read-only reference to the node arena.
    pub fn nodes(&self) -> &StableGraph<Node, FlowEdge, Directed, u32> {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.node_weight(id.into())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.node_weight_mut(id.into())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.node_count()
    }

    /// All nodes owned by a body, in id order.
    pub fn body_nodes(&self, root: RootId) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .node_indices()
            .filter(|&idx| self.nodes[idx].owner == root)
            .map(NodeId::from)
            .collect();
        ids.sort();
        ids
    }

    /// Follows the flow edge leaving `node` through `slot`.
    pub fn next(&self, node: NodeId, slot: FlowSlot) -> Option<NodeId> {
        self.nodes
            .edges_directed(node.into(), Direction::Outgoing)
            .find(|e| e.weight().slot == slot)
            .map(|e| NodeId::from(e.target()))
    }

    /// Outgoing flow slots of a node with their targets.
    pub fn flow_targets(&self, node: NodeId) -> Vec<(FlowSlot, NodeId)> {
        self.nodes
            .edges_directed(node.into(), Direction::Outgoing)
            .map(|e| (e.weight().slot, NodeId::from(e.target())))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Member builders
    // -----------------------------------------------------------------------

    fn check_free_name(&self, name: &str) -> Result<(), CoreError> {
        if self.variable(name).is_some() || self.property(name).is_some() {
            return Err(CoreError::DuplicateMember {
                graph: self.qualified_name(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn check_class(&self, operation: &str) -> Result<(), CoreError> {
        if self.is_interface() {
            return Err(CoreError::Unsupported {
                graph: self.qualified_name(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn push_root(
        &mut self,
        name: String,
        kind: RootKind,
        params: Vec<Parameter>,
        return_type: TypeRef,
    ) -> RootId {
        let id = RootId(self.next_root_id);
        self.next_root_id += 1;
        let root = RootObject::new(id, name, kind, self.qualified_name(), params, return_type);
        self.roots.push(root);
        id
    }

    /// Adds an instance variable.
    pub fn add_variable(&mut self, variable: Variable) -> Result<(), CoreError> {
        self.check_class("instance variables")?;
        self.check_free_name(&variable.name)?;
        self.variables.push(variable);
        Ok(())
    }

    /// Adds an auto-property backed by instance storage.
    pub fn add_property(&mut self, name: &str, ty: TypeRef) -> Result<(), CoreError> {
        self.check_free_name(name)?;
        self.properties.push(Property {
            name: name.to_string(),
            ty,
            getter: None,
            setter: None,
            visibility: Visibility::Public,
        });
        Ok(())
    }

    /// Adds a property with accessor bodies, returning their ids.
    ///
    /// The getter is named `get_<name>` and returns `ty`; the setter is named
    /// `set_<name>` and takes a single `value` parameter.
    pub fn add_property_with_accessors(
        &mut self,
        name: &str,
        ty: TypeRef,
        getter: bool,
        setter: bool,
    ) -> Result<(Option<RootId>, Option<RootId>), CoreError> {
        self.check_free_name(name)?;
        let get_id = getter.then(|| {
            self.push_root(
                format!("get_{name}"),
                RootKind::Getter {
                    property: name.to_string(),
                },
                Vec::new(),
                ty.clone(),
            )
        });
        let set_id = setter.then(|| {
            self.push_root(
                format!("set_{name}"),
                RootKind::Setter {
                    property: name.to_string(),
                },
                vec![Parameter::new("value", ty.clone())],
                TypeRef::void(),
            )
        });
        self.properties.push(Property {
            name: name.to_string(),
            ty,
            getter: get_id,
            setter: set_id,
            visibility: Visibility::Public,
        });
        Ok((get_id, set_id))
    }

    /// Adds a function. Overloads must differ in arity.
    pub fn add_function(
        &mut self,
        name: &str,
        params: Vec<Parameter>,
        return_type: TypeRef,
    ) -> Result<RootId, CoreError> {
        if self.function(name, params.len()).is_some() {
            return Err(CoreError::DuplicateMember {
                graph: self.qualified_name(),
                name: name.to_string(),
            });
        }
        Ok(self.push_root(name.to_string(), RootKind::Function, params, return_type))
    }

    /// Adds a constructor. Overloads must differ in arity.
    pub fn add_constructor(&mut self, params: Vec<Parameter>) -> Result<RootId, CoreError> {
        self.check_class("constructors")?;
        if self.constructor(params.len()).is_some() {
            return Err(CoreError::DuplicateMember {
                graph: self.qualified_name(),
                name: ".ctor".to_string(),
            });
        }
        Ok(self.push_root(
            ".ctor".to_string(),
            RootKind::Constructor,
            params,
            TypeRef::void(),
        ))
    }

    // -----------------------------------------------------------------------
    // Node builders
    // -----------------------------------------------------------------------

    /// Adds a node to the arena. Errors if its owner body does not exist.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, CoreError> {
        if self.root(node.owner).is_none() {
            return Err(CoreError::RootNotFound { id: node.owner });
        }
        self.check_class("node bodies")?;
        Ok(NodeId::from(self.nodes.add_node(node)))
    }

    /// Convenience: adds a port-less node of `kind` to `owner`.
    pub fn add(&mut self, owner: RootId, kind: NodeKind) -> Result<NodeId, CoreError> {
        self.add_node(Node::new(kind, owner))
    }

    /// Removes a node and its flow edges. Ports of other nodes that read it
    /// are left dangling and reported by validation.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, CoreError> {
        for root in self.roots.iter_mut() {
            if root.start_node == Some(id) {
                root.start_node = None;
            }
        }
        self.nodes
            .remove_node(id.into())
            .ok_or(CoreError::NodeNotFound { id })
    }

    /// Connects `from`'s `slot` to `to`, replacing any previous target of
    /// that slot.
    ///
    /// Both nodes must be flow nodes of the same body.
    pub fn connect(&mut self, from: NodeId, slot: FlowSlot, to: NodeId) -> Result<EdgeId, CoreError> {
        let from_node = self.node(from).ok_or(CoreError::NodeNotFound { id: from })?;
        let to_node = self.node(to).ok_or(CoreError::NodeNotFound { id: to })?;

        if from_node.owner != to_node.owner {
            return Err(CoreError::InvalidEdge {
                reason: format!(
                    "node {from} (body {}) and node {to} (body {}) belong to different bodies",
                    from_node.owner, to_node.owner
                ),
            });
        }
        if !from_node.is_flow() || !to_node.is_flow() {
            return Err(CoreError::InvalidEdge {
                reason: format!("flow edge {from} -> {to} touches a data-only node"),
            });
        }

        let existing: Vec<_> = self
            .nodes
            .edges_directed(from.into(), Direction::Outgoing)
            .filter(|e| e.weight().slot == slot)
            .map(|e| e.id())
            .collect();
        for edge in existing {
            self.nodes.remove_edge(edge);
        }

        let idx = self.nodes.add_edge(from.into(), to.into(), FlowEdge::new(slot));
        Ok(EdgeId::from(idx))
    }

    /// Connects a straight line of flow nodes through their `Next` slots.
    pub fn chain(&mut self, nodes: &[NodeId]) -> Result<(), CoreError> {
        for pair in nodes.windows(2) {
            self.connect(pair[0], FlowSlot::Next, pair[1])?;
        }
        Ok(())
    }

    /// Sets the first node of a body.
    pub fn set_start(&mut self, root: RootId, node: NodeId) -> Result<(), CoreError> {
        let owner = self.node(node).ok_or(CoreError::NodeNotFound { id: node })?.owner;
        if owner != root {
            return Err(CoreError::InvalidEdge {
                reason: format!("start node {node} belongs to body {owner}, not {root}"),
            });
        }
        let body = self.root_mut(root).ok_or(CoreError::RootNotFound { id: root })?;
        body.start_node = Some(node);
        Ok(())
    }
}
