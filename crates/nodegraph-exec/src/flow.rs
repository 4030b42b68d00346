//! Activation state machine: one execution of one body.
//!
//! An [`Activation`] walks flow edges from an entry node using an explicit
//! work stack. State transitions:
//! `Ready -> Running -> (Suspended -> Running)* -> (Completed | Error)`.
//!
//! - Flow nodes execute strictly in connection order. `If` pushes its `Next`
//!   continuation below the taken branch, loops push a marker that `Break`
//!   and `Continue` unwind to, and `Return` clears the stack.
//! - Data inputs are pulled recursively from each port's
//!   [`MemberReference`]. A `NodePort` read returns the cached output of an
//!   executed flow node, or evaluates a data node on demand.
//! - `Wait` and `Yield` suspend the activation. Only bodies with an iterator
//!   return contract may suspend; elsewhere they are a fault.
//! - Every node records its [`JumpStatement`]; the record of a node is
//!   replaced each time the node runs again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use nodegraph_core::edge::FlowSlot;
use nodegraph_core::graph::Graph;
use nodegraph_core::id::{NodeId, RootId};
use nodegraph_core::member::MemberReference;
use nodegraph_core::node::{JumpKind, JumpStatement, Node};
use nodegraph_core::ops::{AssignOp, NodeKind};
use nodegraph_core::root::RootObject;
use nodegraph_core::types::TypeRef;

use crate::error::{FaultOrigin, RuntimeError};
use crate::eval::{eval_binary, eval_compare, eval_not, expect_bool};
use crate::interpreter::Interpreter;
use crate::trace::TraceEntry;
use crate::value::{Object, ObjectRef, Value};

/// How an activation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Why a cooperative activation is suspended.
#[derive(Debug, Clone)]
pub enum Suspension {
    /// `Wait` for the given number of ticks.
    Ticks(u32),
    /// `Yield` of a value to the scheduler.
    Yield(Value),
}

/// Lifecycle of an activation.
#[derive(Debug)]
pub enum ActivationState {
    Ready,
    Running,
    Suspended(Suspension),
    Completed(Outcome),
    Error(RuntimeError),
}

/// One entry of the work stack.
#[derive(Debug)]
enum Step {
    Run(NodeId),
    /// `While` marker: re-test the condition.
    Loop(NodeId),
    /// `ForEach` marker over a snapshot of the collection.
    ForEach {
        node: NodeId,
        items: Vec<Value>,
        index: usize,
    },
}

/// One execution of a function, constructor or accessor body.
pub struct Activation {
    interp: Interpreter,
    graph: Arc<Graph>,
    root: RootId,
    /// Position of the body in `graph.roots()`.
    body_index: usize,
    this: Option<ObjectRef>,
    args: Vec<Value>,
    locals: HashMap<String, Value>,
    stack: Vec<Step>,
    outcomes: HashMap<NodeId, JumpStatement>,
    /// Outputs of executed flow nodes.
    port_cache: HashMap<NodeId, Value>,
    /// Data nodes currently being evaluated, for cycle detection.
    evaluating: HashSet<NodeId>,
    returned: Option<Value>,
    /// A Break/Continue that found no enclosing loop.
    unmatched: Option<JumpKind>,
    state: ActivationState,
    depth: usize,
    steps: u64,
    trace: Option<Vec<TraceEntry>>,
}

impl Activation {
    /// Creates an activation in the `Ready` state.
    pub fn new(
        interp: Interpreter,
        graph: Arc<Graph>,
        root: RootId,
        this: Option<ObjectRef>,
        args: Vec<Value>,
    ) -> Result<Self, RuntimeError> {
        let body_index = graph
            .roots()
            .iter()
            .position(|r| r.id == root)
            .ok_or_else(|| RuntimeError::UnresolvedMember {
                owner: graph.qualified_name(),
                member: format!("#{root}"),
            })?;
        let body = &graph.roots()[body_index];
        if body.arity() != args.len() {
            return Err(RuntimeError::ArgumentCount {
                function: body.name.clone(),
                expected: body.arity(),
                got: args.len(),
            });
        }
        let trace = interp.config().trace_enabled.then(Vec::new);

        Ok(Activation {
            interp,
            graph,
            root,
            body_index,
            this,
            args,
            locals: HashMap::new(),
            stack: Vec::new(),
            outcomes: HashMap::new(),
            port_cache: HashMap::new(),
            evaluating: HashSet::new(),
            returned: None,
            unmatched: None,
            state: ActivationState::Ready,
            depth: 0,
            steps: 0,
            trace,
        })
    }

    pub(crate) fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    fn body(&self) -> &RootObject {
        &self.graph.roots()[self.body_index]
    }

    pub fn function_name(&self) -> String {
        format!("{}.{}", self.graph.qualified_name(), self.body().name)
    }

    pub fn state(&self) -> &ActivationState {
        &self.state
    }

    /// The terminal outcome, once completed.
    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.state {
            ActivationState::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// The last recorded outcome of a node in this activation.
    pub fn node_outcome(&self, node: NodeId) -> Option<JumpStatement> {
        self.outcomes.get(&node).copied()
    }

    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    pub fn trace(&self) -> Option<&[TraceEntry]> {
        self.trace.as_deref()
    }

    /// Starts at the body's start node.
    pub fn start(&mut self) {
        let entry = self.body().start_node;
        self.begin(entry);
    }

    /// Starts (or restarts) at an explicit entry node.
    pub fn start_at(&mut self, entry: NodeId) {
        self.begin(Some(entry));
    }

    fn begin(&mut self, entry: Option<NodeId>) {
        self.stack.clear();
        self.outcomes.clear();
        self.port_cache.clear();
        self.evaluating.clear();
        self.returned = None;
        self.unmatched = None;
        self.steps = 0;
        if let Some(trace) = self.trace.as_mut() {
            trace.clear();
        }
        self.init_locals();
        if let Some(entry) = entry {
            self.stack.push(Step::Run(entry));
        }
        debug!(function = %self.function_name(), depth = self.depth, "activation started");
        self.state = ActivationState::Running;
    }

    /// Resets locals per their reset flag; persistent locals reload the value
    /// retained on the instance.
    fn init_locals(&mut self) {
        let graph = Arc::clone(&self.graph);
        let body = &graph.roots()[self.body_index];
        self.locals.clear();
        let retained = self.this.as_ref().map(|obj| obj.lock());
        for local in &body.locals {
            let kept = if local.reset_on_entry {
                None
            } else {
                retained
                    .as_ref()
                    .and_then(|guard| guard.as_graph())
                    .and_then(|obj| obj.retained_locals.get(&(self.root, local.name.clone())))
                    .cloned()
            };
            let value = kept.unwrap_or_else(|| Value::from_const(&local.initial()));
            self.locals.insert(local.name.clone(), value);
        }
    }

    /// Continues a suspended activation.
    pub fn resume(&mut self) {
        if matches!(self.state, ActivationState::Suspended(_)) {
            self.state = ActivationState::Running;
        }
    }

    /// Abandons the activation. It ends in the `Stopped` error state.
    pub fn stop(&mut self) {
        self.stack.clear();
        self.state = ActivationState::Error(RuntimeError::Stopped);
    }

    /// Steps until the activation leaves the `Running` state.
    pub fn run(&mut self) -> &ActivationState {
        while matches!(self.state, ActivationState::Running) {
            self.step();
        }
        &self.state
    }

    /// Executes one step of the work stack.
    pub fn step(&mut self) -> &ActivationState {
        if !matches!(self.state, ActivationState::Running) {
            return &self.state;
        }

        if let Some(limit) = self.interp.config().max_steps {
            if self.steps >= limit {
                self.state = ActivationState::Error(RuntimeError::StepLimitExceeded { limit });
                return &self.state;
            }
        }
        self.steps += 1;

        let result = match self.stack.pop() {
            None => {
                self.finish();
                return &self.state;
            }
            Some(Step::Run(node)) => self.exec_node(node).map_err(|e| e.at(self.origin(node))),
            Some(Step::Loop(node)) => self.exec_loop(node).map_err(|e| e.at(self.origin(node))),
            Some(Step::ForEach { node, items, index }) => {
                self.exec_for_each(node, items, index);
                Ok(())
            }
        };

        if let Err(err) = result {
            debug!(function = %self.function_name(), error = %err, "activation failed");
            self.state = ActivationState::Error(err);
        }
        &self.state
    }

    /// Consumes the terminal state into the body's result value.
    pub fn take_result(&mut self) -> Result<Value, RuntimeError> {
        let state = std::mem::replace(&mut self.state, ActivationState::Ready);
        match state {
            ActivationState::Completed(Outcome::Return(value)) => Ok(value),
            ActivationState::Completed(_) => Ok(Value::Null),
            ActivationState::Error(err) => Err(err),
            other => {
                self.state = other;
                Err(RuntimeError::Incomplete {
                    function: self.function_name(),
                })
            }
        }
    }

    fn finish(&mut self) {
        let outcome = match (self.returned.take(), self.unmatched) {
            (Some(value), _) => Outcome::Return(value),
            (None, Some(JumpKind::Break)) => Outcome::Break,
            (None, Some(JumpKind::Continue)) => Outcome::Continue,
            (None, _) => Outcome::Normal,
        };

        if self.body().requires_return() && !matches!(outcome, Outcome::Return(_)) {
            debug!(function = %self.function_name(), "missing return");
            self.state = ActivationState::Error(RuntimeError::MissingReturn {
                function: self.function_name(),
            });
            return;
        }
        debug!(function = %self.function_name(), ?outcome, "activation completed");
        self.state = ActivationState::Completed(outcome);
    }

    fn origin(&self, node: NodeId) -> FaultOrigin {
        FaultOrigin::Node {
            graph: self.graph.qualified_name(),
            function: self.body().name.clone(),
            node,
        }
    }

    // -----------------------------------------------------------------------
    // Flow nodes
    // -----------------------------------------------------------------------

    fn push_next(&mut self, node: NodeId) {
        if let Some(next) = self.graph.next(node, FlowSlot::Next) {
            self.stack.push(Step::Run(next));
        }
    }

    fn push_slot(&mut self, node: NodeId, slot: FlowSlot) {
        if let Some(target) = self.graph.next(node, slot) {
            self.stack.push(Step::Run(target));
        }
    }

    fn exec_node(&mut self, id: NodeId) -> Result<(), RuntimeError> {
        let graph = Arc::clone(&self.graph);
        let node = graph
            .node(id)
            .filter(|n| n.owner == self.root)
            .ok_or(RuntimeError::NodeNotFound { node: id })?;

        self.outcomes.remove(&id);
        self.port_cache.remove(&id);
        let mut jump = JumpKind::Normal;
        let mut output = None;

        match &node.kind {
            NodeKind::SetValue { target, op } => {
                self.exec_set(node, target, *op)?;
                self.push_next(id);
            }
            NodeKind::Invoke { .. } | NodeKind::New { .. } => {
                let value = self.eval_data(id, node)?;
                self.port_cache.insert(id, value.clone());
                output = Some(value);
                self.push_next(id);
            }
            NodeKind::If => {
                let condition = expect_bool(&self.input(node, 0)?)?;
                self.push_next(id);
                self.push_slot(id, if condition { FlowSlot::True } else { FlowSlot::False });
            }
            NodeKind::While => self.stack.push(Step::Loop(id)),
            NodeKind::ForEach { .. } => {
                let items = match self.input(node, 0)? {
                    Value::List(list) => list.lock().clone(),
                    Value::Null => Vec::new(),
                    other => {
                        return Err(RuntimeError::TypeMismatch {
                            expected: TypeRef::list_of(TypeRef::object()).to_string(),
                            got: other.type_name(),
                        })
                    }
                };
                self.stack.push(Step::ForEach {
                    node: id,
                    items,
                    index: 0,
                });
            }
            NodeKind::Break => {
                jump = JumpKind::Break;
                self.unwind(JumpKind::Break);
            }
            NodeKind::Continue => {
                jump = JumpKind::Continue;
                self.unwind(JumpKind::Continue);
            }
            NodeKind::Return => {
                let value = if node.inputs.is_empty() {
                    Value::Null
                } else {
                    self.input(node, 0)?
                };
                jump = JumpKind::Return;
                output = Some(value.clone());
                self.returned = Some(value);
                self.stack.clear();
            }
            NodeKind::Wait { ticks } => {
                self.ensure_cooperative()?;
                self.push_next(id);
                self.state = ActivationState::Suspended(Suspension::Ticks(*ticks));
                debug!(function = %self.function_name(), ticks, "suspended");
            }
            NodeKind::Yield => {
                self.ensure_cooperative()?;
                let value = if node.inputs.is_empty() {
                    Value::Null
                } else {
                    self.input(node, 0)?
                };
                self.push_next(id);
                output = Some(value.clone());
                self.state = ActivationState::Suspended(Suspension::Yield(value));
                debug!(function = %self.function_name(), "yielded");
            }
            NodeKind::Literal(_)
            | NodeKind::Get { .. }
            | NodeKind::Binary { .. }
            | NodeKind::Compare { .. }
            | NodeKind::Not
            | NodeKind::MakeList => {
                let value = self.eval_data(id, node)?;
                self.port_cache.insert(id, value.clone());
                output = Some(value);
                self.push_next(id);
            }
        }

        self.outcomes.insert(id, JumpStatement::new(jump, id));
        if let Some(trace) = self.trace.as_mut() {
            trace.push(TraceEntry {
                node_id: id,
                label: node.kind.label(),
                output,
            });
        }
        Ok(())
    }

    fn exec_loop(&mut self, id: NodeId) -> Result<(), RuntimeError> {
        let graph = Arc::clone(&self.graph);
        let node = graph.node(id).ok_or(RuntimeError::NodeNotFound { node: id })?;
        if expect_bool(&self.input(node, 0)?)? {
            self.stack.push(Step::Loop(id));
            self.push_slot(id, FlowSlot::Body);
        } else {
            self.push_next(id);
        }
        Ok(())
    }

    fn exec_for_each(&mut self, id: NodeId, items: Vec<Value>, index: usize) {
        if index >= items.len() {
            self.push_next(id);
            return;
        }
        let item = items[index].clone();
        if let Some(NodeKind::ForEach { item: name }) = self.graph.node(id).map(|n| &n.kind) {
            self.locals.insert(name.clone(), item.clone());
        }
        self.port_cache.insert(id, item);
        self.stack.push(Step::ForEach {
            node: id,
            items,
            index: index + 1,
        });
        self.push_slot(id, FlowSlot::Body);
    }

    /// Pops to the innermost loop marker. `Continue` keeps the marker so the
    /// loop runs its next iteration; `Break` drops it and continues after the
    /// loop.
    fn unwind(&mut self, kind: JumpKind) {
        while let Some(step) = self.stack.pop() {
            let loop_node = match &step {
                Step::Loop(node) => *node,
                Step::ForEach { node, .. } => *node,
                Step::Run(_) => continue,
            };
            if kind == JumpKind::Continue {
                self.stack.push(step);
            } else {
                self.push_next(loop_node);
            }
            return;
        }
        self.unmatched = Some(kind);
    }

    fn ensure_cooperative(&self) -> Result<(), RuntimeError> {
        if self.body().is_cooperative() {
            Ok(())
        } else {
            Err(RuntimeError::SuspendInSynchronousBody {
                function: self.function_name(),
            })
        }
    }

    fn exec_set(&mut self, node: &Node, target: &MemberReference, op: AssignOp) -> Result<(), RuntimeError> {
        let (receiver, value) = if node.kind.takes_receiver() {
            (Some(self.input(node, 0)?), self.input(node, 1)?)
        } else {
            (None, self.input(node, 0)?)
        };
        let value = match op.binary() {
            None => value,
            Some(binary) => {
                let current = self.read(target, receiver.clone())?;
                eval_binary(binary, &current, &value)?
            }
        };
        self.write(target, receiver, value)
    }

    // -----------------------------------------------------------------------
    // Data
    // -----------------------------------------------------------------------

    fn input(&mut self, node: &Node, port: u16) -> Result<Value, RuntimeError> {
        match node.input(port) {
            Some(input) => self.read(&input.source, None),
            None => Ok(Value::Null),
        }
    }

    fn inputs_from(&mut self, node: &Node, first: u16) -> Result<Vec<Value>, RuntimeError> {
        (first..node.inputs.len() as u16)
            .map(|port| self.input(node, port))
            .collect()
    }

    fn this_value(&self, member: &str) -> Result<Value, RuntimeError> {
        self.this
            .as_ref()
            .map(|obj| Value::Object(Arc::clone(obj)))
            .ok_or_else(|| RuntimeError::NullReference {
                member: member.to_string(),
            })
    }

    fn unresolved_local(&self, name: &str) -> RuntimeError {
        RuntimeError::UnresolvedMember {
            owner: self.function_name(),
            member: name.to_string(),
        }
    }

    /// Resolves a member reference to its current value.
    fn read(&mut self, source: &MemberReference, receiver: Option<Value>) -> Result<Value, RuntimeError> {
        let depth = self.depth + 1;
        match source {
            MemberReference::None => Ok(Value::Null),
            MemberReference::This => Ok(self
                .this
                .as_ref()
                .map(|obj| Value::Object(Arc::clone(obj)))
                .unwrap_or(Value::Null)),
            MemberReference::Literal(value) => Ok(Value::from_const(value)),
            MemberReference::Type(ty) => Ok(Value::Type(ty.clone())),
            MemberReference::Variable { name } => {
                let this = self.this.as_ref().ok_or_else(|| RuntimeError::NullReference {
                    member: name.clone(),
                })?;
                let guard = this.lock();
                let value = guard
                    .as_graph()
                    .and_then(|obj| obj.fields.get(name))
                    .cloned()
                    .ok_or_else(|| RuntimeError::UnresolvedMember {
                        owner: guard.type_name(),
                        member: name.clone(),
                    });
                value
            }
            MemberReference::Property { name } => {
                let this = self.this_value(name)?;
                self.interp.get_member_at(&this, name, depth)
            }
            MemberReference::Function { name } => self.call_own(name, Vec::new()),
            MemberReference::Local { name } => self
                .locals
                .get(name)
                .cloned()
                .ok_or_else(|| self.unresolved_local(name)),
            MemberReference::Parameter { index } => self
                .args
                .get(*index)
                .cloned()
                .ok_or_else(|| self.unresolved_local(&format!("param #{index}"))),
            MemberReference::Instance { name } => {
                let receiver = match receiver {
                    Some(value) => value,
                    None => self.this_value(name)?,
                };
                self.interp.get_member_at(&receiver, name, depth)
            }
            MemberReference::Native {
                owner,
                name,
                is_static,
            } => {
                let receiver = if *is_static {
                    None
                } else {
                    Some(match receiver {
                        Some(value) => value,
                        None => self.this_value(name)?,
                    })
                };
                self.interp.host().native_get(owner, receiver.as_ref(), name)
            }
            MemberReference::NodePort { node, .. } => self.read_port(*node),
        }
    }

    fn read_port(&mut self, id: NodeId) -> Result<Value, RuntimeError> {
        if let Some(value) = self.port_cache.get(&id) {
            return Ok(value.clone());
        }
        let graph = Arc::clone(&self.graph);
        let node = graph
            .node(id)
            .filter(|n| n.owner == self.root)
            .ok_or(RuntimeError::NodeNotFound { node: id })?;
        if node.kind.is_data() {
            self.eval_data(id, node)
        } else {
            Ok(Value::Null)
        }
    }

    /// Evaluates a data node (or an Invoke/New node used as data).
    fn eval_data(&mut self, id: NodeId, node: &Node) -> Result<Value, RuntimeError> {
        if !self.evaluating.insert(id) {
            return Err(RuntimeError::CyclicDataDependency { node: id });
        }
        let result = self.eval_data_inner(node);
        self.evaluating.remove(&id);
        result
    }

    fn eval_data_inner(&mut self, node: &Node) -> Result<Value, RuntimeError> {
        match &node.kind {
            NodeKind::Literal(value) => Ok(Value::from_const(value)),
            NodeKind::Get { source } => {
                let receiver = if node.kind.takes_receiver() {
                    Some(self.input(node, 0)?)
                } else {
                    None
                };
                self.read(source, receiver)
            }
            NodeKind::Binary { op } => {
                let lhs = self.input(node, 0)?;
                let rhs = self.input(node, 1)?;
                eval_binary(*op, &lhs, &rhs)
            }
            NodeKind::Compare { op } => {
                let lhs = self.input(node, 0)?;
                let rhs = self.input(node, 1)?;
                eval_compare(*op, &lhs, &rhs)
            }
            NodeKind::Not => eval_not(&self.input(node, 0)?),
            NodeKind::MakeList => Ok(Value::list(self.inputs_from(node, 0)?)),
            NodeKind::Invoke { target } => self.exec_invoke(node, target),
            NodeKind::New { ty } => {
                let args = self.inputs_from(node, 0)?;
                self.interp.construct_at(ty, args, self.depth + 1)
            }
            _ => Ok(Value::Null),
        }
    }

    fn exec_invoke(&mut self, node: &Node, target: &MemberReference) -> Result<Value, RuntimeError> {
        let depth = self.depth + 1;
        match target {
            MemberReference::Function { name } => {
                let args = self.inputs_from(node, 0)?;
                self.call_own(name, args)
            }
            MemberReference::Instance { name } => {
                let receiver = self.input(node, 0)?;
                let args = self.inputs_from(node, 1)?;
                self.interp.invoke_member_at(&receiver, name, args, depth)
            }
            MemberReference::Native {
                owner,
                name,
                is_static: true,
            } => {
                let args = self.inputs_from(node, 0)?;
                self.interp.host().native_invoke(owner, None, name, args)
            }
            MemberReference::Native { owner, name, .. } => {
                let receiver = self.input(node, 0)?;
                let args = self.inputs_from(node, 1)?;
                self.interp
                    .host()
                    .native_invoke(owner, Some(&receiver), name, args)
            }
            other => Err(RuntimeError::NotInvocable {
                target: format!("{other:?}"),
            }),
        }
    }

    /// Calls a function of this graph (or its bases) on the current instance.
    fn call_own(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let (graph, root) = self
            .interp
            .resolve_function(&self.graph, name, args.len())
            .ok_or_else(|| RuntimeError::UnresolvedMember {
                owner: self.graph.qualified_name(),
                member: name.to_string(),
            })?;
        let is_static = graph.root(root).map(|r| r.is_static).unwrap_or(false);
        let this = if is_static { None } else { self.this.clone() };
        self.interp.call_root(graph, root, this, args, self.depth + 1)
    }

    fn write(
        &mut self,
        target: &MemberReference,
        receiver: Option<Value>,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let depth = self.depth + 1;
        match target {
            MemberReference::Variable { name } => {
                let this = self.this.as_ref().ok_or_else(|| RuntimeError::NullReference {
                    member: name.clone(),
                })?;
                let mut guard = this.lock();
                let owner = guard.type_name();
                match guard.as_graph_mut().and_then(|obj| obj.fields.get_mut(name)) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(RuntimeError::UnresolvedMember {
                        owner,
                        member: name.clone(),
                    }),
                }
            }
            MemberReference::Property { name } => {
                let this = self.this_value(name)?;
                self.interp.set_member_at(&this, name, value, depth)
            }
            MemberReference::Instance { name } => {
                let receiver = match receiver {
                    Some(value) => value,
                    None => self.this_value(name)?,
                };
                self.interp.set_member_at(&receiver, name, value, depth)
            }
            MemberReference::Local { name } => {
                if !self.locals.contains_key(name) {
                    return Err(self.unresolved_local(name));
                }
                self.retain_local(name, &value);
                self.locals.insert(name.clone(), value);
                Ok(())
            }
            MemberReference::Parameter { index } => match self.args.get_mut(*index) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(self.unresolved_local(&format!("param #{index}"))),
            },
            MemberReference::Native {
                owner,
                name,
                is_static,
            } => {
                let receiver = if *is_static {
                    None
                } else {
                    Some(match receiver {
                        Some(value) => value,
                        None => self.this_value(name)?,
                    })
                };
                self.interp
                    .host()
                    .native_set(owner, receiver.as_ref(), name, value)
            }
            other => Err(RuntimeError::NotAssignable {
                target: format!("{other:?}"),
            }),
        }
    }

    /// Writes a persistent local through to the instance.
    fn retain_local(&self, name: &str, value: &Value) {
        let persistent = self
            .body()
            .local(name)
            .map(|local| !local.reset_on_entry)
            .unwrap_or(false);
        if !persistent {
            return;
        }
        if let Some(this) = &self.this {
            if let Object::Graph(obj) = &mut *this.lock() {
                obj.retained_locals
                    .insert((self.root, name.to_string()), value.clone());
            }
        }
    }
}
