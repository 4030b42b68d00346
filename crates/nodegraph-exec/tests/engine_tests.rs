//! End-to-end tests for the flow engine.
//!
//! Each test builds graphs with the `Graph` builder API, registers them in a
//! `GraphSet` host and runs them through the `Interpreter`.
//!
//! Tests cover:
//! - Return values and missing returns
//! - While/ForEach loops with Break and Continue
//! - Persistent locals
//! - Fault traces across nested calls
//! - Cooperative bodies under the scheduler, including stop
//! - Block lists over graph instances

use std::sync::Arc;

use nodegraph_core::edge::FlowSlot;
use nodegraph_core::graph::Graph;
use nodegraph_core::id::{NodeId, RootId};
use nodegraph_core::member::MemberReference;
use nodegraph_core::node::Node;
use nodegraph_core::ops::{AssignOp, BinaryOp, CompareOp, NodeKind};
use nodegraph_core::root::{LocalVariable, Parameter, Variable};
use nodegraph_core::types::{natives, ConstValue, TypeRef};

use nodegraph_exec::{
    Activation, BlockList, Condition, EngineConfig, ExecutionMode, FaultOrigin, FnCondition,
    GraphAction, GraphCondition, GraphSet, Interpreter, ObjectRef, Outcome, RuntimeError,
    Scheduler, Value,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn engine(graphs: Vec<Graph>) -> Interpreter {
    let host = GraphSet::new();
    for graph in graphs {
        host.insert(graph);
    }
    Interpreter::new(Arc::new(host), EngineConfig::default())
}

fn int(value: i64) -> MemberReference {
    MemberReference::literal(ConstValue::Int(value))
}

fn add_local(graph: &mut Graph, root: RootId, local: LocalVariable) {
    graph.root_mut(root).unwrap().locals.push(local);
}

/// `target op= source`.
fn set(graph: &mut Graph, root: RootId, target: MemberReference, op: AssignOp, source: MemberReference) -> NodeId {
    graph
        .add_node(Node::new(NodeKind::SetValue { target, op }, root).with_source(source))
        .unwrap()
}

fn compare(graph: &mut Graph, root: RootId, op: CompareOp, lhs: MemberReference, rhs: MemberReference) -> NodeId {
    graph
        .add_node(
            Node::new(NodeKind::Compare { op }, root)
                .with_source(lhs)
                .with_source(rhs),
        )
        .unwrap()
}

fn ret(graph: &mut Graph, root: RootId, source: MemberReference) -> NodeId {
    graph
        .add_node(Node::new(NodeKind::Return, root).with_source(source))
        .unwrap()
}

fn instance(interp: &Interpreter, name: &str) -> ObjectRef {
    interp.instantiate(&TypeRef::graph(name), vec![]).unwrap()
}

fn steps(interp: &Interpreter, obj: &ObjectRef) -> Value {
    interp
        .get_member(&Value::Object(Arc::clone(obj)), "Steps")
        .unwrap()
}

// ---------------------------------------------------------------------------
// Graph builders
// ---------------------------------------------------------------------------

/// Build: Score() -> int { return 42 }
fn build_constant_graph() -> (Graph, RootId) {
    let mut graph = Graph::new("Game", "Enemy");
    let f = graph.add_function("Score", vec![], TypeRef::int()).unwrap();
    let r = ret(&mut graph, f, int(42));
    graph.set_start(f, r).unwrap();
    (graph, f)
}

/// Build: Sum(n) -> int
/// ```text
/// while i < n {
///     i += 1
///     if i == 3 { continue }
///     total += i
///     if i == 5 { break }
/// }
/// return total
/// ```
/// Expected for n = 10: 1 + 2 + 4 + 5 = 12
fn build_loop_graph() -> Graph {
    let mut graph = Graph::new("Game", "Math");
    let f = graph
        .add_function("Sum", vec![Parameter::new("n", TypeRef::int())], TypeRef::int())
        .unwrap();
    add_local(&mut graph, f, LocalVariable::new("i", TypeRef::int()));
    add_local(&mut graph, f, LocalVariable::new("total", TypeRef::int()));

    let cond = compare(
        &mut graph,
        f,
        CompareOp::Lt,
        MemberReference::local("i"),
        MemberReference::Parameter { index: 0 },
    );
    let while_node = graph
        .add_node(Node::new(NodeKind::While, f).with_source(MemberReference::port(cond, 0)))
        .unwrap();
    let inc = set(&mut graph, f, MemberReference::local("i"), AssignOp::Add, int(1));

    let is_three = compare(&mut graph, f, CompareOp::Eq, MemberReference::local("i"), int(3));
    let skip = graph
        .add_node(Node::new(NodeKind::If, f).with_source(MemberReference::port(is_three, 0)))
        .unwrap();
    let cont = graph.add(f, NodeKind::Continue).unwrap();

    let accumulate = set(
        &mut graph,
        f,
        MemberReference::local("total"),
        AssignOp::Add,
        MemberReference::local("i"),
    );
    let is_five = compare(&mut graph, f, CompareOp::Eq, MemberReference::local("i"), int(5));
    let stop = graph
        .add_node(Node::new(NodeKind::If, f).with_source(MemberReference::port(is_five, 0)))
        .unwrap();
    let brk = graph.add(f, NodeKind::Break).unwrap();
    let done = ret(&mut graph, f, MemberReference::local("total"));

    graph.connect(while_node, FlowSlot::Body, inc).unwrap();
    graph.connect(while_node, FlowSlot::Next, done).unwrap();
    graph.chain(&[inc, skip, accumulate, stop]).unwrap();
    graph.connect(skip, FlowSlot::True, cont).unwrap();
    graph.connect(stop, FlowSlot::True, brk).unwrap();
    graph.set_start(f, while_node).unwrap();
    graph
}

/// Build: class Patrol { int Steps; IEnumerator Walk() { Steps += 1; wait 2;
/// Steps += 1; yield; Steps += 1 } }
fn build_patrol_graph() -> Graph {
    let mut graph = Graph::new("Game", "Patrol");
    graph.add_variable(Variable::new("Steps", TypeRef::int())).unwrap();
    let f = graph
        .add_function("Walk", vec![], TypeRef::native(natives::ENUMERATOR))
        .unwrap();
    let step = |graph: &mut Graph| set(graph, f, MemberReference::variable("Steps"), AssignOp::Add, int(1));
    let first = step(&mut graph);
    let wait = graph.add(f, NodeKind::Wait { ticks: 2 }).unwrap();
    let second = step(&mut graph);
    let yielded = graph.add(f, NodeKind::Yield).unwrap();
    let third = step(&mut graph);
    graph.chain(&[first, wait, second, yielded, third]).unwrap();
    graph.set_start(f, first).unwrap();

    // Short(): Steps += 1; wait 1; Steps += 1
    let g = graph
        .add_function("Short", vec![], TypeRef::native(natives::ENUMERATOR))
        .unwrap();
    let a = set(&mut graph, g, MemberReference::variable("Steps"), AssignOp::Add, int(1));
    let w = graph.add(g, NodeKind::Wait { ticks: 1 }).unwrap();
    let b = set(&mut graph, g, MemberReference::variable("Steps"), AssignOp::Add, int(1));
    graph.chain(&[a, w, b]).unwrap();
    graph.set_start(g, a).unwrap();

    // Bump() { Steps += 100 }
    let bump = graph.add_function("Bump", vec![], TypeRef::void()).unwrap();
    let add = set(&mut graph, bump, MemberReference::variable("Steps"), AssignOp::Add, int(100));
    graph.set_start(bump, add).unwrap();

    // Mark(): Steps += 10, cooperative without a suspend point
    let mark = graph
        .add_function("Mark", vec![], TypeRef::native(natives::ENUMERATOR))
        .unwrap();
    let add = set(&mut graph, mark, MemberReference::variable("Steps"), AssignOp::Add, int(10));
    graph.set_start(mark, add).unwrap();

    // IsTired() -> bool { return Steps >= 3 }
    let h = graph.add_function("IsTired", vec![], TypeRef::bool()).unwrap();
    let tired = compare(
        &mut graph,
        h,
        CompareOp::Ge,
        MemberReference::variable("Steps"),
        int(3),
    );
    let r = ret(&mut graph, h, MemberReference::port(tired, 0));
    graph.set_start(h, r).unwrap();
    graph
}

// ---------------------------------------------------------------------------
// Return values
// ---------------------------------------------------------------------------

#[test]
fn return_42_completes_with_return_outcome() {
    let (graph, f) = build_constant_graph();
    let interp = engine(vec![graph]);
    let graph = interp.host().graph("Game.Enemy").unwrap();

    let mut activation = Activation::new(interp.clone(), graph, f, None, vec![]).unwrap();
    activation.start();
    activation.run();
    assert_eq!(activation.outcome(), Some(&Outcome::Return(Value::Int(42))));
    assert_eq!(activation.take_result().unwrap(), Value::Int(42));
}

#[test]
fn non_void_function_without_return_fails() {
    let mut graph = Graph::new("Game", "Enemy");
    let f = graph.add_function("Broken", vec![], TypeRef::int()).unwrap();
    add_local(&mut graph, f, LocalVariable::new("x", TypeRef::int()));
    let only = set(&mut graph, f, MemberReference::local("x"), AssignOp::Assign, int(1));
    graph.set_start(f, only).unwrap();
    let interp = engine(vec![graph]);
    let graph = interp.host().graph("Game.Enemy").unwrap();

    let err = interp.call(&graph, "Broken", None, vec![]).unwrap_err();
    assert!(matches!(err, RuntimeError::MissingReturn { ref function } if function == "Game.Enemy.Broken"));
}

#[test]
fn overloads_resolve_by_arity() {
    let interp = engine(vec![build_loop_graph()]);
    let graph = interp.host().graph("Game.Math").unwrap();
    let err = interp.call(&graph, "Sum", None, vec![]).unwrap_err();
    assert!(err.is_unresolved_member());
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

#[test]
fn while_loop_honours_break_and_continue() {
    let interp = engine(vec![build_loop_graph()]);
    let graph = interp.host().graph("Game.Math").unwrap();

    let sum = interp.call(&graph, "Sum", None, vec![Value::Int(10)]).unwrap();
    assert_eq!(sum, Value::Int(12));

    // The loop ends on its condition before reaching the break.
    let short = interp.call(&graph, "Sum", None, vec![Value::Int(2)]).unwrap();
    assert_eq!(short, Value::Int(3));
}

#[test]
fn foreach_binds_each_item() {
    let mut graph = Graph::new("Game", "Math");
    let f = graph.add_function("Total", vec![], TypeRef::int()).unwrap();
    add_local(&mut graph, f, LocalVariable::new("total", TypeRef::int()));
    let items = graph
        .add_node(
            Node::new(NodeKind::MakeList, f)
                .with_source(int(1))
                .with_source(int(2))
                .with_source(int(3)),
        )
        .unwrap();
    let each = graph
        .add_node(
            Node::new(NodeKind::ForEach { item: "x".into() }, f)
                .with_source(MemberReference::port(items, 0)),
        )
        .unwrap();
    let accumulate = set(
        &mut graph,
        f,
        MemberReference::local("total"),
        AssignOp::Add,
        MemberReference::local("x"),
    );
    let done = ret(&mut graph, f, MemberReference::local("total"));
    graph.connect(each, FlowSlot::Body, accumulate).unwrap();
    graph.connect(each, FlowSlot::Next, done).unwrap();
    graph.set_start(f, each).unwrap();

    let interp = engine(vec![graph]);
    let graph = interp.host().graph("Game.Math").unwrap();
    assert_eq!(interp.call(&graph, "Total", None, vec![]).unwrap(), Value::Int(6));
}

// ---------------------------------------------------------------------------
// Locals
// ---------------------------------------------------------------------------

#[test]
fn persistent_locals_survive_between_calls_per_instance() {
    let mut graph = Graph::new("Game", "Counter");
    for (name, persistent) in [("Bump", true), ("Fresh", false)] {
        let f = graph.add_function(name, vec![], TypeRef::int()).unwrap();
        let local = LocalVariable::new("count", TypeRef::int());
        add_local(&mut graph, f, if persistent { local.persistent() } else { local });
        let inc = set(&mut graph, f, MemberReference::local("count"), AssignOp::Add, int(1));
        let done = ret(&mut graph, f, MemberReference::local("count"));
        graph.chain(&[inc, done]).unwrap();
        graph.set_start(f, inc).unwrap();
    }
    let interp = engine(vec![graph]);
    let first = Value::Object(instance(&interp, "Game.Counter"));
    let second = Value::Object(instance(&interp, "Game.Counter"));

    assert_eq!(interp.invoke_member(&first, "Bump", vec![]).unwrap(), Value::Int(1));
    assert_eq!(interp.invoke_member(&first, "Bump", vec![]).unwrap(), Value::Int(2));
    assert_eq!(interp.invoke_member(&second, "Bump", vec![]).unwrap(), Value::Int(1));

    assert_eq!(interp.invoke_member(&first, "Fresh", vec![]).unwrap(), Value::Int(1));
    assert_eq!(interp.invoke_member(&first, "Fresh", vec![]).unwrap(), Value::Int(1));
}

// ---------------------------------------------------------------------------
// Faults
// ---------------------------------------------------------------------------

#[test]
fn nested_fault_reports_origins_outermost_first() {
    let mut graph = Graph::new("Game", "Enemy");
    let inner = graph.add_function("Inner", vec![], TypeRef::void()).unwrap();
    add_local(&mut graph, inner, LocalVariable::new("x", TypeRef::int()));
    let div = graph
        .add_node(
            Node::new(NodeKind::Binary { op: BinaryOp::Div }, inner)
                .with_source(int(1))
                .with_source(int(0)),
        )
        .unwrap();
    let failing = set(
        &mut graph,
        inner,
        MemberReference::local("x"),
        AssignOp::Assign,
        MemberReference::port(div, 0),
    );
    graph.set_start(inner, failing).unwrap();

    let outer = graph.add_function("Outer", vec![], TypeRef::void()).unwrap();
    let call = graph
        .add(
            outer,
            NodeKind::Invoke {
                target: MemberReference::function("Inner"),
            },
        )
        .unwrap();
    graph.set_start(outer, call).unwrap();

    let interp = engine(vec![graph]);
    let obj = Value::Object(instance(&interp, "Game.Enemy"));
    let err = interp.invoke_member(&obj, "Outer", vec![]).unwrap_err();

    assert!(matches!(err.root_cause(), RuntimeError::DivideByZero));
    assert_eq!(
        err.trace(),
        vec![
            &FaultOrigin::Node {
                graph: "Game.Enemy".into(),
                function: "Outer".into(),
                node: call,
            },
            &FaultOrigin::Node {
                graph: "Game.Enemy".into(),
                function: "Inner".into(),
                node: failing,
            },
        ]
    );
}

#[test]
fn unknown_member_is_unresolved() {
    let (graph, _) = build_constant_graph();
    let interp = engine(vec![graph]);
    let obj = Value::Object(instance(&interp, "Game.Enemy"));

    let err = interp.get_member(&obj, "X").unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::UnresolvedMember { ref owner, ref member } if owner == "Game.Enemy" && member == "X"
    ));
    assert!(interp.invoke_member(&obj, "Missing", vec![]).unwrap_err().is_unresolved_member());
}

#[test]
fn suspension_in_synchronous_body_is_a_fault() {
    let mut graph = Graph::new("Game", "Enemy");
    let f = graph.add_function("Tick", vec![], TypeRef::void()).unwrap();
    let wait = graph.add(f, NodeKind::Wait { ticks: 1 }).unwrap();
    graph.set_start(f, wait).unwrap();
    let interp = engine(vec![graph]);
    let obj = Value::Object(instance(&interp, "Game.Enemy"));

    let err = interp.invoke_member(&obj, "Tick", vec![]).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        RuntimeError::SuspendInSynchronousBody { .. }
    ));
}

// ---------------------------------------------------------------------------
// Cooperative execution
// ---------------------------------------------------------------------------

#[test]
fn cooperative_body_runs_across_ticks() {
    let interp = engine(vec![build_patrol_graph()]);
    let obj = instance(&interp, "Game.Patrol");
    let walk = interp
        .invoke_member(&Value::Object(Arc::clone(&obj)), "Walk", vec![])
        .unwrap();
    assert!(matches!(walk, Value::Coroutine(_)));
    // Creating the coroutine does not run it.
    assert_eq!(steps(&interp, &obj), Value::Int(0));

    let mut scheduler = Scheduler::new();
    let id = scheduler.start_value(walk).unwrap();

    scheduler.tick();
    assert_eq!(steps(&interp, &obj), Value::Int(1));
    scheduler.tick();
    assert_eq!(steps(&interp, &obj), Value::Int(1));
    scheduler.tick();
    assert_eq!(steps(&interp, &obj), Value::Int(2));
    assert_eq!(scheduler.tick(), vec![id]);
    assert_eq!(steps(&interp, &obj), Value::Int(3));
    assert!(scheduler.take_result(id).unwrap().is_ok());
}

#[test]
fn stopped_coroutine_never_resumes() {
    let interp = engine(vec![build_patrol_graph()]);
    let obj = instance(&interp, "Game.Patrol");
    let walk = interp
        .invoke_member(&Value::Object(Arc::clone(&obj)), "Walk", vec![])
        .unwrap();

    let mut scheduler = Scheduler::new();
    let id = scheduler.start_value(walk).unwrap();
    scheduler.tick();
    assert!(scheduler.stop(id));
    assert!(!scheduler.stop(id));
    scheduler.run_until_idle(10);

    assert_eq!(steps(&interp, &obj), Value::Int(1));
    assert!(matches!(scheduler.take_result(id), Some(Err(RuntimeError::Stopped))));
}

// ---------------------------------------------------------------------------
// Block lists
// ---------------------------------------------------------------------------

fn fixed(value: bool) -> impl Condition<()> {
    FnCondition::new(if value { "T" } else { "F" }, move |_: &mut ()| -> Result<bool, RuntimeError> {
        Ok(value)
    })
}

#[test]
fn or_marker_splits_conjunctions() {
    let list = BlockList::default()
        .condition(fixed(true))
        .or()
        .condition(fixed(false))
        .condition(fixed(true));
    assert!(list.validate(&mut ()).unwrap());
}

#[test]
fn levels_group_conditions() {
    let list = BlockList::default()
        .condition_at(fixed(true), 0)
        .condition_at(fixed(false), 1)
        .condition_at(fixed(true), 1)
        .condition_at(fixed(true), 0);
    assert!(!list.validate(&mut ()).unwrap());
}

#[test]
fn graph_actions_run_in_parallel() {
    let interp = engine(vec![build_patrol_graph()]);
    let obj = instance(&interp, "Game.Patrol");
    let list = BlockList::new(ExecutionMode::Parallel)
        .action(GraphAction::new(Arc::clone(&obj), "Short", vec![]))
        .action(GraphAction::new(Arc::clone(&obj), "Short", vec![]));

    let run = list.start(interp.clone()).unwrap();
    let mut scheduler = Scheduler::new();
    let id = scheduler.start_unit(run);

    scheduler.tick();
    assert_eq!(steps(&interp, &obj), Value::Int(2));
    assert_eq!(scheduler.run_until_idle(10), 1);
    assert_eq!(steps(&interp, &obj), Value::Int(4));
    assert!(scheduler.take_result(id).unwrap().is_ok());

    let tired = BlockList::default().condition(GraphCondition::new(Arc::clone(&obj), "IsTired", vec![]));
    assert!(tired.validate(&mut interp.clone()).unwrap());
}

#[test]
fn stopping_graph_action_list_stops_its_coroutines() {
    let interp = engine(vec![build_patrol_graph()]);
    let obj = instance(&interp, "Game.Patrol");
    let list = BlockList::new(ExecutionMode::Sequential)
        .action(GraphAction::new(Arc::clone(&obj), "Short", vec![]))
        .action(GraphAction::new(Arc::clone(&obj), "Short", vec![]));

    let mut scheduler = Scheduler::new();
    let id = scheduler.start_unit(list.start(interp.clone()).unwrap());
    scheduler.tick();
    assert_eq!(steps(&interp, &obj), Value::Int(1));

    assert!(scheduler.stop(id));
    scheduler.run_until_idle(10);
    assert_eq!(steps(&interp, &obj), Value::Int(1));
    assert!(matches!(scheduler.take_result(id), Some(Err(RuntimeError::Stopped))));
}

#[test]
fn sequential_list_runs_synchronous_action_after_cooperative_one() {
    let interp = engine(vec![build_patrol_graph()]);
    let obj = instance(&interp, "Game.Patrol");
    let list = BlockList::new(ExecutionMode::Sequential)
        .action(GraphAction::new(Arc::clone(&obj), "Short", vec![]))
        .action(GraphAction::new(Arc::clone(&obj), "Bump", vec![]));

    let run = list.start(interp.clone()).unwrap();
    assert_eq!(steps(&interp, &obj), Value::Int(0));

    let mut scheduler = Scheduler::new();
    let id = scheduler.start_unit(run);
    scheduler.tick();
    assert_eq!(steps(&interp, &obj), Value::Int(1));
    assert_eq!(scheduler.tick(), vec![id]);
    assert_eq!(steps(&interp, &obj), Value::Int(102));
    assert!(scheduler.take_result(id).unwrap().is_ok());
}

#[test]
fn execute_runs_cooperative_action_that_never_suspends() {
    let interp = engine(vec![build_patrol_graph()]);
    let obj = instance(&interp, "Game.Patrol");
    let list = BlockList::default()
        .action(GraphAction::new(Arc::clone(&obj), "Mark", vec![]))
        .action(GraphAction::new(Arc::clone(&obj), "Bump", vec![]));

    list.execute(&mut interp.clone()).unwrap();
    assert_eq!(steps(&interp, &obj), Value::Int(110));
}

#[test]
fn execute_rejects_cooperative_action_that_suspends() {
    let interp = engine(vec![build_patrol_graph()]);
    let obj = instance(&interp, "Game.Patrol");
    let list = BlockList::default()
        .action(GraphAction::new(Arc::clone(&obj), "Walk", vec![]))
        .action(GraphAction::new(Arc::clone(&obj), "Bump", vec![]));

    let err = list.execute(&mut interp.clone()).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        RuntimeError::SuspendInSynchronousBody { function } if function == "Walk"
    ));
    assert_eq!(
        err.trace(),
        vec![&FaultOrigin::Block {
            index: 0,
            name: "Walk".into()
        }]
    );
    // The first step ran before the body suspended; Bump never ran.
    assert_eq!(steps(&interp, &obj), Value::Int(1));
}
