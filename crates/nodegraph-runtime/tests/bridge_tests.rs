//! Integration tests for the runtime bridge.
//!
//! Covers by-name access on interpreted and compiled instances, the
//! missing-member versus fault distinction, compound assignment, artifact
//! selection and staleness, cooperative functions and source generation.

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use nodegraph_core::graph::Graph;
use nodegraph_core::member::MemberReference;
use nodegraph_core::node::Node;
use nodegraph_core::ops::{AssignOp, BinaryOp, NodeKind};
use nodegraph_core::root::Variable;
use nodegraph_core::types::{natives, ConstValue, TypeRef};

use nodegraph_exec::{MemberAccessError, RuntimeAccessible, RuntimeError, Scheduler, Value};
use nodegraph_reflect::{ReflectError, TypeContext};
use nodegraph_runtime::{
    graph_hash, BridgeError, CompiledArtifact, Runtime, RuntimeOptions, SourceGenerator,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn int(value: i64) -> MemberReference {
    MemberReference::literal(ConstValue::Int(value))
}

/// `Game.Enemy { Health: int = 10; Score() -> int { return 42 }; Broken() -> int { return 1 / 0 } }`
fn enemy_graph() -> Graph {
    let mut graph = Graph::new("Game", "Enemy");
    graph
        .add_variable(Variable::new("Health", TypeRef::int()).with_default(ConstValue::Int(10)))
        .unwrap();

    let score = graph.add_function("Score", vec![], TypeRef::int()).unwrap();
    let ret = graph
        .add_node(Node::new(NodeKind::Return, score).with_source(int(42)))
        .unwrap();
    graph.set_start(score, ret).unwrap();

    let broken = graph.add_function("Broken", vec![], TypeRef::int()).unwrap();
    let div = graph
        .add_node(
            Node::new(NodeKind::Binary { op: BinaryOp::Div }, broken)
                .with_source(int(1))
                .with_source(int(0)),
        )
        .unwrap();
    let ret = graph
        .add_node(Node::new(NodeKind::Return, broken).with_source(MemberReference::port(div, 0)))
        .unwrap();
    graph.set_start(broken, ret).unwrap();
    graph
}

/// `Game.Patrol { Steps: int; Walk() { Steps += 1; wait 1; Steps += 1 } }`
fn patrol_graph() -> Graph {
    let mut graph = Graph::new("Game", "Patrol");
    graph.add_variable(Variable::new("Steps", TypeRef::int())).unwrap();
    let walk = graph
        .add_function("Walk", vec![], TypeRef::native(natives::ENUMERATOR))
        .unwrap();
    let step = |graph: &mut Graph| {
        graph
            .add_node(
                Node::new(
                    NodeKind::SetValue {
                        target: MemberReference::variable("Steps"),
                        op: AssignOp::Add,
                    },
                    walk,
                )
                .with_source(int(1)),
            )
            .unwrap()
    };
    let first = step(&mut graph);
    let wait = graph.add(walk, NodeKind::Wait { ticks: 1 }).unwrap();
    let second = step(&mut graph);
    graph.chain(&[first, wait, second]).unwrap();
    graph.set_start(walk, first).unwrap();
    graph
}

fn runtime_with(options: RuntimeOptions) -> Runtime {
    let ctx = Arc::new(TypeContext::new());
    ctx.register_graph(enemy_graph());
    ctx.register_graph(patrol_graph());
    ctx.register_graph(Graph::interface("Game", "IDamageable"));
    Runtime::new(ctx, options)
}

fn runtime() -> Runtime {
    runtime_with(RuntimeOptions::default())
}

/// Hand-written stand-in for a compiled `Game.Enemy`.
struct CompiledEnemy {
    health: i64,
}

impl RuntimeAccessible for CompiledEnemy {
    fn type_name(&self) -> &str {
        "Game.Enemy"
    }

    fn get_member(&self, name: &str) -> Result<Value, MemberAccessError> {
        match name {
            "Health" => Ok(Value::Int(self.health)),
            _ => Err(MemberAccessError::NotFound {
                owner: "Game.Enemy".into(),
                member: name.into(),
            }),
        }
    }

    fn set_member(&mut self, name: &str, value: Value) -> Result<(), MemberAccessError> {
        match (name, value) {
            ("Health", Value::Int(v)) => {
                self.health = v;
                Ok(())
            }
            ("Health", other) => Err(MemberAccessError::Fault(format!(
                "Health expects int, got {}",
                other.type_name()
            ))),
            _ => Err(MemberAccessError::NotFound {
                owner: "Game.Enemy".into(),
                member: name.into(),
            }),
        }
    }

    fn invoke_member(&mut self, name: &str, _args: Vec<Value>) -> Result<Value, MemberAccessError> {
        match name {
            "Score" => Ok(Value::Int(42)),
            "Broken" => Err(MemberAccessError::Fault("divide by zero".into())),
            _ => Err(MemberAccessError::NotFound {
                owner: "Game.Enemy".into(),
                member: name.into(),
            }),
        }
    }
}

fn compiled_enemy(graph: &Graph) -> CompiledArtifact {
    CompiledArtifact::for_graph(graph, |_| Ok(Box::new(CompiledEnemy { health: 100 }))).unwrap()
}

// ---------------------------------------------------------------------------
// Interpreted instances
// ---------------------------------------------------------------------------

#[test]
fn interpreted_get_set_invoke() {
    let rt = runtime();
    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();
    assert!(!enemy.is_compiled());
    assert_eq!(enemy.type_name(), "Game.Enemy");

    assert_eq!(enemy.get("Health").unwrap(), Value::Int(10));
    enemy.set("Health", Value::Int(3)).unwrap();
    assert_eq!(enemy.get("Health").unwrap(), Value::Int(3));
    assert_eq!(enemy.invoke("Score", vec![]).unwrap(), Value::Int(42));
}

#[test]
fn missing_member_is_unresolved() {
    let rt = runtime();
    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();

    let err = enemy.get("X").unwrap_err();
    assert!(matches!(
        &err,
        BridgeError::UnresolvedMember { type_name, member }
            if type_name == "Game.Enemy" && member == "X"
    ));
    assert!(enemy.set("X", Value::Int(1)).unwrap_err().is_unresolved_member());
    assert!(enemy.invoke("X", vec![]).unwrap_err().is_unresolved_member());
    assert!(enemy
        .compound_assign("X", AssignOp::Add, Value::Int(1))
        .unwrap_err()
        .is_unresolved_member());
}

#[test]
fn member_names_are_case_sensitive() {
    let rt = runtime();
    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();
    assert!(enemy.get("health").unwrap_err().is_unresolved_member());
}

#[test]
fn throwing_member_is_a_fault() {
    let rt = runtime();
    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();
    match enemy.invoke("Broken", vec![]).unwrap_err() {
        BridgeError::Fault(err) => {
            assert!(matches!(err.root_cause(), RuntimeError::DivideByZero))
        }
        other => panic!("expected fault, got {other:?}"),
    }
}

#[test]
fn compound_assign_returns_stored_value() {
    let rt = runtime();
    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();
    assert_eq!(
        enemy.compound_assign("Health", AssignOp::Add, Value::Int(5)).unwrap(),
        Value::Int(15)
    );
    assert_eq!(
        enemy.compound_assign("Health", AssignOp::Mul, Value::Int(2)).unwrap(),
        Value::Int(30)
    );
    assert_eq!(
        enemy.compound_assign("Health", AssignOp::Assign, Value::Int(1)).unwrap(),
        Value::Int(1)
    );
    assert_eq!(enemy.get("Health").unwrap(), Value::Int(1));
}

#[test]
fn concurrent_compound_assign_loses_no_updates() {
    let rt = runtime();
    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let bridge = enemy.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    bridge.compound_assign("Health", AssignOp::Add, Value::Int(1)).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(enemy.get("Health").unwrap(), Value::Int(210));
}

#[test]
fn compound_assign_on_self_reference_fails_without_deadlock() {
    let ctx = Arc::new(TypeContext::new());
    let mut graph = Graph::new("Game", "Mirror");
    graph.add_variable(Variable::new("Me", TypeRef::object())).unwrap();
    ctx.register_graph(graph);
    let rt = Runtime::new(ctx, RuntimeOptions::default());
    let mirror = rt.instantiate_named("Game.Mirror", vec![]).unwrap();
    mirror.set("Me", mirror.value()).unwrap();

    let (tx, rx) = mpsc::channel();
    let bridge = mirror.clone();
    thread::spawn(move || {
        let _ = tx.send(bridge.compound_assign("Me", AssignOp::Add, Value::Int(1)));
    });
    let result = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("compound assignment did not return");
    match result.unwrap_err() {
        BridgeError::Fault(err) => {
            assert!(matches!(err.root_cause(), RuntimeError::TypeMismatch { .. }))
        }
        other => panic!("expected fault, got {other:?}"),
    }
    assert_eq!(mirror.get("Me").unwrap(), mirror.value());
}

#[test]
fn compound_assign_through_wrapped_bridges_loses_no_updates() {
    let rt = runtime();
    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let bridge = rt.wrap(&enemy.value()).unwrap();
            thread::spawn(move || {
                for _ in 0..50 {
                    bridge.compound_assign("Health", AssignOp::Add, Value::Int(1)).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(enemy.get("Health").unwrap(), Value::Int(210));
}

#[test]
fn interfaces_cannot_be_instantiated() {
    let rt = runtime();
    let err = rt.instantiate_named("Game.IDamageable", vec![]).unwrap_err();
    assert!(matches!(err, BridgeError::NotInstantiable { .. }));

    let err = rt.instantiate_named("Game.Ghost", vec![]).unwrap_err();
    assert!(matches!(err, BridgeError::Type(ReflectError::Unresolved { .. })));
}

#[test]
fn wrap_shares_the_instance() {
    let rt = runtime();
    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();
    let again = rt.wrap(&enemy.value()).unwrap();
    again.set("Health", Value::Int(7)).unwrap();
    assert_eq!(enemy.get("Health").unwrap(), Value::Int(7));
    assert!(rt.wrap(&Value::Int(1)).is_err());
}

// ---------------------------------------------------------------------------
// Compiled instances
// ---------------------------------------------------------------------------

#[test]
fn registered_artifact_is_preferred() {
    let rt = runtime();
    rt.register_compiled(compiled_enemy(&enemy_graph()));

    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();
    assert!(enemy.is_compiled());
    assert_eq!(enemy.get("Health").unwrap(), Value::Int(100));
    assert_eq!(
        enemy.compound_assign("Health", AssignOp::Sub, Value::Int(25)).unwrap(),
        Value::Int(75)
    );
    assert_eq!(enemy.invoke("Score", vec![]).unwrap(), Value::Int(42));
}

#[test]
fn compiled_errors_keep_their_kind() {
    let rt = runtime();
    rt.register_compiled(compiled_enemy(&enemy_graph()));
    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();

    assert!(enemy.get("Armor").unwrap_err().is_unresolved_member());
    assert!(matches!(
        enemy.invoke("Broken", vec![]).unwrap_err(),
        BridgeError::Fault(RuntimeError::NativeFault { .. })
    ));
    assert!(matches!(
        enemy.set("Health", Value::Str("full".into())).unwrap_err(),
        BridgeError::Fault(_)
    ));
}

#[test]
fn stale_artifact_falls_back_to_interpreter() {
    let rt = runtime();
    rt.register_compiled(compiled_enemy(&enemy_graph()));

    let mut edited = enemy_graph();
    edited
        .add_variable(Variable::new("Armor", TypeRef::int()).with_default(ConstValue::Int(5)))
        .unwrap();
    rt.update_graph(edited);

    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();
    assert!(!enemy.is_compiled());
    assert_eq!(enemy.get("Armor").unwrap(), Value::Int(5));
}

#[test]
fn prefer_compiled_off_interprets() {
    let rt = runtime_with(RuntimeOptions {
        prefer_compiled: false,
        ..RuntimeOptions::default()
    });
    rt.register_compiled(compiled_enemy(&enemy_graph()));
    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();
    assert!(!enemy.is_compiled());
    assert_eq!(enemy.get("Health").unwrap(), Value::Int(10));
}

// ---------------------------------------------------------------------------
// Cooperative functions
// ---------------------------------------------------------------------------

#[test]
fn start_schedules_cooperative_function() {
    let rt = runtime();
    let patrol = rt.instantiate_named("Game.Patrol", vec![]).unwrap();
    let mut scheduler = Scheduler::new();

    let id = patrol.start("Walk", vec![], &mut scheduler).unwrap();
    assert_eq!(patrol.get("Steps").unwrap(), Value::Int(0));
    scheduler.tick();
    assert_eq!(patrol.get("Steps").unwrap(), Value::Int(1));
    scheduler.run_until_idle(10);
    assert_eq!(patrol.get("Steps").unwrap(), Value::Int(2));
    assert!(scheduler.take_result(id).unwrap().is_ok());
}

#[test]
fn start_rejects_synchronous_function() {
    let rt = runtime();
    let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();
    let mut scheduler = Scheduler::new();
    assert!(matches!(
        enemy.start("Score", vec![], &mut scheduler).unwrap_err(),
        BridgeError::Fault(_)
    ));
}

// ---------------------------------------------------------------------------
// Source generation
// ---------------------------------------------------------------------------

struct Stub;

impl SourceGenerator for Stub {
    fn generate(&self, graph: &Graph) -> Result<String, String> {
        if graph.is_interface() {
            return Err("interfaces are not generated".into());
        }
        Ok(format!("class {} {{}}", graph.name))
    }
}

#[test]
fn generation_records_type_and_hash() {
    let rt = runtime().with_generator(Arc::new(Stub));
    let generated = rt.generate("Game.Enemy").unwrap();
    assert_eq!(generated.type_name, "Game.Enemy");
    assert_eq!(generated.source, "class Enemy {}");
    assert_eq!(generated.graph_hash, graph_hash(&enemy_graph()).unwrap());

    assert!(matches!(
        rt.generate("Game.IDamageable").unwrap_err(),
        BridgeError::Generation { .. }
    ));
}

#[test]
fn generation_without_generator_fails() {
    let rt = runtime();
    assert!(matches!(
        rt.generate("Game.Enemy").unwrap_err(),
        BridgeError::Generation { .. }
    ));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn op_strategy() -> impl Strategy<Value = (AssignOp, i64)> {
        prop_oneof![
            (-100i64..100).prop_map(|v| (AssignOp::Add, v)),
            (-100i64..100).prop_map(|v| (AssignOp::Sub, v)),
            (-3i64..4).prop_map(|v| (AssignOp::Mul, v)),
            (-100i64..100).prop_map(|v| (AssignOp::Assign, v)),
        ]
    }

    fn expected(start: i64, ops: &[(AssignOp, i64)]) -> i64 {
        ops.iter().fold(start, |acc, &(op, v)| match op {
            AssignOp::Add => acc + v,
            AssignOp::Sub => acc - v,
            AssignOp::Mul => acc * v,
            _ => v,
        })
    }

    proptest! {
        #[test]
        fn compound_assign_matches_sequential_arithmetic(
            ops in prop::collection::vec(op_strategy(), 0..6),
            compiled in any::<bool>(),
        ) {
            let rt = runtime();
            if compiled {
                rt.register_compiled(compiled_enemy(&enemy_graph()));
            }
            let enemy = rt.instantiate_named("Game.Enemy", vec![]).unwrap();
            let start = if compiled { 100 } else { 10 };

            let mut last = Value::Int(start);
            for &(op, v) in &ops {
                last = enemy.compound_assign("Health", op, Value::Int(v)).unwrap();
            }
            let want = Value::Int(expected(start, &ops));
            prop_assert_eq!(&last, &want);
            prop_assert_eq!(enemy.get("Health").unwrap(), want);
        }
    }
}
