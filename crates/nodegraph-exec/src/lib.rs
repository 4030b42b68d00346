//! Execution engine for node graphs.
//!
//! Runs graph bodies directly by walking their flow connections, without
//! generating code first.
//!
//! # Architecture
//!
//! - [`Interpreter`] is the entry point: it resolves members by name along a
//!   graph's base chain and creates one [`Activation`] per call.
//! - [`Activation`] is the per-call state machine:
//!   `Ready -> Running -> (Suspended | Completed | Error)`.
//! - Bodies returning an iterator contract run cooperatively under the
//!   [`Scheduler`], which resumes each [`Cooperative`] unit at most once per
//!   tick.
//! - [`BlockList`] holds reusable condition and action units.
//! - [`validate_graph`] reports edit-time problems as [`Diagnostic`]s.
//! - [`ExecutionHost`] is the seam the reflection layer plugs into;
//!   [`GraphSet`] is a standalone host for tests and tools.
//!
//! # Usage
//!
//! ```ignore
//! let host = Arc::new(GraphSet::new());
//! host.insert(graph);
//! let interp = Interpreter::new(host, EngineConfig::from_env());
//! let enemy = interp.instantiate(&TypeRef::graph("Game.Enemy"), vec![])?;
//! let score = interp.invoke_member(&Value::Object(enemy), "Score", vec![])?;
//! ```

pub mod blocks;
pub mod config;
pub mod error;
pub mod eval;
pub mod flow;
pub mod host;
pub mod instance;
pub mod interpreter;
pub mod intrinsics;
pub mod scheduler;
pub mod trace;
pub mod validate;
pub mod value;

pub use blocks::{
    Action, ActionRun, Block, BlockList, Condition, ExecutionMode, FnAction, FnCondition,
    GraphAction, GraphCondition,
};
pub use config::EngineConfig;
pub use error::{FaultOrigin, RuntimeError};
pub use flow::{Activation, ActivationState, Outcome, Suspension};
pub use host::{ExecutionHost, GraphSet, MemberAccessError, RuntimeAccessible};
pub use interpreter::{graph_name_of, Interpreter};
pub use scheduler::{
    coroutine, Cooperative, CoroutineRef, GraphCoroutine, Scheduler, SharedCoroutine, TaskId,
    TaskStatus,
};
pub use trace::TraceEntry;
pub use validate::{validate_graph, Diagnostic, DiagnosticKind, Location};
pub use value::{GraphObject, ListRef, Object, ObjectRef, Value};
