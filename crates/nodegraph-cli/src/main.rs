//! Command-line front end for graph programs.
//!
//! Provides the `nodegraph` binary. Graphs are read from a JSON dump: either a
//! single serialized graph or an array of them.
//!
//! - `check` validates every graph and prints the diagnostics.
//! - `run` instantiates a type and calls one of its functions, driving
//!   cooperative functions with the scheduler until they finish.
//! - `describe` prints the reflected shape of a type.
//!
//! Log output goes to stderr, filtered by `NODEGRAPH_LOG` (default `warn`).

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nodegraph_core::graph::Graph;
use nodegraph_core::types::TypeRef;
use nodegraph_exec::{validate_graph, Object, Scheduler, Value};
use nodegraph_reflect::{MemberInfo, SyntheticType, TypeContext, TypeHandle};
use nodegraph_runtime::{Runtime, RuntimeOptions};

const ENV_LOG: &str = "NODEGRAPH_LOG";

/// Graph program tools.
#[derive(Parser)]
#[command(name = "nodegraph", about = "Validate, run and inspect graph programs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate graphs and print diagnostics.
    Check {
        /// Path to the graph dump.
        file: PathBuf,
    },
    /// Instantiate a type and call a function on it.
    Run {
        file: PathBuf,

        /// Full name of the type to instantiate, e.g. `Game.Enemy`.
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// Function to call.
        #[arg(short, long)]
        call: String,

        /// Positional argument as JSON; repeat for more.
        #[arg(short, long = "arg")]
        args: Vec<String>,

        /// Tick limit for cooperative functions.
        #[arg(long, default_value_t = 1000)]
        max_ticks: u64,

        /// Record a trace of executed nodes.
        #[arg(long)]
        trace: bool,

        /// Node limit per activation; 0 is unlimited.
        #[arg(long)]
        max_steps: Option<u64>,
    },
    /// Print members, base type and interfaces of a type.
    Describe {
        file: PathBuf,

        #[arg(short = 't', long = "type")]
        type_name: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GraphDump {
    Many(Vec<Graph>),
    One(Box<Graph>),
}

fn main() {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Check { file } => run_check(&file),
        Commands::Run {
            file,
            type_name,
            call,
            args,
            max_ticks,
            trace,
            max_steps,
        } => {
            let mut options = RuntimeOptions::from_env();
            options.engine.trace_enabled |= trace;
            if let Some(steps) = max_steps {
                options.engine.max_steps = (steps > 0).then_some(steps);
            }
            run_call(&file, &type_name, &call, &args, max_ticks, options)
        }
        Commands::Describe { file, type_name } => run_describe(&file, &type_name),
    };
    process::exit(exit_code);
}

/// Reads a graph dump. Exit code 3 on failure.
fn load_graphs(path: &Path) -> Result<Vec<Graph>, i32> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {}", path.display(), e);
        3
    })?;
    match serde_json::from_str::<GraphDump>(&text) {
        Ok(GraphDump::Many(graphs)) => Ok(graphs),
        Ok(GraphDump::One(graph)) => Ok(vec![*graph]),
        Err(e) => {
            eprintln!("Error: '{}' is not a graph dump: {}", path.display(), e);
            Err(3)
        }
    }
}

fn load_context(path: &Path) -> Result<Arc<TypeContext>, i32> {
    let graphs = load_graphs(path)?;
    let context = Arc::new(TypeContext::new());
    for graph in graphs {
        context.register_graph(graph);
    }
    info!(graphs = context.graphs().len(), "loaded graph dump");
    Ok(context)
}

/// Execute the check subcommand.
///
/// Returns exit code: 0 = no diagnostics, 2 = diagnostics, 3 = I/O error.
fn run_check(path: &Path) -> i32 {
    let graphs = match load_graphs(path) {
        Ok(graphs) => graphs,
        Err(code) => return code,
    };
    let diagnostics: Vec<_> = graphs.iter().flat_map(validate_graph).collect();
    for diagnostic in &diagnostics {
        eprintln!("  - {}", diagnostic);
    }
    let report = json!({
        "graphs": graphs.len(),
        "diagnostics": diagnostics,
    });
    println!("{}", pretty(&report));
    if diagnostics.is_empty() {
        0
    } else {
        2
    }
}

/// Execute the run subcommand.
///
/// Returns exit code: 0 = success, 1 = runtime error, 3 = I/O or argument error.
fn run_call(
    path: &Path,
    type_name: &str,
    function: &str,
    raw_args: &[String],
    max_ticks: u64,
    options: RuntimeOptions,
) -> i32 {
    let context = match load_context(path) {
        Ok(context) => context,
        Err(code) => return code,
    };
    let mut args = Vec::with_capacity(raw_args.len());
    for raw in raw_args {
        match serde_json::from_str(raw).map_err(|e| e.to_string()).and_then(|json| from_json(&json)) {
            Ok(value) => args.push(value),
            Err(e) => {
                eprintln!("Error: invalid argument '{}': {}", raw, e);
                return 3;
            }
        }
    }

    let runtime = Runtime::new(context, options);
    let instance = match runtime.instantiate_named(type_name, vec![]) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("Error: cannot instantiate {}: {}", type_name, e);
            return 1;
        }
    };
    let result = match instance.invoke(function, args) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}.{} failed: {}", type_name, function, e);
            return 1;
        }
    };

    let (result, ticks) = match result {
        Value::Coroutine(_) => {
            let mut scheduler = Scheduler::new();
            let id = match scheduler.start_value(result) {
                Ok(id) => id,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return 1;
                }
            };
            let ticks = scheduler.run_until_idle(max_ticks);
            match scheduler.take_result(id) {
                Some(Ok(value)) => (value, ticks),
                Some(Err(e)) => {
                    eprintln!("Error: {}.{} failed: {}", type_name, function, e);
                    return 1;
                }
                None => {
                    eprintln!(
                        "Error: {}.{} still running after {} tick(s)",
                        type_name, function, max_ticks
                    );
                    return 1;
                }
            }
        }
        other => (other, 0),
    };

    let report = json!({
        "type": instance.type_name(),
        "function": function,
        "compiled": instance.is_compiled(),
        "result": to_json(&result),
        "ticks": ticks,
        "instance": to_json(&instance.value()),
    });
    println!("{}", pretty(&report));
    0
}

/// Execute the describe subcommand.
fn run_describe(path: &Path, type_name: &str) -> i32 {
    let context = match load_context(path) {
        Ok(context) => context,
        Err(code) => return code,
    };
    let ty = resolve_named(&context, type_name);
    if ty.is_missing() {
        eprintln!("Error: unknown type {}", type_name);
        return 1;
    }
    println!("{}", pretty(&describe(&ty)));
    0
}

/// Interned names first, then graphs, then host types.
fn resolve_named(context: &Arc<TypeContext>, name: &str) -> SyntheticType {
    if let Some(handle) = context.lookup(name) {
        if let Ok(ty) = context.synthetic(handle) {
            return ty;
        }
    }
    let reference = if context.graph(name).is_some() {
        TypeRef::graph(name)
    } else {
        TypeRef::native(name)
    };
    context.synthetic_for(&reference)
}

fn describe(ty: &SyntheticType) -> serde_json::Value {
    let context = ty.context();
    let name_of = |handle: TypeHandle| {
        context
            .full_name(handle)
            .unwrap_or_else(|_| "<unknown>".to_string())
    };
    let member = |m: &MemberInfo| {
        json!({
            "name": m.name,
            "kind": m.kind,
            "type": name_of(m.ty),
            "params": m.params.iter().map(|p| name_of(*p)).collect::<Vec<_>>(),
            "declared_by": name_of(m.declaring_type),
            "static": m.is_static,
            "substitution": m.substitution,
        })
    };
    json!({
        "type": ty.full_name(),
        "kind": ty.kind(),
        "base": ty.base_type().map(|b| b.full_name().to_string()),
        "interfaces": ty.interfaces().iter().map(|i| i.full_name().to_string()).collect::<Vec<_>>(),
        "fields": ty.fields().iter().map(member).collect::<Vec<_>>(),
        "properties": ty.properties().iter().map(member).collect::<Vec<_>>(),
        "methods": ty.methods().iter().map(member).collect::<Vec<_>>(),
        "constructors": ty.constructors().iter().map(member).collect::<Vec<_>>(),
    })
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e))
}

/// Converts a JSON argument into a runtime value. Objects are rejected.
fn from_json(json: &serde_json::Value) -> Result<Value, String> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().ok_or("number out of range")?),
        },
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => {
            Value::list(items.iter().map(from_json).collect::<Result<_, _>>()?)
        }
        serde_json::Value::Object(_) => return Err("objects cannot be passed as arguments".into()),
    })
}

/// Converts a runtime value for display. Interpreted instances show their
/// fields.
fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::Str(s) => json!(s),
        Value::List(items) => items.lock().iter().map(to_json).collect(),
        Value::Object(object) => match &*object.lock() {
            Object::Graph(state) => {
                let mut map = serde_json::Map::new();
                map.insert("$type".into(), json!(state.ty.to_string()));
                for (name, field) in &state.fields {
                    map.insert(name.clone(), to_json(field));
                }
                serde_json::Value::Object(map)
            }
            Object::Native(native) => json!({ "$type": native.type_name() }),
        },
        Value::Type(ty) => json!(ty.to_string()),
        Value::Coroutine(_) => json!("<coroutine>"),
    }
}
