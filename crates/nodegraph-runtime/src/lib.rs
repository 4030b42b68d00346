//! Live instances of graph types.
//!
//! [`Runtime`] instantiates a type either from a registered compiled
//! artifact or by interpreting its graph, and hands back a [`Bridge`] with
//! the same by-name `get`/`set`/`invoke` surface in both cases. Member names
//! are case-sensitive and argument lists are positional [`Value`]s.
//!
//! [`Value`]: nodegraph_exec::Value

pub mod bridge;
pub mod compiled;
pub mod error;
pub mod options;
pub mod runtime;
pub mod source;

pub use bridge::Bridge;
pub use compiled::{graph_hash, CompiledArtifact, CompiledRegistry, InstanceFactory};
pub use error::BridgeError;
pub use options::RuntimeOptions;
pub use runtime::Runtime;
pub use source::{GeneratedSource, SourceGenerator};
