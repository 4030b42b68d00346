//! Engine configuration.
//!
//! [`EngineConfig`] is plain data: build it with `Default`, deserialize it
//! from JSON, or read overrides from the environment with
//! [`EngineConfig::from_env`].

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_TRACE: &str = "NODEGRAPH_TRACE";
pub const ENV_MAX_CALL_DEPTH: &str = "NODEGRAPH_MAX_CALL_DEPTH";
pub const ENV_MAX_STEPS: &str = "NODEGRAPH_MAX_STEPS";

/// Configuration for the flow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether activations record a [`TraceEntry`](crate::trace::TraceEntry)
    /// per executed node.
    pub trace_enabled: bool,
    /// Maximum nesting of graph calls. Default: 256.
    pub max_call_depth: usize,
    /// Maximum nodes executed by one activation; `None` is unlimited.
    pub max_steps: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            trace_enabled: false,
            max_call_depth: 256,
            max_steps: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `NODEGRAPH_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = EngineConfig::default();

        if let Some(raw) = lookup(ENV_TRACE) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.trace_enabled = true,
                "0" | "false" | "no" | "off" | "" => config.trace_enabled = false,
                other => warn!(var = ENV_TRACE, value = other, "ignoring invalid boolean"),
            }
        }
        if let Some(raw) = lookup(ENV_MAX_CALL_DEPTH) {
            match raw.trim().parse::<usize>() {
                Ok(depth) => config.max_call_depth = depth,
                Err(_) => warn!(var = ENV_MAX_CALL_DEPTH, value = %raw, "ignoring invalid depth"),
            }
        }
        if let Some(raw) = lookup(ENV_MAX_STEPS) {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.max_steps = None,
                Ok(steps) => config.max_steps = Some(steps),
                Err(_) => warn!(var = ENV_MAX_STEPS, value = %raw, "ignoring invalid step limit"),
            }
        }
        config
    }
}
