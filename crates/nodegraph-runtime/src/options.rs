//! Runtime configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

use nodegraph_exec::EngineConfig;

pub const ENV_PREFER_COMPILED: &str = "NODEGRAPH_PREFER_COMPILED";

/// Options for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Use a registered, up-to-date compiled artifact instead of
    /// interpreting. Default: `true`.
    pub prefer_compiled: bool,
    pub engine: EngineConfig,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            prefer_compiled: true,
            engine: EngineConfig::default(),
        }
    }
}

impl RuntimeOptions {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup, including
    /// the engine's own variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = RuntimeOptions {
            engine: EngineConfig::from_lookup(&lookup),
            ..RuntimeOptions::default()
        };
        if let Some(raw) = lookup(ENV_PREFER_COMPILED) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => options.prefer_compiled = true,
                "0" | "false" | "no" | "off" => options.prefer_compiled = false,
                other => warn!(var = ENV_PREFER_COMPILED, value = other, "ignoring invalid boolean"),
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nodegraph_exec::config::ENV_MAX_CALL_DEPTH;

    #[test]
    fn lookup_covers_engine_variables() {
        let options = RuntimeOptions::from_lookup(|key| match key {
            ENV_PREFER_COMPILED => Some("off".into()),
            ENV_MAX_CALL_DEPTH => Some("8".into()),
            _ => None,
        });
        assert!(!options.prefer_compiled);
        assert_eq!(options.engine.max_call_depth, 8);
    }

    #[test]
    fn invalid_flag_keeps_default() {
        let options = RuntimeOptions::from_lookup(|key| {
            (key == ENV_PREFER_COMPILED).then(|| "sometimes".to_string())
        });
        assert_eq!(options, RuntimeOptions::default());
    }
}
