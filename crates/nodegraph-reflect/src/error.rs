use serde::{Deserialize, Serialize};

/// Errors from type construction queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ReflectError {
    #[error("type {name} is not a generic definition")]
    NotGeneric { name: String },

    #[error("{definition} takes {expected} type argument(s), got {got}")]
    GenericArity {
        definition: String,
        expected: usize,
        got: usize,
    },

    /// An argument does not satisfy a constraint of its parameter.
    #[error("{argument} does not satisfy constraint {constraint} of {definition}.{parameter}")]
    ConstraintViolation {
        definition: String,
        parameter: String,
        argument: String,
        constraint: String,
    },

    #[error("unknown type handle {handle}")]
    UnknownHandle { handle: u32 },

    #[error("type {name} cannot be resolved")]
    Unresolved { name: String },
}
