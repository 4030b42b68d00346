use nodegraph_exec::{MemberAccessError, RuntimeError};
use nodegraph_reflect::ReflectError;

/// Errors from bridge operations and runtime instantiation.
///
/// [`BridgeError::UnresolvedMember`] means the member does not exist on the
/// instance, e.g. a compiled artifact older than its graph. A member that
/// exists but fails while running is a [`BridgeError::Fault`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("member '{member}' not found on '{type_name}'")]
    UnresolvedMember { type_name: String, member: String },

    #[error(transparent)]
    Fault(RuntimeError),

    #[error(transparent)]
    Type(#[from] ReflectError),

    /// The type cannot back a bridge: it is not a class, or construction
    /// produced something other than an instance.
    #[error("type {type_name} cannot be instantiated behind a bridge")]
    NotInstantiable { type_name: String },

    #[error("source generation failed for {graph}: {message}")]
    Generation { graph: String, message: String },
}

impl BridgeError {
    pub fn is_unresolved_member(&self) -> bool {
        matches!(self, BridgeError::UnresolvedMember { .. })
    }
}

/// Only an unwrapped lookup failure counts as a missing member; the same
/// error raised inside a running body is a fault of that body.
impl From<RuntimeError> for BridgeError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::UnresolvedMember { owner, member } => BridgeError::UnresolvedMember {
                type_name: owner,
                member,
            },
            other => BridgeError::Fault(other),
        }
    }
}

impl From<MemberAccessError> for BridgeError {
    fn from(err: MemberAccessError) -> Self {
        RuntimeError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodegraph_exec::FaultOrigin;

    #[test]
    fn nested_lookup_failures_are_faults() {
        let direct = RuntimeError::UnresolvedMember {
            owner: "Game.Enemy".into(),
            member: "X".into(),
        };
        assert!(BridgeError::from(direct.clone()).is_unresolved_member());

        let nested = direct.at(FaultOrigin::Block {
            index: 0,
            name: "Attack".into(),
        });
        assert!(matches!(BridgeError::from(nested), BridgeError::Fault(_)));
    }

    #[test]
    fn compiled_access_errors_map_by_kind() {
        let missing = MemberAccessError::NotFound {
            owner: "Enemy".into(),
            member: "Armor".into(),
        };
        assert!(matches!(
            BridgeError::from(missing),
            BridgeError::UnresolvedMember { type_name, member }
                if type_name == "Enemy" && member == "Armor"
        ));
        let threw = MemberAccessError::Fault("boom".into());
        assert!(matches!(
            BridgeError::from(threw),
            BridgeError::Fault(RuntimeError::NativeFault { .. })
        ));
    }
}
