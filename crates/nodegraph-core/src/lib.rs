pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod member;
pub mod node;
pub mod ops;
pub mod root;
pub mod types;

// Re-export commonly used types
pub use edge::{FlowEdge, FlowSlot};
pub use error::CoreError;
pub use graph::{Graph, GraphKind};
pub use id::{EdgeId, NodeId, RootId};
pub use member::MemberReference;
pub use node::{InputPort, JumpKind, JumpStatement, Node, OutputPort};
pub use ops::{AssignOp, BinaryOp, CompareOp, NodeKind};
pub use root::{LocalVariable, Parameter, Property, RootKind, RootObject, Variable};
pub use types::{natives, ConstValue, GenericConstraint, GenericParameter, TypeRef, Visibility};
