//! Node operation vocabulary.
//!
//! Nodes come in two flavours:
//! - **Flow nodes** are reached through flow edges and execute in connection
//!   order (assignments, calls, branches, loops, jumps, suspension points).
//! - **Data nodes** are never reached through flow edges. Their output ports
//!   are evaluated on demand whenever a consumer reads them.
//!
//! `Invoke` and `New` work either way: reached by flow they execute once and
//! cache their output; read as data they execute at each read.
//!
//! # Port conventions
//!
//! - Targets that need a receiver (`MemberReference::Instance`, non-static
//!   `MemberReference::Native`) read it from input 0; the remaining inputs are
//!   arguments or the assigned value.
//! - `If` and `While` read their condition from input 0.
//! - `ForEach` reads its collection from input 0.
//! - `Return` and `Yield` read their value from input 0 when present.
//! - Every value-producing node publishes its result on output port 0.

use serde::{Deserialize, Serialize};

use crate::member::MemberReference;
use crate::types::{ConstValue, TypeRef};

/// Binary operators over runtime values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Assignment operators: plain `=` and the compound forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, `None` for `=`.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
        }
    }

    /// Parses the source form (`=`, `+=`, ...).
    pub fn parse(symbol: &str) -> Option<AssignOp> {
        match symbol {
            "=" => Some(AssignOp::Assign),
            "+=" => Some(AssignOp::Add),
            "-=" => Some(AssignOp::Sub),
            "*=" => Some(AssignOp::Mul),
            "/=" => Some(AssignOp::Div),
            "%=" => Some(AssignOp::Rem),
            _ => None,
        }
    }
}

/// The operation a node performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // -- flow ---------------------------------------------------------------
    /// Assigns the last input to `target`, optionally compounding.
    SetValue { target: MemberReference, op: AssignOp },
    /// Calls a function or method; result on output 0.
    Invoke { target: MemberReference },
    /// Two-way branch on input 0 (True/False slots), then Next.
    If,
    /// Runs Body while input 0 holds, then Next.
    While,
    /// Runs Body once per element of input 0, binding local `item`.
    ForEach { item: String },
    /// Leaves the innermost loop.
    Break,
    /// Skips to the next iteration of the innermost loop.
    Continue,
    /// Ends the body, with input 0 as the value when present.
    Return,
    /// Suspends a cooperative body for the given number of ticks.
    Wait { ticks: u32 },
    /// Suspends a cooperative body, yielding input 0 to the scheduler.
    Yield,
    /// Constructs an instance of `ty` from the inputs; result on output 0.
    New { ty: TypeRef },

    // -- data ---------------------------------------------------------------
    /// Constant on output 0.
    Literal(ConstValue),
    /// Reads `source` on output 0.
    Get { source: MemberReference },
    Binary { op: BinaryOp },
    Compare { op: CompareOp },
    Not,
    /// Collects all inputs into a list.
    MakeList,
}

impl NodeKind {
    /// Returns `true` if the node can be reached through flow edges.
    pub fn is_flow(&self) -> bool {
        matches!(
            self,
            NodeKind::SetValue { .. }
                | NodeKind::Invoke { .. }
                | NodeKind::If
                | NodeKind::While
                | NodeKind::ForEach { .. }
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::Return
                | NodeKind::Wait { .. }
                | NodeKind::Yield
                | NodeKind::New { .. }
        )
    }

    /// Returns `true` if the node can be evaluated on demand as a value.
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            NodeKind::Invoke { .. }
                | NodeKind::New { .. }
                | NodeKind::Literal(_)
                | NodeKind::Get { .. }
                | NodeKind::Binary { .. }
                | NodeKind::Compare { .. }
                | NodeKind::Not
                | NodeKind::MakeList
        )
    }

    /// Returns `true` for loop nodes that Break/Continue unwind to.
    pub fn is_loop(&self) -> bool {
        matches!(self, NodeKind::While | NodeKind::ForEach { .. })
    }

    /// Returns `true` for nodes that suspend a cooperative body.
    pub fn is_suspension(&self) -> bool {
        matches!(self, NodeKind::Wait { .. } | NodeKind::Yield)
    }

    /// Returns `true` if the target member needs a receiver on input 0.
    pub fn takes_receiver(&self) -> bool {
        let target = match self {
            NodeKind::SetValue { target, .. } | NodeKind::Invoke { target } => target,
            NodeKind::Get { source } => source,
            _ => return false,
        };
        matches!(
            target,
            MemberReference::Instance { .. }
                | MemberReference::Native {
                    is_static: false,
                    ..
                }
        )
    }

    /// Short label used in traces and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::SetValue { .. } => "SetValue",
            NodeKind::Invoke { .. } => "Invoke",
            NodeKind::If => "If",
            NodeKind::While => "While",
            NodeKind::ForEach { .. } => "ForEach",
            NodeKind::Break => "Break",
            NodeKind::Continue => "Continue",
            NodeKind::Return => "Return",
            NodeKind::Wait { .. } => "Wait",
            NodeKind::Yield => "Yield",
            NodeKind::New { .. } => "New",
            NodeKind::Literal(_) => "Literal",
            NodeKind::Get { .. } => "Get",
            NodeKind::Binary { .. } => "Binary",
            NodeKind::Compare { .. } => "Compare",
            NodeKind::Not => "Not",
            NodeKind::MakeList => "MakeList",
        }
    }
}
