// Operation graph consumed and rewritten by the lowering engine. Generic
// nodes are what the front end produces; lowering replaces them with target
// nodes (flag-setting arithmetic, flag reads, bit tests, compares) plus any
// still-legal generic arithmetic. Nodes are immutable once pushed; a rewrite
// pushes replacement nodes and reports the new root, it never edits a node in
// place. Operand arity is checked when a node is created, so a mismatch is an
// upstream bug caught immediately rather than a latent miscompile.

//! Generic and target operation nodes.

use crate::core::registers::{PhysReg, VReg};
use crate::lower::condcode::{CondCode, Predicate};

/// Result/operand value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I8,
    I16,
    I32,
    I64,
    Ptr,
    /// Condition flag result of a flag-setting node.
    Flags,
}

impl ValueType {
    pub fn bits(self) -> u32 {
        match self {
            ValueType::I8 => 8,
            ValueType::I16 => 16,
            ValueType::I32 | ValueType::Ptr => 32,
            ValueType::I64 => 64,
            ValueType::Flags => 0,
        }
    }
}

/// Identifier of a node within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// An operand of an operation node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Node(NodeId),
    Imm(i64),
    Vreg(VReg),
    Reg(PhysReg),
    Symbol(String),
}

/// Operation opcodes. Generic ones come from the front end; target ones are
/// produced only by lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    // --- generic ---
    Mul,
    Add,
    Sub,
    Shl,
    Sra,
    Srl,
    And,
    Or,
    Xor,
    SignExtend,
    ZeroExtend,
    AnyExtend,
    CheckedAdd { signed: bool },
    CheckedSub { signed: bool },
    CheckedMul { signed: bool },
    SetCc { pred: Predicate },
    DynAlloca,
    CopyFromReg,
    CopyToReg,
    /// Runtime library call by symbol name.
    LibCall { name: &'static str },
    /// Low word of a double-width result.
    LowWord,
    /// Bundles a value result with a flag result.
    MergeValues,

    // --- target ---
    /// Flag-setting add, result plus CCR.
    TargetAdd,
    /// Flag-setting sub, result plus CCR.
    TargetSub,
    /// Flag-setting compare, CCR only.
    TargetCmp,
    /// Bit test; sets the zero flag from the selected bit.
    TargetBtst,
    /// Reads a condition out of the CCR produced by the operand node.
    TargetSetCc { cc: CondCode },
    /// Segmented-stack allocation, size in a dedicated virtual register.
    TargetSegAlloca,
}

impl Op {
    /// Expected operand count, if fixed for this opcode.
    fn arity(&self) -> Option<usize> {
        use Op::*;
        match self {
            Mul | Add | Sub | Shl | Sra | Srl | And | Or | Xor => Some(2),
            SignExtend | ZeroExtend | AnyExtend | LowWord => Some(1),
            CheckedAdd { .. } | CheckedSub { .. } | CheckedMul { .. } => Some(2),
            SetCc { .. } | TargetCmp | TargetBtst => Some(2),
            DynAlloca => Some(2),
            CopyFromReg => Some(1),
            CopyToReg => Some(2),
            TargetAdd | TargetSub => Some(2),
            TargetSetCc { .. } => Some(1),
            TargetSegAlloca => Some(1),
            LibCall { .. } | MergeValues => None,
        }
    }
}

/// Wrap flags carried over from the front end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFlags {
    pub no_signed_wrap: bool,
    pub no_unsigned_wrap: bool,
}

/// One operation node.
#[derive(Debug, Clone)]
pub struct OpNode {
    pub op: Op,
    pub operands: Vec<Value>,
    pub ty: ValueType,
    pub flags: NodeFlags,
}

/// Owning container for the operation nodes of one function.
#[derive(Debug, Default)]
pub struct OpGraph {
    nodes: Vec<OpNode>,
}

impl OpGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Op, ty: ValueType, operands: Vec<Value>) -> NodeId {
        self.push_with_flags(op, ty, operands, NodeFlags::default())
    }

    pub fn push_with_flags(
        &mut self,
        op: Op,
        ty: ValueType,
        operands: Vec<Value>,
        flags: NodeFlags,
    ) -> NodeId {
        if let Some(n) = op.arity() {
            assert_eq!(
                operands.len(),
                n,
                "operand arity mismatch for {op:?}: got {}",
                operands.len()
            );
        }
        self.nodes.push(OpNode {
            op,
            operands,
            ty,
            flags,
        });
        NodeId(self.nodes.len() as u32 - 1)
    }

    pub fn node(&self, id: NodeId) -> &OpNode {
        &self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Shorthand for a binary node of the given type.
    pub fn binary(&mut self, op: Op, ty: ValueType, lhs: Value, rhs: Value) -> NodeId {
        self.push(op, ty, vec![lhs, rhs])
    }

    /// Shift-left by a constant amount.
    pub fn shl_imm(&mut self, ty: ValueType, value: Value, amount: u32) -> NodeId {
        self.binary(Op::Shl, ty, value, Value::Imm(amount as i64))
    }
}

/// Outcome of one lowering attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lowered {
    /// The node was rewritten; the id is the root of the replacement.
    Replaced(NodeId),
    /// No special-case pattern matched; defer to generic fallback lowering.
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_read_back() {
        let mut g = OpGraph::new();
        let id = g.binary(Op::Add, ValueType::I32, Value::Imm(1), Value::Imm(2));
        assert_eq!(g.node(id).op, Op::Add);
        assert_eq!(g.node(id).operands.len(), 2);
    }

    #[test]
    #[should_panic(expected = "arity mismatch")]
    fn test_arity_checked() {
        let mut g = OpGraph::new();
        g.push(Op::Add, ValueType::I32, vec![Value::Imm(1)]);
    }
}
