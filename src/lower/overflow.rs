// Overflow-checked arithmetic. Checked add and sub map directly onto the
// flag-setting forms of the target add/sub: the arithmetic result is the
// instruction's result, and the overflow bit is a flag read of V (signed) or
// C (unsigned) off the same instruction. Checked multiply has no such flag
// mapping here and is left to generic expansion.

//! Checked add/sub lowering onto flag-setting arithmetic.

use crate::core::error::CompileResult;
use crate::lower::condcode::CondCode;
use crate::lower::node::{Lowered, NodeId, Op, Value};
use crate::lower::LowerCtx;

pub fn lower_checked(id: NodeId, ctx: &mut LowerCtx) -> CompileResult<Lowered> {
    let node = ctx.graph.node(id).clone();
    let (arith_op, signed) = match node.op {
        Op::CheckedAdd { signed } => (Op::TargetAdd, signed),
        Op::CheckedSub { signed } => (Op::TargetSub, signed),
        Op::CheckedMul { .. } => return Ok(Lowered::Unchanged),
        ref other => unreachable!("not a checked operation: {other:?}"),
    };
    let cc = if signed { CondCode::Vs } else { CondCode::Cs };

    let arith = ctx.graph.push(arith_op, node.ty, node.operands.clone());
    let overflow = ctx.graph.push(
        Op::TargetSetCc { cc },
        crate::lower::node::ValueType::I8,
        vec![Value::Node(arith)],
    );
    let merged = ctx.graph.push(
        Op::MergeValues,
        node.ty,
        vec![Value::Node(arith), Value::Node(overflow)],
    );
    log::debug!("checked {:?} lowered with {cc:?} flag read", node.op);
    Ok(Lowered::Replaced(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::FrameInfo;
    use crate::core::registers::{VReg, VRegAlloc};
    use crate::lower::node::{OpGraph, ValueType};
    use crate::target::TargetConfig;

    fn lower_op(op: Op) -> (OpGraph, Lowered) {
        let mut graph = OpGraph::new();
        let id = graph.binary(op, ValueType::I32, Value::Vreg(VReg(0)), Value::Vreg(VReg(1)));
        let cfg = TargetConfig::mc68000();
        let mut vregs = VRegAlloc::new();
        let mut frame = FrameInfo::default();
        let mut ctx = LowerCtx {
            graph: &mut graph,
            config: &cfg,
            vregs: &mut vregs,
            frame: &mut frame,
        };
        let res = lower_checked(id, &mut ctx).unwrap();
        (graph, res)
    }

    fn flag_of(graph: &OpGraph, res: Lowered) -> CondCode {
        let Lowered::Replaced(root) = res else {
            panic!("expected replacement")
        };
        let merged = graph.node(root);
        assert_eq!(merged.op, Op::MergeValues);
        let Value::Node(flag_node) = merged.operands[1] else {
            panic!("second merge operand must be the flag read")
        };
        match graph.node(flag_node).op {
            Op::TargetSetCc { cc } => cc,
            ref other => panic!("expected flag read, got {other:?}"),
        }
    }

    #[test]
    fn test_signed_add_reads_overflow_flag() {
        let (graph, res) = lower_op(Op::CheckedAdd { signed: true });
        assert_eq!(flag_of(&graph, res), CondCode::Vs);
    }

    #[test]
    fn test_unsigned_sub_reads_carry_flag() {
        let (graph, res) = lower_op(Op::CheckedSub { signed: false });
        assert_eq!(flag_of(&graph, res), CondCode::Cs);
    }

    #[test]
    fn test_checked_mul_unsupported() {
        let (_, res) = lower_op(Op::CheckedMul { signed: true });
        assert_eq!(res, Lowered::Unchanged);
    }
}
