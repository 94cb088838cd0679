// Dynamic stack allocation. Split-stack targets copy the requested size into
// a fresh address-class virtual register and emit the segmented allocation
// pseudo around it; the pseudo's machine-level emission is not supported and
// reports an error if it survives to expansion. Everyone else reads the stack
// pointer, subtracts the size, masks the result down when the requested
// alignment exceeds the target stack alignment, and writes the stack pointer
// back. The masked value doubles as the allocation's address.

//! Dynamic stack allocation lowering.

use crate::core::error::CompileResult;
use crate::lower::node::{Lowered, NodeId, Op, Value, ValueType};
use crate::lower::LowerCtx;

pub fn lower_dyn_alloca(id: NodeId, ctx: &mut LowerCtx) -> CompileResult<Lowered> {
    let node = ctx.graph.node(id).clone();
    debug_assert_eq!(node.op, Op::DynAlloca);
    let size = node.operands[0].clone();
    let align = node.operands[1].as_imm_or_zero();
    ctx.frame.has_var_sized_objects = true;

    if ctx.config.split_stack {
        let size_vreg = ctx.vregs.alloc();
        ctx.graph.binary(
            Op::CopyToReg,
            ValueType::Ptr,
            Value::Vreg(size_vreg),
            size,
        );
        let alloc = ctx.graph.push(
            Op::TargetSegAlloca,
            ValueType::Ptr,
            vec![Value::Vreg(size_vreg)],
        );
        log::debug!("dynamic alloca routed to segmented stack via {size_vreg:?}");
        return Ok(Lowered::Replaced(alloc));
    }

    let sp = ctx.graph.push(
        Op::CopyFromReg,
        ValueType::Ptr,
        vec![Value::Reg(ctx.config.stack_reg)],
    );
    let mut result = ctx
        .graph
        .binary(Op::Sub, ValueType::Ptr, Value::Node(sp), size);
    if align > ctx.config.stack_alignment as i64 {
        result = ctx.graph.binary(
            Op::And,
            ValueType::Ptr,
            Value::Node(result),
            Value::Imm(-align),
        );
    }
    let writeback = ctx.graph.binary(
        Op::CopyToReg,
        ValueType::Ptr,
        Value::Reg(ctx.config.stack_reg),
        Value::Node(result),
    );
    let merged = ctx.graph.push(
        Op::MergeValues,
        ValueType::Ptr,
        vec![Value::Node(result), Value::Node(writeback)],
    );
    Ok(Lowered::Replaced(merged))
}

trait ImmOrZero {
    fn as_imm_or_zero(&self) -> i64;
}

impl ImmOrZero for Value {
    fn as_imm_or_zero(&self) -> i64 {
        match self {
            Value::Imm(v) => *v,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::FrameInfo;
    use crate::core::registers::{VReg, VRegAlloc};
    use crate::lower::node::OpGraph;
    use crate::target::TargetConfig;

    fn run(cfg: &TargetConfig, align: i64) -> (OpGraph, FrameInfo, Lowered) {
        let mut graph = OpGraph::new();
        let id = graph.binary(
            Op::DynAlloca,
            ValueType::Ptr,
            Value::Vreg(VReg(0)),
            Value::Imm(align),
        );
        let mut vregs = VRegAlloc::new();
        let mut frame = FrameInfo::default();
        let res = {
            let mut ctx = LowerCtx {
                graph: &mut graph,
                config: cfg,
                vregs: &mut vregs,
                frame: &mut frame,
            };
            lower_dyn_alloca(id, &mut ctx).unwrap()
        };
        (graph, frame, res)
    }

    #[test]
    fn test_in_place_allocation_updates_sp() {
        let cfg = TargetConfig::mc68000();
        let (graph, frame, res) = run(&cfg, 4);
        assert!(frame.has_var_sized_objects);
        let Lowered::Replaced(root) = res else {
            panic!("expected replacement")
        };
        let merged = graph.node(root);
        assert_eq!(merged.op, Op::MergeValues);
        // Default alignment: sub feeds the writeback directly, no mask.
        let Value::Node(result) = merged.operands[0] else {
            panic!("expected node")
        };
        assert_eq!(graph.node(result).op, Op::Sub);
    }

    #[test]
    fn test_overaligned_allocation_masks() {
        let cfg = TargetConfig::mc68000();
        let (graph, _, res) = run(&cfg, 32);
        let Lowered::Replaced(root) = res else {
            panic!("expected replacement")
        };
        let Value::Node(result) = graph.node(root).operands[0] else {
            panic!("expected node")
        };
        let mask = graph.node(result);
        assert_eq!(mask.op, Op::And);
        assert_eq!(mask.operands[1], Value::Imm(-32));
    }

    #[test]
    fn test_split_stack_uses_seg_alloca() {
        let mut cfg = TargetConfig::mc68000();
        cfg.split_stack = true;
        let (graph, _, res) = run(&cfg, 4);
        let Lowered::Replaced(root) = res else {
            panic!("expected replacement")
        };
        let alloc = graph.node(root);
        assert_eq!(alloc.op, Op::TargetSegAlloca);
        assert!(matches!(alloc.operands[0], Value::Vreg(_)));
    }
}
