// Multiply lowering. Constant multiplications near a power of two are
// strength-reduced to shift plus add or sub; everything the hardware of the
// configured CPU revision cannot multiply natively goes to the compiler-rt
// helpers (__mulsi3 for 32-bit, __muldi3 for 64-bit, both only before the
// 68020). Anything else is left for generic lowering.

//! Multiplication strength reduction and libcall fallback.

use crate::core::error::CompileResult;
use crate::lower::node::{Lowered, NodeId, Op, Value, ValueType};
use crate::lower::LowerCtx;

pub fn lower_mul(id: NodeId, ctx: &mut LowerCtx) -> CompileResult<Lowered> {
    let node = ctx.graph.node(id).clone();
    debug_assert_eq!(node.op, Op::Mul);
    let lhs = node.operands[0].clone();
    let rhs = node.operands[1].clone();

    if let Value::Imm(c) = rhs {
        if let Some(replaced) = reduce_by_constant(ctx, node.ty, lhs.clone(), c) {
            log::debug!("strength-reduced mul by {c}");
            return Ok(Lowered::Replaced(replaced));
        }
    }

    match node.ty {
        ValueType::I64 if !ctx.config.at_least_mc68020 => {
            // The helper takes each operand as a low/high word pair; the
            // high words carry the sign of the low words, and only the low
            // word of the double-width result survives.
            let lhs_hi = ctx
                .graph
                .push(Op::Sra, ValueType::I32, vec![lhs.clone(), Value::Imm(31)]);
            let rhs_hi = ctx
                .graph
                .push(Op::Sra, ValueType::I32, vec![rhs.clone(), Value::Imm(31)]);
            let call = ctx.graph.push(
                Op::LibCall { name: "__muldi3" },
                ValueType::I64,
                vec![lhs, Value::Node(lhs_hi), rhs, Value::Node(rhs_hi)],
            );
            let low = ctx
                .graph
                .push(Op::LowWord, ValueType::I32, vec![Value::Node(call)]);
            log::debug!("64-bit mul lowered to __muldi3");
            Ok(Lowered::Replaced(low))
        }
        ValueType::I32 if !ctx.config.at_least_mc68020 => {
            let call = ctx.graph.push(
                Op::LibCall { name: "__mulsi3" },
                ValueType::I32,
                vec![lhs, rhs],
            );
            log::debug!("32-bit mul lowered to __mulsi3");
            Ok(Lowered::Replaced(call))
        }
        _ => Ok(Lowered::Unchanged),
    }
}

/// Rewrites `x * c` when `c` is a power of two or one off from one. Returns
/// the replacement root, or `None` when no reduction applies.
fn reduce_by_constant(ctx: &mut LowerCtx, ty: ValueType, x: Value, c: i64) -> Option<NodeId> {
    if c <= 0 {
        return None;
    }
    let c = c as u64;
    if c.is_power_of_two() {
        return Some(ctx.graph.shl_imm(ty, x, c.trailing_zeros()));
    }
    if (c - 1).is_power_of_two() {
        // x * (2^k + 1)  ->  (x << k) + x
        let shl = ctx.graph.shl_imm(ty, x.clone(), (c - 1).trailing_zeros());
        return Some(ctx.graph.binary(Op::Add, ty, Value::Node(shl), x));
    }
    if (c + 1).is_power_of_two() {
        // x * (2^k - 1)  ->  (x << k) - x
        let shl = ctx.graph.shl_imm(ty, x.clone(), (c + 1).trailing_zeros());
        return Some(ctx.graph.binary(Op::Sub, ty, Value::Node(shl), x));
    }
    None
}
