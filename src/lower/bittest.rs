// SetCc lowering. An `and` result compared against zero is converted into a
// bit-test node whenever one bit is being isolated: `x & (1 << n)`,
// `(x >> n) & 1`, or a power-of-two mask too wide to encode as a test
// immediate. BTST sets the Z flag from the tested bit, so the equality sense
// inverts: compare-equal-zero becomes Ne on the flag and compare-not-equal
// becomes Eq. Everything else goes through predicate translation into a
// flag-setting compare plus a flag read.

//! SetCc lowering with bit-test extraction.

use crate::core::error::CompileResult;
use crate::lower::condcode::{translate_cond_code, CondCode, IntPredicate, Predicate};
use crate::lower::node::{Lowered, NodeId, Op, Value, ValueType};
use crate::lower::LowerCtx;

pub fn lower_setcc(id: NodeId, ctx: &mut LowerCtx) -> CompileResult<Lowered> {
    let node = ctx.graph.node(id).clone();
    let Op::SetCc { pred } = node.op else {
        unreachable!("not a setcc node");
    };
    let mut lhs = node.operands[0].clone();
    let mut rhs = node.operands[1].clone();

    if let Predicate::Int(p @ (IntPredicate::Eq | IntPredicate::Ne)) = pred {
        if rhs == Value::Imm(0) {
            if let Some((src, bit)) = match_bit_test(ctx, &lhs) {
                let bt = ctx.graph.binary(Op::TargetBtst, ValueType::I32, src, bit);
                let cc = if p == IntPredicate::Eq {
                    CondCode::Ne
                } else {
                    CondCode::Eq
                };
                let set = ctx
                    .graph
                    .push(Op::TargetSetCc { cc }, ValueType::I8, vec![Value::Node(bt)]);
                log::debug!("setcc lowered to bit test with {cc:?}");
                return Ok(Lowered::Replaced(set));
            }
        }
    }

    let cc = translate_cond_code(pred, &mut lhs, &mut rhs);
    if !cc.is_valid() {
        // No single-flag encoding; leave for generic legalization.
        return Ok(Lowered::Unchanged);
    }
    let cmp = ctx.graph.binary(Op::TargetCmp, node.ty, lhs, rhs);
    let set = ctx
        .graph
        .push(Op::TargetSetCc { cc }, ValueType::I8, vec![Value::Node(cmp)]);
    Ok(Lowered::Replaced(set))
}

/// Matches an `and` whose result isolates a single bit. Returns the tested
/// value and the bit number operand.
fn match_bit_test(ctx: &LowerCtx, value: &Value) -> Option<(Value, Value)> {
    let Value::Node(and_id) = value else {
        return None;
    };
    let and = ctx.graph.node(*and_id);
    if and.op != Op::And {
        return None;
    }
    let (mut op0, mut op1) = (and.operands[0].clone(), and.operands[1].clone());

    // x & (1 << n)  ->  test bit n of x.
    if shl_of_one(ctx, &op1).is_some() {
        std::mem::swap(&mut op0, &mut op1);
    }
    if let Some(amount) = shl_of_one(ctx, &op0) {
        return Some((op1, amount));
    }

    if let Value::Imm(mask) = op1 {
        // (x >> n) & 1  ->  test bit n of x.
        if mask == 1 {
            if let Value::Node(shift_id) = op0 {
                let shift = ctx.graph.node(shift_id);
                if matches!(shift.op, Op::Srl | Op::Sra) {
                    return Some((shift.operands[0].clone(), shift.operands[1].clone()));
                }
            }
        }
        // A power-of-two mask too wide for a test immediate.
        let mask = mask as u64;
        if mask > u32::MAX as u64 && mask.is_power_of_two() {
            return Some((op0, Value::Imm(mask.trailing_zeros() as i64)));
        }
    }
    None
}

/// If `value` is `1 << n`, returns `n`.
fn shl_of_one(ctx: &LowerCtx, value: &Value) -> Option<Value> {
    let Value::Node(id) = value else {
        return None;
    };
    let node = ctx.graph.node(*id);
    if node.op == Op::Shl && node.operands[0] == Value::Imm(1) {
        Some(node.operands[1].clone())
    } else {
        None
    }
}
