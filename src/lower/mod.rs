// Lowering engine. Each custom-lowered generic operation gets one entry
// point that either rewrites the node into target-legal nodes or reports
// Unchanged, deferring to the generic fallback outside this crate. The
// dispatch below is the single routing point; operations it does not route
// are legal as-is or handled generically.

//! Lowering of generic operations to target-legal forms.

pub mod alloca;
pub mod bittest;
pub mod condcode;
pub mod mul;
pub mod node;
pub mod overflow;
pub mod select;

pub use condcode::{CondCode, FloatPredicate, IntPredicate, Predicate};
pub use node::{Lowered, NodeId, Op, OpGraph, OpNode, Value, ValueType};

use crate::core::error::CompileResult;
use crate::core::frame::FrameInfo;
use crate::core::registers::VRegAlloc;
use crate::target::TargetConfig;

/// Mutable state threaded through the lowering of one function.
pub struct LowerCtx<'a> {
    pub graph: &'a mut OpGraph,
    pub config: &'a TargetConfig,
    pub vregs: &'a mut VRegAlloc,
    pub frame: &'a mut FrameInfo,
}

/// Lower one operation node. `Unchanged` means the node needs no custom
/// handling here.
pub fn lower_operation(id: NodeId, ctx: &mut LowerCtx) -> CompileResult<Lowered> {
    match ctx.graph.node(id).op {
        Op::Mul => mul::lower_mul(id, ctx),
        Op::CheckedAdd { .. } | Op::CheckedSub { .. } | Op::CheckedMul { .. } => {
            overflow::lower_checked(id, ctx)
        }
        Op::SetCc { .. } => bittest::lower_setcc(id, ctx),
        Op::DynAlloca => alloca::lower_dyn_alloca(id, ctx),
        _ => Ok(Lowered::Unchanged),
    }
}
