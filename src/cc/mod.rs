// Calling convention engine. Location assignment is declarative (rule
// tables on TargetConfig) and deterministic; entry, return, call, and tail
// call lowering are separate passes over that shared engine.

//! Calling convention lowering: locations, entry, returns, calls.

pub mod assigner;
pub mod call;
pub mod entry;
pub mod ret;
pub mod tailcall;

pub use assigner::{
    aligned_argument_stack_size, ArgSpec, CCAssignment, Location, LocationAssigner,
};
pub use call::{lower_call, CallLoweringPlan, CallSite, StackStore};
pub use entry::{lower_formal_arguments, FunctionAbi, IncomingArg};
pub use ret::{lower_return, ReturnLowering, ReturnValue};
pub use tailcall::{is_eligible_for_tail_call, TailCallQuery};

use crate::core::frame::FrameIndex;
use crate::core::registers::{PhysReg, VReg};
use crate::target::{ConventionRules, TargetConfig};

/// Target of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    Symbol(String),
    /// Computed address in a virtual register.
    Reg(VReg),
}

/// One outgoing argument at a call site.
#[derive(Debug, Clone, Copy)]
pub struct CallArg {
    pub spec: ArgSpec,
    pub value: VReg,
    /// Set when the value is a load from one of the caller's frame objects;
    /// lets a tail call reuse the slot in place.
    pub from_frame: Option<FrameIndex>,
    /// Set when the value is the caller's unmodified incoming argument from
    /// this register.
    pub from_incoming_reg: Option<PhysReg>,
}

/// Whether the callee pops its own incoming argument area on return.
/// Vararg functions never do; the caller cannot know how much was pushed.
pub fn is_callee_pop(cfg: &TargetConfig, rules: &ConventionRules, is_varargs: bool) -> bool {
    if is_varargs {
        return false;
    }
    if cfg.guaranteed_tail_call_opt && cfg.can_guarantee_tco(rules.kind) {
        return true;
    }
    rules.callee_pop && cfg.can_guarantee_tco(rules.kind)
}

/// True when a call passes a hidden struct-return pointer on the stack.
pub fn is_stack_sret_call(args: &[CallArg]) -> bool {
    args.first()
        .is_some_and(|a| a.spec.sret && !a.spec.in_reg)
}
