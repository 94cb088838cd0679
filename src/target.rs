// Immutable target configuration, built once per target and passed by
// reference into every pass. This replaces the global mutable subtarget
// tables of classical backends: register identities, stack geometry, CPU
// revision flags and the declarative calling convention rule tables all live
// here and are never mutated after construction. Independent functions can
// therefore be compiled in parallel by an external driver without any
// synchronization on this state.

//! Target configuration and calling convention rule tables.

use crate::core::registers::{regs, PhysReg, RegBitSet};

/// Calling conventions this backend knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallConv {
    /// The platform C convention: arguments on the stack in 4-byte slots,
    /// `inreg` integers in D0/D1 and pointers in A0/A1, return in D0/A0.
    C,
    /// Callee-pop fast convention. Tail-call guarantees need the
    /// pop-then-return instruction, so this only fully applies on newer
    /// CPU revisions.
    Fast,
}

/// Declarative rule table for one calling convention.
///
/// For each value class the candidate registers are listed in priority
/// order; a value that gets no register is appended to the stack area at
/// the next cumulatively aligned offset.
#[derive(Debug)]
pub struct ConventionRules {
    pub kind: CallConv,
    /// Candidate registers for `inreg` integer arguments.
    pub int_regs: &'static [PhysReg],
    /// Candidate registers for `inreg` pointer arguments.
    pub ptr_regs: &'static [PhysReg],
    /// Return registers for integers, in priority order.
    pub ret_int_regs: &'static [PhysReg],
    /// Return registers for pointers.
    pub ret_ptr_regs: &'static [PhysReg],
    /// Stack slot size for arguments not passed in registers.
    pub slot_size: u32,
    pub slot_align: u32,
    /// Registers the callee must preserve.
    pub preserved: RegBitSet,
    /// True if the callee pops its incoming argument area on return.
    pub callee_pop: bool,
    /// True if returns copy the struct-return pointer back into D0.
    pub copies_sret_on_return: bool,
}

const C_INT_REGS: [PhysReg; 2] = [regs::D0, regs::D1];
const C_PTR_REGS: [PhysReg; 2] = [regs::A0, regs::A1];
const C_RET_INT_REGS: [PhysReg; 2] = [regs::D0, regs::D1];
const C_RET_PTR_REGS: [PhysReg; 1] = [regs::A0];

fn c_preserved() -> RegBitSet {
    RegBitSet::from_regs(&[
        regs::D2,
        regs::D3,
        regs::D4,
        regs::D5,
        regs::D6,
        regs::D7,
        regs::A2,
        regs::A3,
        regs::A4,
        regs::A5,
        regs::A6,
    ])
}

/// Immutable per-target configuration.
#[derive(Debug)]
pub struct TargetConfig {
    pub stack_alignment: u32,
    pub slot_size: u32,
    /// Segmented (split) stacks route dynamic allocation through a growth
    /// call instead of adjusting the stack pointer in place.
    pub split_stack: bool,
    pub position_independent: bool,
    /// 68020 and newer have the full 32-bit hardware multiply.
    pub at_least_mc68020: bool,
    /// -tailcallopt style guaranteed tail calls.
    pub guaranteed_tail_call_opt: bool,
    pub stack_reg: PhysReg,
    pub frame_reg: PhysReg,
    pub base_reg: PhysReg,
    c_convention: ConventionRules,
    fast_convention: ConventionRules,
}

impl TargetConfig {
    /// Baseline MC68000 configuration.
    pub fn mc68000() -> Self {
        Self::with_revision(false)
    }

    /// MC68020 configuration: hardware 32-bit multiply available.
    pub fn mc68020() -> Self {
        Self::with_revision(true)
    }

    fn with_revision(at_least_mc68020: bool) -> Self {
        Self {
            stack_alignment: 8,
            slot_size: 4,
            split_stack: false,
            position_independent: false,
            at_least_mc68020,
            guaranteed_tail_call_opt: false,
            stack_reg: regs::SP,
            frame_reg: regs::A6,
            base_reg: regs::A5,
            c_convention: ConventionRules {
                kind: CallConv::C,
                int_regs: &C_INT_REGS,
                ptr_regs: &C_PTR_REGS,
                ret_int_regs: &C_RET_INT_REGS,
                ret_ptr_regs: &C_RET_PTR_REGS,
                slot_size: 4,
                slot_align: 4,
                preserved: c_preserved(),
                callee_pop: false,
                copies_sret_on_return: true,
            },
            fast_convention: ConventionRules {
                kind: CallConv::Fast,
                int_regs: &C_INT_REGS,
                ptr_regs: &C_PTR_REGS,
                ret_int_regs: &C_RET_INT_REGS,
                ret_ptr_regs: &C_RET_PTR_REGS,
                slot_size: 4,
                slot_align: 4,
                preserved: c_preserved(),
                callee_pop: true,
                copies_sret_on_return: true,
            },
        }
    }

    pub fn convention(&self, conv: CallConv) -> &ConventionRules {
        match conv {
            CallConv::C => &self.c_convention,
            CallConv::Fast => &self.fast_convention,
        }
    }

    /// True if calls with this convention may ever become tail calls.
    pub fn may_tail_call(&self, conv: CallConv) -> bool {
        match conv {
            CallConv::C => true,
            other => self.can_guarantee_tco(other),
        }
    }

    /// True if this convention can be made a guaranteed-TCO target by
    /// changing its ABI. Needs the callee-pop return, which the baseline
    /// 68000 revision lacks.
    pub fn can_guarantee_tco(&self, conv: CallConv) -> bool {
        conv == CallConv::Fast && self.at_least_mc68020
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_convention_rules() {
        let target = TargetConfig::mc68000();
        let rules = target.convention(CallConv::C);
        assert_eq!(rules.slot_size, 4);
        assert!(!rules.callee_pop);
        assert!(rules.preserved.contains(regs::D2));
        assert!(!rules.preserved.contains(regs::D0));
        assert!(!rules.preserved.contains(regs::SP));
    }

    #[test]
    fn test_tail_call_gating() {
        let m68000 = TargetConfig::mc68000();
        assert!(m68000.may_tail_call(CallConv::C));
        assert!(!m68000.may_tail_call(CallConv::Fast));
        let m68020 = TargetConfig::mc68020();
        assert!(m68020.can_guarantee_tco(CallConv::Fast));
    }
}
