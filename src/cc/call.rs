// Call lowering. Produces a plan rather than instructions: the register
// moves and stack stores to perform before the call, the byte counts pushed
// and popped around it, and the result register copies after it. Sibling
// calls push nothing; guaranteed tail calls realign the outgoing area and
// record the frame delta so pseudo expansion can reconcile the stack when it
// rewrites the tail call pseudo. A call that never returns pretends the
// callee pops the whole area, so no dead reset is emitted after it.

//! Call lowering.

use bumpalo::Bump;

use crate::cc::assigner::{
    aligned_argument_stack_size, slot_value_offset, ArgSpec, LocationAssigner,
};
use crate::cc::{is_callee_pop, is_stack_sret_call, CallArg, CallTarget};
use crate::core::error::CompileResult;
use crate::core::frame::FrameInfo;
use crate::core::func_info::MachineFunctionInfo;
use crate::core::registers::{PhysReg, VReg, VRegAlloc};
use crate::target::{CallConv, TargetConfig};

/// One call site, as handed down by the front end.
#[derive(Debug)]
pub struct CallSite<'a> {
    pub target: CallTarget,
    pub conv: CallConv,
    pub is_varargs: bool,
    pub args: &'a [CallArg],
    pub rets: &'a [ArgSpec],
    pub no_return: bool,
    /// Eligibility has already been established by the caller.
    pub is_tail_call: bool,
}

/// One argument store into the outgoing area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackStore {
    /// Slot offset in the outgoing argument area.
    pub offset: u32,
    /// Byte offset the value is actually stored at, after the big-endian
    /// sub-word correction.
    pub store_offset: u32,
    pub size: u32,
    pub value: VReg,
    /// Byte count of an aggregate copied by value, if this is one.
    pub byval: Option<u32>,
}

/// Everything the emission stage needs to materialize one call.
#[derive(Debug)]
pub struct CallLoweringPlan {
    pub reg_moves: Vec<(PhysReg, VReg)>,
    pub stack_stores: Vec<StackStore>,
    /// Bytes pushed before the call; zero for sibling calls.
    pub bytes_to_push: u32,
    /// Bytes the callee pops, for the call-sequence bookkeeping.
    pub callee_pop_bytes: u32,
    pub is_sibcall: bool,
    /// Frame delta of a guaranteed (non-sibling) tail call.
    pub fp_diff: i32,
    /// Result registers and the virtual registers they land in.
    pub ret_copies: Vec<(PhysReg, VReg)>,
}

pub fn lower_call(
    site: &CallSite,
    cfg: &TargetConfig,
    frame: &mut FrameInfo,
    info: &mut MachineFunctionInfo,
    vregs: &mut VRegAlloc,
) -> CompileResult<CallLoweringPlan> {
    let rules = cfg.convention(site.conv);
    let bump = Bump::new();
    let mut assigner = LocationAssigner::new(&bump, rules);
    let specs: Vec<ArgSpec> = site.args.iter().map(|a| a.spec).collect();
    assigner.assign_args(&specs);

    let guaranteed_tail = site.is_tail_call
        && cfg.guaranteed_tail_call_opt
        && cfg.can_guarantee_tco(site.conv);
    let is_sibcall = site.is_tail_call && !guaranteed_tail;

    let mut bytes = assigner.stack_size();
    let mut fp_diff = 0i32;
    if guaranteed_tail {
        bytes = aligned_argument_stack_size(bytes, cfg.stack_alignment, cfg.slot_size);
        // Room the caller already reserved minus what this call needs.
        fp_diff = info.bytes_to_pop_on_return as i32 - bytes as i32;
        info.update_tc_return_addr_delta(fp_diff);
    }
    if site.is_tail_call {
        frame.has_tail_call = true;
    }

    let mut reg_moves = Vec::new();
    let mut stack_stores = Vec::new();
    for (arg, assignment) in site.args.iter().zip(assigner.assignments()) {
        match assignment.reg() {
            Some(reg) => reg_moves.push((reg, arg.value)),
            None => {
                let offset = assignment.stack_offset().unwrap();
                stack_stores.push(StackStore {
                    offset,
                    store_offset: offset + slot_value_offset(assignment, rules.slot_size),
                    size: assignment.size,
                    value: arg.value,
                    byval: arg.spec.byval,
                });
            }
        }
    }

    // Forwarded registers of a musttail vararg caller travel on every such
    // call, whether or not this call names them.
    if site.is_tail_call {
        for &(reg, vreg) in &info.forwarded_musttail_regs {
            if !reg_moves.iter().any(|(r, _)| *r == reg) {
                reg_moves.push((reg, vreg));
            }
        }
    }

    let callee_pop_bytes = if is_callee_pop(cfg, rules, site.is_varargs) {
        bytes
    } else if !cfg.can_guarantee_tco(site.conv) && is_stack_sret_call(site.args) {
        // The callee pops the hidden struct pointer, so the caller must
        // account for pushing it back.
        cfg.slot_size
    } else if site.no_return {
        // The stack never needs resetting after a call that cannot return;
        // account as if the callee cleaned up.
        bytes
    } else {
        0
    };

    let mut ret_assigner = LocationAssigner::new(&bump, rules);
    ret_assigner.assign_returns(site.rets)?;
    let ret_copies = ret_assigner
        .assignments()
        .iter()
        .map(|a| (a.reg().unwrap(), vregs.alloc()))
        .collect();

    log::debug!(
        "call to {:?}: {} reg moves, {} stack bytes, sibcall={is_sibcall}",
        site.target,
        reg_moves.len(),
        bytes
    );

    Ok(CallLoweringPlan {
        reg_moves,
        stack_stores,
        bytes_to_push: if is_sibcall { 0 } else { bytes },
        callee_pop_bytes,
        is_sibcall,
        fp_diff,
        ret_copies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registers::regs;
    use crate::lower::node::ValueType;

    fn arg(ty: ValueType) -> CallArg {
        CallArg {
            spec: ArgSpec::new(ty),
            value: VReg(10),
            from_frame: None,
            from_incoming_reg: None,
        }
    }

    fn lower(
        site: &CallSite,
        cfg: &TargetConfig,
        info: &mut MachineFunctionInfo,
    ) -> CallLoweringPlan {
        let mut frame = FrameInfo::new();
        let mut vregs = VRegAlloc::new();
        lower_call(site, cfg, &mut frame, info, &mut vregs).unwrap()
    }

    #[test]
    fn test_plain_call_pushes_stack_args() {
        let cfg = TargetConfig::mc68000();
        let mut info = MachineFunctionInfo::new();
        let args = [arg(ValueType::I32), arg(ValueType::I8)];
        let rets = [ArgSpec::new(ValueType::I32)];
        let site = CallSite {
            target: CallTarget::Symbol("callee".into()),
            conv: CallConv::C,
            is_varargs: false,
            args: &args,
            rets: &rets,
            no_return: false,
            is_tail_call: false,
        };
        let plan = lower(&site, &cfg, &mut info);
        assert_eq!(plan.bytes_to_push, 8);
        assert_eq!(plan.callee_pop_bytes, 0);
        assert_eq!(plan.stack_stores.len(), 2);
        // Byte argument stores at the end of its slot.
        assert_eq!(plan.stack_stores[1].offset, 4);
        assert_eq!(plan.stack_stores[1].store_offset, 7);
        assert_eq!(plan.ret_copies[0].0, regs::D0);
    }

    #[test]
    fn test_sibcall_pushes_nothing() {
        let cfg = TargetConfig::mc68000();
        let mut info = MachineFunctionInfo::new();
        let args = [arg(ValueType::I32)];
        let site = CallSite {
            target: CallTarget::Symbol("callee".into()),
            conv: CallConv::C,
            is_varargs: false,
            args: &args,
            rets: &[],
            no_return: false,
            is_tail_call: true,
        };
        let plan = lower(&site, &cfg, &mut info);
        assert!(plan.is_sibcall);
        assert_eq!(plan.bytes_to_push, 0);
    }

    #[test]
    fn test_guaranteed_tail_call_records_frame_delta() {
        let mut cfg = TargetConfig::mc68020();
        cfg.guaranteed_tail_call_opt = true;
        let mut info = MachineFunctionInfo::new();
        info.bytes_to_pop_on_return = 4;
        // Three stack slots: 12 bytes, already aligned to 8n+4.
        let args = [
            arg(ValueType::I32),
            arg(ValueType::I32),
            arg(ValueType::I32),
        ];
        let site = CallSite {
            target: CallTarget::Symbol("callee".into()),
            conv: CallConv::Fast,
            is_varargs: false,
            args: &args,
            rets: &[],
            no_return: false,
            is_tail_call: true,
        };
        let plan = lower(&site, &cfg, &mut info);
        assert!(!plan.is_sibcall);
        assert_eq!(plan.bytes_to_push, 12);
        assert_eq!(plan.fp_diff, -8);
        assert_eq!(info.tc_return_addr_delta(), -8);
    }

    #[test]
    fn test_no_return_call_pretends_callee_pops() {
        let cfg = TargetConfig::mc68000();
        let mut info = MachineFunctionInfo::new();
        let args = [arg(ValueType::I32)];
        let site = CallSite {
            target: CallTarget::Symbol("abort".into()),
            conv: CallConv::C,
            is_varargs: false,
            args: &args,
            rets: &[],
            no_return: true,
            is_tail_call: false,
        };
        let plan = lower(&site, &cfg, &mut info);
        assert_eq!(plan.callee_pop_bytes, 4);
    }

    #[test]
    fn test_stack_sret_call_accounts_hidden_pointer_pop() {
        let cfg = TargetConfig::mc68000();
        let mut info = MachineFunctionInfo::new();
        let args = [CallArg {
            spec: ArgSpec::new(ValueType::Ptr).sret(),
            value: VReg(0),
            from_frame: None,
            from_incoming_reg: None,
        }];
        let site = CallSite {
            target: CallTarget::Symbol("returns_struct".into()),
            conv: CallConv::C,
            is_varargs: false,
            args: &args,
            rets: &[],
            no_return: false,
            is_tail_call: false,
        };
        let plan = lower(&site, &cfg, &mut info);
        assert_eq!(plan.callee_pop_bytes, 4);
    }
}
