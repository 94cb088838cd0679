// Tail call eligibility. Under guaranteed tail call optimization the answer
// only depends on the convention pair; otherwise this looks for the obvious
// safe case, the sibling call: no dynamic stack realignment, no struct
// return on either side, results passed the same way, callee preserving
// everything the caller must preserve, every outgoing stack argument already
// sitting in the caller's matching fixed frame slot, and a register-indirect
// or position-independent target still leaving an address register free for
// the call address itself. Finally the callee's cleanup behavior has to
// reproduce the caller's own pending pop count.

//! Tail call eligibility checking.

use bumpalo::Bump;

use crate::cc::assigner::{slot_value_offset, ArgSpec, CCAssignment, LocationAssigner};
use crate::cc::{is_callee_pop, CallArg};
use crate::core::frame::FrameInfo;
use crate::core::func_info::MachineFunctionInfo;
use crate::core::registers::regs;
use crate::target::{CallConv, TargetConfig};

/// Everything the eligibility decision needs to know about one call site
/// and its surrounding function.
#[derive(Debug, Clone, Copy)]
pub struct TailCallQuery<'a> {
    pub callee_conv: CallConv,
    pub caller_conv: CallConv,
    pub is_varargs: bool,
    pub callee_sret: bool,
    pub caller_sret: bool,
    /// The callee is a known symbol rather than a computed address.
    pub callee_is_direct: bool,
    pub args: &'a [CallArg],
    pub callee_rets: &'a [ArgSpec],
    pub caller_rets: &'a [ArgSpec],
}

pub fn is_eligible_for_tail_call(
    query: &TailCallQuery,
    cfg: &TargetConfig,
    frame: &FrameInfo,
    info: &MachineFunctionInfo,
) -> bool {
    if !cfg.may_tail_call(query.callee_conv) {
        return false;
    }

    let cc_match = query.caller_conv == query.callee_conv;
    if cfg.guaranteed_tail_call_opt {
        return cfg.can_guarantee_tco(query.callee_conv) && cc_match;
    }

    // Sibling call checks from here on.
    if frame.needs_stack_realignment {
        return false;
    }
    if query.callee_sret || query.caller_sret {
        return false;
    }

    let rules = cfg.convention(query.callee_conv);
    let bump = Bump::new();
    let mut assigner = LocationAssigner::new(&bump, rules);
    let specs: Vec<ArgSpec> = query.args.iter().map(|a| a.spec).collect();
    assigner.assign_args(&specs);

    if query.is_varargs && !query.args.is_empty() {
        // Vararg sibcalls only when nothing ends up on the stack.
        if assigner.assignments().iter().any(|a| a.reg().is_none()) {
            return false;
        }
    }

    if !results_compatible(query, cfg) {
        return false;
    }

    let caller_preserved = &cfg.convention(query.caller_conv).preserved;
    if !rules.preserved.is_superset_of(caller_preserved) {
        return false;
    }

    let stack_args_size = assigner.stack_size();

    if !query.args.is_empty() {
        if stack_args_size > 0 {
            // Every stack argument must already be laid out in the caller's
            // own incoming argument area.
            for (arg, assignment) in query.args.iter().zip(assigner.assignments()) {
                if assignment.reg().is_some() {
                    continue;
                }
                if !matching_stack_slot(arg, assignment, rules.slot_size, frame) {
                    return false;
                }
            }
        }

        // An indirect or position-independent call needs A0 or A1 for the
        // target address, after callee-saved restores.
        if !query.callee_is_direct || cfg.position_independent {
            let max_in_regs = if cfg.position_independent { 1 } else { 2 };
            let mut in_regs = 0;
            for assignment in assigner.assignments() {
                match assignment.reg() {
                    Some(r) if r == regs::A0 || r == regs::A1 => {
                        in_regs += 1;
                        if in_regs == max_in_regs {
                            return false;
                        }
                    }
                    _ => {}
                }
            }
        }

        // Arguments landing in callee-saved registers must be the caller's
        // own incoming values from those registers, which are restored
        // before the jump.
        for (arg, assignment) in query.args.iter().zip(assigner.assignments()) {
            if let Some(reg) = assignment.reg() {
                if caller_preserved.contains(reg) && arg.from_incoming_reg != Some(reg) {
                    return false;
                }
            }
        }
    }

    let callee_will_pop = is_callee_pop(cfg, rules, query.is_varargs);
    let bytes_to_pop = info.bytes_to_pop_on_return;
    if bytes_to_pop != 0 {
        // The callee must reproduce the caller's pending pop.
        if !(callee_will_pop && bytes_to_pop == stack_args_size) {
            return false;
        }
    } else if callee_will_pop && stack_args_size > 0 {
        return false;
    }

    true
}

fn results_compatible(query: &TailCallQuery, cfg: &TargetConfig) -> bool {
    let bump = Bump::new();
    let mut callee = LocationAssigner::new(&bump, cfg.convention(query.callee_conv));
    if callee.assign_returns(query.callee_rets).is_err() {
        return false;
    }
    let mut caller = LocationAssigner::new(&bump, cfg.convention(query.caller_conv));
    if caller.assign_returns(query.caller_rets).is_err() {
        return false;
    }
    let locs = |a: &LocationAssigner| -> Vec<_> {
        a.assignments().iter().map(|x| x.loc).collect()
    };
    locs(&callee) == locs(&caller)
}

/// An outgoing stack argument matches when its value was loaded from an
/// immutable fixed caller slot at exactly the offset the callee expects,
/// with the same size and extension state.
fn matching_stack_slot(
    arg: &CallArg,
    assignment: &CCAssignment,
    slot_size: u32,
    frame: &FrameInfo,
) -> bool {
    let Some(index) = arg.from_frame else {
        return false;
    };
    if !frame.is_fixed(index) {
        return false;
    }
    let object = frame.object(index);
    let expected =
        assignment.stack_offset().unwrap() + slot_value_offset(assignment, slot_size);
    object.immutable
        && object.offset == expected as i32
        && object.size == assignment.size
        && object.ext == assignment.ext
}
