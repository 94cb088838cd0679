// Function entry lowering. Walks the incoming argument list through the
// location assigner, materializes register arguments as live-in copies into
// fresh virtual registers and stack arguments as fixed frame objects at
// their big-endian-corrected offsets, and fills in the per-function
// side-table: argument area size, callee-pop byte count, the struct-return
// vreg, the vararg area index, and forwarded registers for musttail vararg
// functions.

//! Formal argument lowering.

use bumpalo::Bump;

use crate::cc::assigner::{
    aligned_argument_stack_size, slot_value_offset, ArgSpec, LocationAssigner,
};
use crate::cc::is_callee_pop;
use crate::core::error::CompileResult;
use crate::core::frame::{FrameIndex, FrameInfo};
use crate::core::func_info::MachineFunctionInfo;
use crate::core::registers::{PhysReg, RegBitSet, VReg, VRegAlloc};
use crate::target::{CallConv, TargetConfig};

/// Function-level properties relevant to entry lowering.
#[derive(Debug, Clone, Copy)]
pub struct FunctionAbi {
    pub conv: CallConv,
    pub is_varargs: bool,
    /// The body contains a va_start.
    pub has_va_start: bool,
    /// A vararg function containing a musttail call.
    pub has_musttail_in_varargs: bool,
}

impl FunctionAbi {
    pub fn new(conv: CallConv) -> Self {
        Self {
            conv,
            is_varargs: false,
            has_va_start: false,
            has_musttail_in_varargs: false,
        }
    }
}

/// Where one incoming argument materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingArg {
    /// Live-in register copied into a virtual register at entry.
    Reg { reg: PhysReg, vreg: VReg },
    /// Fixed frame object; `index` already accounts for the sub-word
    /// byte-order correction.
    Stack { index: FrameIndex, size: u32 },
}

pub fn lower_formal_arguments(
    args: &[ArgSpec],
    abi: &FunctionAbi,
    cfg: &TargetConfig,
    frame: &mut FrameInfo,
    info: &mut MachineFunctionInfo,
    vregs: &mut VRegAlloc,
) -> CompileResult<Vec<IncomingArg>> {
    let rules = cfg.convention(abi.conv);
    let bump = Bump::new();
    let mut assigner = LocationAssigner::new(&bump, rules);
    assigner.assign_args(args);

    let mut incoming = Vec::with_capacity(args.len());
    let mut used_arg_regs = RegBitSet::new();
    for (spec, assignment) in args.iter().zip(assigner.assignments()) {
        match assignment.reg() {
            Some(reg) => {
                used_arg_regs.set(reg);
                incoming.push(IncomingArg::Reg {
                    reg,
                    vreg: vregs.alloc(),
                });
            }
            None => {
                let slot = assignment.stack_offset().unwrap();
                let offset = slot + slot_value_offset(assignment, rules.slot_size);
                let immutable = spec.byval.is_none();
                let index = frame.create_fixed_object(assignment.size, offset as i32, immutable);
                frame.set_object_ext(index, assignment.ext);
                incoming.push(IncomingArg::Stack {
                    index,
                    size: assignment.size,
                });
            }
        }
    }

    // The ABI returns the struct pointer in D0, so the incoming sret
    // argument is saved to a virtual register once, at entry, where every
    // return point can reach its original value.
    for (spec, arg) in args.iter().zip(&incoming) {
        if !spec.sret {
            continue;
        }
        if info.sret_return_vreg.is_none() {
            let vreg = match arg {
                IncomingArg::Reg { vreg, .. } => *vreg,
                IncomingArg::Stack { .. } => vregs.alloc(),
            };
            info.sret_return_vreg = Some(vreg);
            log::debug!("struct-return pointer saved in {vreg:?}");
        }
        break;
    }

    let mut stack_size = assigner.stack_size();
    if cfg.guaranteed_tail_call_opt && cfg.can_guarantee_tco(abi.conv) {
        stack_size = aligned_argument_stack_size(stack_size, cfg.stack_alignment, cfg.slot_size);
    }

    if abi.has_va_start {
        info.varargs_frame_index = Some(frame.create_fixed_object(1, stack_size as i32, true));
    }

    if abi.is_varargs && abi.has_musttail_in_varargs {
        // Unused argument registers must be forwarded unchanged to the
        // musttail callee.
        for &reg in rules.int_regs.iter().chain(rules.ptr_regs) {
            if !used_arg_regs.contains(reg) {
                info.forwarded_musttail_regs.push((reg, vregs.alloc()));
            }
        }
    }

    info.bytes_to_pop_on_return = if is_callee_pop(cfg, rules, abi.is_varargs) {
        stack_size
    } else if !cfg.can_guarantee_tco(abi.conv) && is_stack_sret(args) {
        // The return pops the hidden struct pointer.
        cfg.slot_size
    } else {
        0
    };
    info.arg_stack_size = stack_size;

    log::debug!(
        "entry lowering: {} args, {stack_size} stack bytes, callee pops {}",
        args.len(),
        info.bytes_to_pop_on_return
    );
    Ok(incoming)
}

/// True when the function returns a struct through a stack-passed hidden
/// pointer (first argument, not in a register).
pub fn is_stack_sret(args: &[ArgSpec]) -> bool {
    args.first().is_some_and(|a| a.sret && !a.in_reg)
}
