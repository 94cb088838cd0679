// Stack pointer adjustment service. Pseudo expansion and the call lowering
// plan both funnel SP edits through here so that adjacent adjustments can be
// merged and the emitted form stays in one place. Sign convention: a
// positive delta moves SP up (deallocation), a negative delta moves it down
// (allocation), matching the sign of the immediate on the emitted add.

//! Stack pointer adjustment emission and merging.

use crate::machine::block::MachineBlock;
use crate::machine::inst::{MachineInst, Opcode, Operand, Width};
use crate::target::TargetConfig;

/// Inserts an SP adjustment of `delta` bytes before `at`. Returns the index
/// past the inserted instruction, or `at` unchanged when `delta` is zero.
pub fn emit_sp_adjustment(
    block: &mut MachineBlock,
    at: usize,
    delta: i32,
    cfg: &TargetConfig,
) -> usize {
    if delta == 0 {
        return at;
    }
    let sp = cfg.stack_reg;
    let opcode = if delta > 0 {
        Opcode::Add { width: Width::Long }
    } else {
        Opcode::Sub { width: Width::Long }
    };
    let inst = MachineInst::new(
        opcode,
        vec![Operand::Reg(sp), Operand::Imm(delta.unsigned_abs() as i64)],
    );
    log::trace!("sp adjustment {delta:+} at {at}");
    block.insert_at(at, vec![inst])
}

/// If the instruction immediately before `at` is an SP adjustment, removes
/// it and returns its signed delta; otherwise returns zero and leaves the
/// block untouched.
pub fn merge_sp_adjustments(block: &mut MachineBlock, at: usize, cfg: &TargetConfig) -> i32 {
    if at == 0 {
        return 0;
    }
    let prev = &block.insts[at - 1];
    let sign = match prev.opcode {
        Opcode::Add { width: Width::Long } => 1,
        Opcode::Sub { width: Width::Long } => -1,
        _ => return 0,
    };
    if prev.operands.first().and_then(Operand::as_reg) != Some(cfg.stack_reg) {
        return 0;
    }
    let Some(amount) = prev.operands.get(1).and_then(Operand::as_imm) else {
        return 0;
    };
    block.remove_at(at - 1);
    let delta = sign * amount as i32;
    log::trace!("merged sp adjustment {delta:+}");
    delta
}
