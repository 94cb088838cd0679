// Post-allocation pseudo expansion. Walks every block once; the index after
// the current instruction is snapshotted before any edit, and the splice
// helpers return the equivalent resume position, so replacement sequences
// are never rescanned. Every expansion copies the pseudo's implicit operand
// list onto the instruction that takes over its role, so liveness recorded
// on the pseudo survives.

//! Expansion of pseudo instructions into concrete sequences.

use crate::core::error::{CompileError, CompileResult};
use crate::core::registers::regs;
use crate::machine::block::{MachineBlock, MachineFunction};
use crate::machine::inst::{MachineInst, MemRef, Opcode, Operand, Width};
use crate::machine::stack_adjust::{emit_sp_adjustment, merge_sp_adjustments};
use crate::target::TargetConfig;

pub fn run(func: &mut MachineFunction, cfg: &TargetConfig) -> CompileResult<bool> {
    let tc_delta = func.info.tc_return_addr_delta();
    let mut modified = false;
    for block in &mut func.blocks {
        let mut i = 0;
        while i < block.len() {
            match expand_at(block, i, cfg, tc_delta)? {
                Some(next) => {
                    modified = true;
                    i = next;
                }
                None => i += 1,
            }
        }
    }
    if modified {
        log::debug!("expanded pseudos in {}", func.name);
    }
    Ok(modified)
}

/// Expand the instruction at `at` if it is a pseudo this pass handles.
/// Returns the resume index on expansion.
fn expand_at(
    block: &mut MachineBlock,
    at: usize,
    cfg: &TargetConfig,
    tc_delta: i32,
) -> CompileResult<Option<usize>> {
    let inst = block.insts[at].clone();
    let next = match inst.opcode {
        Opcode::MovXPseudo { from, .. } => {
            // Only the low part carries a value; upper bits stay undefined.
            let mov = MachineInst::new(Opcode::Move { width: from }, inst.operands.clone())
                .with_implicit(inst.implicit.clone());
            block.replace_at(at, vec![mov])
        }
        Opcode::MovSXPseudo { from, to, .. } => {
            let dst = inst.operands[0].clone();
            let mut seq = vec![MachineInst::new(
                Opcode::Move { width: from },
                inst.operands.clone(),
            )
            .with_implicit(inst.implicit.clone())];
            seq.extend(sign_extend_seq(from, to, &dst));
            block.replace_at(at, seq)
        }
        Opcode::MovZXPseudo { from, to, .. } => {
            let dst = inst.operands[0].clone();
            let mask = match from {
                Width::Byte => 0xff,
                Width::Word => 0xffff,
                Width::Long => unreachable!("zero extension from a full word"),
            };
            let seq = vec![
                MachineInst::new(Opcode::Move { width: from }, inst.operands.clone())
                    .with_implicit(inst.implicit.clone()),
                MachineInst::new(Opcode::AndImm { width: to }, vec![dst, Operand::Imm(mask)]),
            ];
            block.replace_at(at, seq)
        }
        Opcode::MoveToCcrPseudo => {
            let mov = MachineInst::new(Opcode::MoveToCcr, inst.operands.clone())
                .with_implicit(inst.implicit.clone());
            block.replace_at(at, vec![mov])
        }
        Opcode::MoveFromCcrPseudo => {
            let mov = MachineInst::new(Opcode::MoveFromCcr, inst.operands.clone())
                .with_implicit(inst.implicit.clone());
            block.replace_at(at, vec![mov])
        }
        // MOVEM transfers registers in full words regardless of the
        // declared width of the pseudo.
        Opcode::MovemRMPseudo { .. } => {
            let movem = MachineInst::new(Opcode::MovemRM { width: Width::Long }, inst.operands.clone())
                .with_implicit(inst.implicit.clone());
            block.replace_at(at, vec![movem])
        }
        Opcode::MovemMRPseudo { .. } => {
            let movem = MachineInst::new(Opcode::MovemMR { width: Width::Long }, inst.operands.clone())
                .with_implicit(inst.implicit.clone());
            block.replace_at(at, vec![movem])
        }
        Opcode::TcReturnSym | Opcode::TcReturnReg => {
            expand_tc_return(block, at, &inst, cfg, tc_delta)
        }
        Opcode::RetPseudo => expand_ret(block, at, &inst, cfg)?,
        Opcode::SegAlloca => {
            return Err(CompileError::SegmentedStackUnsupported);
        }
        _ => return Ok(None),
    };
    Ok(Some(next))
}

fn sign_extend_seq(from: Width, to: Width, dst: &Operand) -> Vec<MachineInst> {
    let mut seq = Vec::new();
    if from == Width::Byte {
        seq.push(MachineInst::new(
            Opcode::Ext {
                from: Width::Byte,
                to: Width::Word,
            },
            vec![dst.clone()],
        ));
    }
    if to == Width::Long {
        seq.push(MachineInst::new(
            Opcode::Ext {
                from: Width::Word,
                to: Width::Long,
            },
            vec![dst.clone()],
        ));
    }
    seq
}

/// A tail call pseudo becomes an SP reconciliation followed by the actual
/// jump. The reconciliation merges with an SP bump the epilogue may have
/// just emitted.
fn expand_tc_return(
    block: &mut MachineBlock,
    at: usize,
    inst: &MachineInst,
    cfg: &TargetConfig,
    tc_delta: i32,
) -> usize {
    let stack_adjust = inst.operands[1]
        .as_imm()
        .expect("tail call pseudo carries an immediate adjustment") as i32;
    assert!(tc_delta <= 0, "tail call delta should never be positive");
    let mut offset = stack_adjust - tc_delta;
    assert!(offset >= 0, "tail call offset should never be negative");

    let mut pos = at;
    if offset != 0 {
        let before = block.len();
        offset += merge_sp_adjustments(block, pos, cfg);
        // Merging removes the instruction right before the pseudo.
        pos -= before - block.len();
        pos = emit_sp_adjustment(block, pos, offset, cfg);
    }

    let jump_opcode = if inst.opcode == Opcode::TcReturnSym {
        Opcode::TailJmpSym
    } else {
        Opcode::TailJmpReg
    };
    let jump = MachineInst::new(jump_opcode, vec![inst.operands[0].clone()])
        .with_implicit(inst.implicit.clone());
    block.replace_at(pos, vec![jump])
}

/// A return with cleanup pops the argument area below the return address.
/// Without a pop-and-return instruction this takes juggling the return
/// address through a scratch address register.
fn expand_ret(
    block: &mut MachineBlock,
    at: usize,
    inst: &MachineInst,
    cfg: &TargetConfig,
) -> CompileResult<usize> {
    let cleanup = inst.operands[0]
        .as_imm()
        .expect("return pseudo carries an immediate cleanup count");
    let implicit = inst.implicit.clone();

    if cleanup == 0 {
        let rts = MachineInst::new(Opcode::Rts, vec![]).with_implicit(implicit);
        return Ok(block.replace_at(at, vec![rts]));
    }
    if cleanup < 0 || cleanup > u16::MAX as i64 {
        return Err(CompileError::CleanupTooLarge { bytes: cleanup });
    }

    let sp = cfg.stack_reg;
    // Return address to a scratch register, bump SP over the argument
    // area, put the return address back on top, return.
    let scratch = regs::A1;
    let mut pos = block.replace_at(
        at,
        vec![MachineInst::new(
            Opcode::Move { width: Width::Long },
            vec![Operand::Reg(scratch), Operand::Mem(MemRef::new(sp, 0))],
        )],
    );
    pos = emit_sp_adjustment(block, pos, cleanup as i32, cfg);
    let rest = vec![
        MachineInst::new(
            Opcode::Move { width: Width::Long },
            vec![Operand::Mem(MemRef::new(sp, 0)), Operand::Reg(scratch)],
        ),
        MachineInst::new(Opcode::Rts, vec![]).with_implicit(implicit),
    ];
    Ok(block.insert_at(pos, rest))
}
