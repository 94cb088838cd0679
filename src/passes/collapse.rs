// MOVEM collapsing. Frame lowering spills and restores callee-saved
// registers one MOVEM per register; this pass folds runs of adjacent
// single-register transfers against the same base into one instruction.
// A run grows only while the direction inferred from the register masks
// matches the direction of the memory offsets and the offsets stay
// contiguous at word-multiple strides. The merged instruction is placed
// at the lowest offset of the run, which is where a multi-register
// transfer starts.

//! Folding of adjacent single-register MOVEM transfers.

use crate::machine::block::{MachineBlock, MachineFunction};
use crate::machine::inst::{MachineInst, MemRef, Opcode, Operand, Width};
use crate::target::TargetConfig;

pub fn run(func: &mut MachineFunction, cfg: &TargetConfig) -> bool {
    let mut modified = false;
    for block in &mut func.blocks {
        modified |= collapse_block(block, cfg);
    }
    if modified {
        log::debug!("collapsed movem runs in {}", func.name);
    }
    modified
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Ascending,
    Descending,
    Intermixed,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Load,
    Store,
}

/// An in-progress run of adjacent single-register transfers.
struct MovemRun {
    begin: usize,
    end: usize,
    base: MemRef,
    kind: Kind,
    start: i32,
    stop: i32,
    mask: u16,
}

impl MovemRun {
    fn open(at: usize, base: MemRef, kind: Kind, mask: u16) -> Self {
        Self {
            begin: at,
            end: at + 1,
            base,
            kind,
            start: base.disp,
            stop: base.disp,
            mask,
        }
    }

    fn members(&self) -> usize {
        self.end - self.begin
    }

    /// Direction implied by appending a register with `mask` to the run.
    /// The mask value grows with the register index, so a larger mask
    /// means a later register in transfer order.
    fn classify(&self, mask: u16) -> Direction {
        if self.mask == 0 || self.mask < mask {
            Direction::Ascending
        } else if self.mask > mask {
            Direction::Descending
        } else {
            Direction::Intermixed
        }
    }

    /// Tries to append a transfer at offset `offset` with register mask
    /// `mask`. The offset must extend the contiguous range on the side the
    /// mask direction dictates.
    fn append(&mut self, at: usize, offset: i32, mask: u16) -> bool {
        // An exactly repeated mask classifies as intermixed and ends the
        // run; only a partial overlap between distinct masks is a bug.
        let accepted = match self.classify(mask) {
            Direction::Intermixed => false,
            Direction::Descending if offset == self.start - Width::Long.bytes() as i32 => {
                self.start = offset;
                true
            }
            Direction::Ascending if offset == self.stop + Width::Long.bytes() as i32 => {
                self.stop = offset;
                true
            }
            _ => false,
        };
        if accepted {
            assert_eq!(self.mask & mask, 0, "partially overlapping register masks");
            self.mask |= mask;
            self.end = at + 1;
        }
        accepted
    }

    /// Replaces the run with one merged transfer when it has more than one
    /// member. Returns the resume index.
    fn finish(self, block: &mut MachineBlock) -> (usize, bool) {
        if self.members() < 2 {
            return (self.end, false);
        }
        let mem = Operand::Mem(MemRef::new(self.base.base, self.start));
        let mask = Operand::Imm(self.mask as i64);
        let merged = match self.kind {
            Kind::Store => MachineInst::new(Opcode::MovemRM { width: Width::Long }, vec![mem, mask]),
            Kind::Load => MachineInst::new(Opcode::MovemMR { width: Width::Long }, vec![mask, mem]),
        };
        log::trace!(
            "collapsing {} movem transfers into mask {:#06x} at {:+}",
            self.members(),
            self.mask,
            self.start
        );
        let at = block.remove_range(self.begin, self.end);
        (block.insert_at(at, vec![merged]), true)
    }
}

/// Splits a single-register MOVEM into its memory operand and mask, or
/// returns None for any other instruction.
fn as_single_movem(inst: &MachineInst) -> Option<(MemRef, Kind, u16)> {
    let (kind, mem_idx, mask_idx) = match inst.opcode {
        Opcode::MovemRM { .. } => (Kind::Store, 0, 1),
        Opcode::MovemMR { .. } => (Kind::Load, 1, 0),
        _ => return None,
    };
    let mem = inst.operands.get(mem_idx)?.as_mem()?;
    let mask = inst.operands.get(mask_idx)?.as_imm()? as u16;
    if mask.count_ones() != 1 {
        return None;
    }
    Some((mem, kind, mask))
}

fn collapse_block(block: &mut MachineBlock, cfg: &TargetConfig) -> bool {
    let mut modified = false;
    let mut run: Option<MovemRun> = None;
    let mut i = 0;
    while i < block.len() {
        let candidate = as_single_movem(&block.insts[i]);
        if let Some(r) = run.as_mut() {
            if let Some((mem, kind, mask)) = candidate {
                if kind == r.kind && mem.base == r.base.base && r.append(i, mem.disp, mask) {
                    i += 1;
                    continue;
                }
            }
            // The run ended, either on a foreign instruction or on a
            // transfer that cannot join it. Flush and rescan from the
            // resume point so a joinable transfer can open a new run.
            let (next, changed) = run.take().unwrap().finish(block);
            modified |= changed;
            i = next;
            continue;
        }
        if let Some((mem, kind, mask)) = candidate {
            // Only frame pointers make sense as a collapse base; a
            // transfer through an arbitrary address register stays alone.
            if mem.base == cfg.stack_reg || mem.base == cfg.frame_reg || mem.base == cfg.base_reg {
                run = Some(MovemRun::open(i, mem, kind, mask));
            }
        }
        i += 1;
    }
    if let Some(r) = run {
        let (_, changed) = r.finish(block);
        modified |= changed;
    }
    modified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registers::regs;

    fn store(base: crate::core::registers::PhysReg, disp: i32, mask: u16) -> MachineInst {
        MachineInst::new(
            Opcode::MovemRM { width: Width::Long },
            vec![
                Operand::Mem(MemRef::new(base, disp)),
                Operand::Imm(mask as i64),
            ],
        )
    }

    fn load(base: crate::core::registers::PhysReg, disp: i32, mask: u16) -> MachineInst {
        MachineInst::new(
            Opcode::MovemMR { width: Width::Long },
            vec![
                Operand::Imm(mask as i64),
                Operand::Mem(MemRef::new(base, disp)),
            ],
        )
    }

    fn run_on(insts: Vec<MachineInst>, cfg: &TargetConfig) -> (bool, Vec<MachineInst>) {
        let mut func = MachineFunction::new("f");
        let b = func.add_block();
        func.block_mut(b).insts = insts;
        let changed = run(&mut func, cfg);
        (changed, func.blocks[0].insts.clone())
    }

    #[test]
    fn test_descending_spill_sequence_collapses() {
        // A prologue spilling d0..d7 downward from the frame pointer.
        let cfg = TargetConfig::mc68000();
        let insts: Vec<_> = (0..8)
            .map(|i| store(regs::A6, -4 * (i as i32 + 1), 0x80 >> i))
            .collect();
        let (changed, out) = run_on(insts, &cfg);
        assert!(changed);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].opcode, Opcode::MovemRM { width: Width::Long });
        assert_eq!(out[0].operands[0], Operand::Mem(MemRef::new(regs::A6, -32)));
        assert_eq!(out[0].operands[1], Operand::Imm(0x00ff));
    }

    #[test]
    fn test_ascending_restore_sequence_collapses() {
        let cfg = TargetConfig::mc68000();
        let insts: Vec<_> = (0..4).map(|i| load(regs::SP, 4 * i, 1 << i)).collect();
        let (changed, out) = run_on(insts, &cfg);
        assert!(changed);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].opcode, Opcode::MovemMR { width: Width::Long });
        assert_eq!(out[0].operands[0], Operand::Imm(0x000f));
        assert_eq!(out[0].operands[1], Operand::Mem(MemRef::new(regs::SP, 0)));
    }

    #[test]
    fn test_gap_splits_the_run() {
        let cfg = TargetConfig::mc68000();
        let insts = vec![
            store(regs::SP, 0, 0x01),
            store(regs::SP, 4, 0x02),
            store(regs::SP, 12, 0x04), // hole at 8
            store(regs::SP, 16, 0x08),
        ];
        let (changed, out) = run_on(insts, &cfg);
        assert!(changed);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].operands[1], Operand::Imm(0x03));
        assert_eq!(out[1].operands[1], Operand::Imm(0x0c));
        assert_eq!(out[1].operands[0], Operand::Mem(MemRef::new(regs::SP, 12)));
    }

    #[test]
    fn test_single_transfer_left_alone() {
        let cfg = TargetConfig::mc68000();
        let insts = vec![store(regs::SP, -4, 0x04)];
        let (changed, out) = run_on(insts.clone(), &cfg);
        assert!(!changed);
        assert_eq!(out, insts);
    }

    #[test]
    fn test_non_frame_base_is_not_collapsed() {
        let cfg = TargetConfig::mc68000();
        let insts = vec![store(regs::A0, 0, 0x01), store(regs::A0, 4, 0x02)];
        let (changed, out) = run_on(insts.clone(), &cfg);
        assert!(!changed);
        assert_eq!(out, insts);
    }

    #[test]
    fn test_load_store_boundary_flushes() {
        let cfg = TargetConfig::mc68000();
        let insts = vec![
            store(regs::SP, 0, 0x01),
            store(regs::SP, 4, 0x02),
            load(regs::SP, 8, 0x04),
            load(regs::SP, 12, 0x08),
        ];
        let (changed, out) = run_on(insts, &cfg);
        assert!(changed);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].opcode, Opcode::MovemRM { width: Width::Long });
        assert_eq!(out[1].opcode, Opcode::MovemMR { width: Width::Long });
        assert_eq!(out[1].operands[0], Operand::Imm(0x0c));
    }

    #[test]
    fn test_foreign_instruction_flushes_and_rescans() {
        let cfg = TargetConfig::mc68000();
        let insts = vec![
            store(regs::SP, 0, 0x01),
            store(regs::SP, 4, 0x02),
            MachineInst::new(Opcode::Rts, vec![]),
        ];
        let (changed, out) = run_on(insts, &cfg);
        assert!(changed);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].operands[1], Operand::Imm(0x03));
        assert_eq!(out[1].opcode, Opcode::Rts);
    }

    #[test]
    fn test_collapse_is_idempotent() {
        let cfg = TargetConfig::mc68000();
        let insts: Vec<_> = (0..8)
            .map(|i| store(regs::A6, -4 * (i as i32 + 1), 0x80 >> i))
            .collect();
        let mut func = MachineFunction::new("f");
        let b = func.add_block();
        func.block_mut(b).insts = insts;
        assert!(run(&mut func, &cfg));
        let once = func.blocks[0].insts.clone();
        assert!(!run(&mut func, &cfg));
        assert_eq!(func.blocks[0].insts, once);
    }

    #[test]
    fn test_direction_conflict_splits_run() {
        // The third store's mask points downward while the run grows
        // upward, so it cannot join and opens a run of its own.
        let cfg = TargetConfig::mc68000();
        let insts = vec![
            store(regs::SP, 0, 0x04),
            store(regs::SP, 4, 0x08),
            store(regs::SP, 8, 0x02),
        ];
        let (changed, out) = run_on(insts, &cfg);
        assert!(changed);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].operands[1], Operand::Imm(0x0c));
        assert_eq!(out[1].operands[1], Operand::Imm(0x02));
    }

    #[test]
    fn test_repeated_register_ends_the_run() {
        // The same register stored to two adjacent slots. The repeat ends
        // the run instead of joining it, and both stores stay as they are.
        let cfg = TargetConfig::mc68000();
        let insts = vec![store(regs::SP, 0, 0x01), store(regs::SP, 4, 0x01)];
        let (changed, out) = run_on(insts.clone(), &cfg);
        assert!(!changed);
        assert_eq!(out, insts);
    }
}
