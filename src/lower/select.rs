// Conditional move insertion. A CMOV pseudo selects between two virtual
// registers on a CCR condition; emitting one means building the diamond
// control flow around it. Two grouped shapes are handled beyond the single
// pseudo. A run of CMOVs on the same or the opposite condition shares one
// diamond, with a rename table so later merge nodes reference the original
// incoming values rather than earlier merge results, which would not dominate
// the false edge. A cascaded pair, where the second pseudo consumes the
// first's result under some condition and that use is the last one, becomes
// two successive branches into a shared join with a three-way merge.

//! Custom insertion of conditional-move pseudos.

use hashbrown::HashMap;

use crate::core::registers::VReg;
use crate::lower::condcode::CondCode;
use crate::machine::block::MachineFunction;
use crate::machine::inst::{BlockId, ImplicitOp, MachineInst, Opcode, Operand, Width};

fn cmov_parts(inst: &MachineInst) -> (CondCode, Width, VReg, VReg, VReg) {
    let Opcode::CMov { cc, width } = inst.opcode else {
        panic!("not a conditional move: {:?}", inst.opcode);
    };
    (
        cc,
        width,
        vreg_operand(inst, 0),
        vreg_operand(inst, 1),
        vreg_operand(inst, 2),
    )
}

fn vreg_operand(inst: &MachineInst, idx: usize) -> VReg {
    match inst.operands[idx] {
        Operand::VReg(v) => v,
        ref other => panic!("expected virtual register operand, got {other:?}"),
    }
}

/// Whether the condition register is still needed after the select run,
/// given the rest of the block and the original successor list.
fn ccr_live_after(func: &MachineFunction, tail: &[MachineInst], succs: &[BlockId]) -> bool {
    for inst in tail {
        if inst.uses_ccr() {
            return true;
        }
        if inst.defines_ccr() {
            return false;
        }
    }
    succs.iter().any(|s| func.block(*s).ccr_live_in)
}

/// Replaces the CMOV pseudo at `block_id`/`at` (plus any run or cascade it
/// heads) with the diamond control flow. Returns the join block, which now
/// holds the remainder of the original block.
pub fn emit_lowered_select(func: &mut MachineFunction, block_id: BlockId, at: usize) -> BlockId {
    let first = func.block(block_id).insts[at].clone();
    let (cc, width, first_dst, _, first_true) = cmov_parts(&first);
    let opp = cc.opposite();

    // Collect a run of CMOVs on the same condition setting.
    let mut last = at;
    {
        let insts = &func.block(block_id).insts;
        let mut i = at + 1;
        while i < insts.len() {
            match insts[i].opcode {
                Opcode::CMov { cc: c, .. } if c == cc || c == opp => {
                    last = i;
                    i += 1;
                }
                _ => break,
            }
        }
    }

    // A cascaded pair is only recognized when no run was found.
    let mut cascaded: Option<MachineInst> = None;
    if last == at {
        let insts = &func.block(block_id).insts;
        if let Some(next) = insts.get(at + 1) {
            if let Opcode::CMov { width: w, .. } = next.opcode {
                if w == width
                    && vreg_operand(next, 1) == first_dst
                    && vreg_operand(next, 2) == first_true
                    && next.kills_vreg(first_dst)
                {
                    cascaded = Some(next.clone());
                }
            }
        }
    }

    let run: Vec<MachineInst> = func.block(block_id).insts[at..=last].to_vec();
    let after_run = last + 1 + cascaded.is_some() as usize;
    let tail: Vec<MachineInst> = func.block(block_id).insts[after_run..].to_vec();

    let last_user = cascaded.as_ref().unwrap_or_else(|| {
        run.last().unwrap()
    });
    let old_succs = func.block(block_id).successors.clone();
    let ccr_live = !last_user.kills_ccr() && ccr_live_after(func, &tail, &old_succs);

    log::debug!(
        "lowering select run of {} ({}) in block {block_id:?}",
        run.len(),
        if cascaded.is_some() { "cascaded" } else { "plain" },
    );

    func.block_mut(block_id).insts.truncate(at);
    func.block_mut(block_id).successors.clear();

    let jcc1 = cascaded.as_ref().map(|_| func.add_block());
    let copy0 = func.add_block();
    let sink = func.add_block();

    if ccr_live {
        func.block_mut(copy0).ccr_live_in = true;
        func.block_mut(sink).ccr_live_in = true;
    }

    // Branch structure. The first branch always targets the join; its
    // fallthrough is either the second branch block or the false block.
    if let Some(j) = jcc1 {
        // Both branches read the same CCR value.
        func.block_mut(j).ccr_live_in = true;
        func.block_mut(block_id).add_successor(j);
        func.block_mut(j).add_successor(copy0);
        func.block_mut(j).add_successor(sink);
    } else {
        func.block_mut(block_id).add_successor(copy0);
    }
    func.block_mut(block_id).add_successor(sink);
    func.block_mut(copy0).add_successor(sink);

    func.block_mut(block_id).push(
        MachineInst::new(Opcode::Bcc { cc }, vec![Operand::Block(sink)])
            .with_implicit(vec![ImplicitOp::UseCcr]),
    );
    if let (Some(j), Some(casc)) = (jcc1, cascaded.as_ref()) {
        let (cc2, ..) = cmov_parts(casc);
        func.block_mut(j).push(
            MachineInst::new(Opcode::Bcc { cc: cc2 }, vec![Operand::Block(sink)])
                .with_implicit(vec![ImplicitOp::UseCcr]),
        );
    }

    // Merge nodes at the join, one per select, renaming operands that were
    // produced by an earlier select of the same run.
    let mut rewrite: HashMap<VReg, (VReg, VReg)> = HashMap::new();
    let mut merged = Vec::with_capacity(run.len());
    for inst in &run {
        let (this_cc, _, dst, mut false_val, mut true_val) = cmov_parts(inst);
        if this_cc == opp {
            std::mem::swap(&mut false_val, &mut true_val);
        }
        if let Some(&(f, _)) = rewrite.get(&false_val) {
            false_val = f;
        }
        if let Some(&(_, t)) = rewrite.get(&true_val) {
            true_val = t;
        }
        merged.push(MachineInst::new(
            Opcode::Phi,
            vec![
                Operand::VReg(dst),
                Operand::VReg(false_val),
                Operand::Block(copy0),
                Operand::VReg(true_val),
                Operand::Block(block_id),
            ],
        ));
        rewrite.insert(dst, (false_val, true_val));
    }

    if let Some(casc) = &cascaded {
        // The second branch contributes the shared true value, and the
        // cascaded destination is a plain copy of the merge result.
        let phi = merged.last_mut().unwrap();
        phi.operands.push(Operand::VReg(first_true));
        phi.operands.push(Operand::Block(jcc1.unwrap()));
        let (_, _, casc_dst, ..) = cmov_parts(casc);
        merged.push(MachineInst::new(
            Opcode::Move { width },
            vec![Operand::VReg(casc_dst), Operand::VReg(first_dst)],
        ));
    }

    let sink_block = func.block_mut(sink);
    sink_block.insts = merged;
    sink_block.insts.extend(tail);
    sink_block.successors = old_succs;

    sink
}
