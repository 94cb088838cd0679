// Machine-level passes that run after register allocation. Expansion must
// run before collapsing: frame lowering's single-register MOVEM pseudos
// only become foldable once they are concrete.

//! Post-register-allocation machine passes.

pub mod collapse;
pub mod expand;

use crate::core::error::CompileResult;
use crate::machine::block::MachineFunction;
use crate::target::TargetConfig;

/// Runs the post-allocation pipeline over one function. Returns whether
/// anything changed.
pub fn run_post_ra_passes(func: &mut MachineFunction, cfg: &TargetConfig) -> CompileResult<bool> {
    let mut modified = expand::run(func, cfg)?;
    modified |= collapse::run(func, cfg);
    Ok(modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::inst::{MachineInst, MemRef, Opcode, Operand, Width};

    #[test]
    fn test_pipeline_expands_then_collapses() {
        let cfg = TargetConfig::mc68000();
        let sp = cfg.stack_reg;
        let mut func = MachineFunction::new("f");
        let b = func.add_block();
        for i in 0..4 {
            func.block_mut(b).push(MachineInst::new(
                Opcode::MovemRMPseudo { width: Width::Long },
                vec![
                    Operand::Mem(MemRef::new(sp, 4 * i)),
                    Operand::Imm(1 << i),
                ],
            ));
        }
        func.block_mut(b)
            .push(MachineInst::new(Opcode::RetPseudo, vec![Operand::Imm(0)]));
        assert!(run_post_ra_passes(&mut func, &cfg).unwrap());
        let insts = &func.blocks[0].insts;
        assert_eq!(insts.len(), 2);
        assert_eq!(insts[0].opcode, Opcode::MovemRM { width: Width::Long });
        assert_eq!(insts[0].operands[1], Operand::Imm(0x0f));
        assert_eq!(insts[1].opcode, Opcode::Rts);
    }
}
