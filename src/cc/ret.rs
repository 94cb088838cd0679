// Return lowering. Return values only ever travel in registers; a value the
// rule table cannot place is a convention error, not a stack spill. When the
// function received a hidden struct-return pointer, each return additionally
// copies the pointer captured at entry into D0. That copy must read the
// entry-time virtual register, never a value threaded through the updated
// chain of the return's own register copies, or the copies form a dependency
// cycle.

//! Return lowering.

use bumpalo::Bump;

use crate::cc::assigner::{ArgSpec, LocationAssigner};
use crate::core::error::CompileResult;
use crate::core::func_info::MachineFunctionInfo;
use crate::core::registers::{regs, PhysReg, VReg};
use crate::target::{CallConv, TargetConfig};

/// One value being returned.
#[derive(Debug, Clone, Copy)]
pub struct ReturnValue {
    pub spec: ArgSpec,
    pub value: VReg,
}

/// The register copies a return point must perform, in order, plus the
/// cleanup byte count the return instruction carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnLowering {
    pub bytes_to_pop: u32,
    pub reg_copies: Vec<(PhysReg, VReg)>,
}

pub fn lower_return(
    rets: &[ReturnValue],
    conv: CallConv,
    cfg: &TargetConfig,
    info: &MachineFunctionInfo,
) -> CompileResult<ReturnLowering> {
    let rules = cfg.convention(conv);
    let bump = Bump::new();
    let mut assigner = LocationAssigner::new(&bump, rules);
    let specs: Vec<ArgSpec> = rets.iter().map(|r| r.spec).collect();
    assigner.assign_returns(&specs)?;

    let mut reg_copies = Vec::with_capacity(rets.len() + 1);
    for (ret, assignment) in rets.iter().zip(assigner.assignments()) {
        // assign_returns only ever produces register locations.
        let reg = assignment.reg().unwrap();
        reg_copies.push((reg, ret.value));
    }

    if rules.copies_sret_on_return {
        if let Some(sret) = info.sret_return_vreg {
            reg_copies.push((regs::D0, sret));
        }
    }

    Ok(ReturnLowering {
        bytes_to_pop: info.bytes_to_pop_on_return,
        reg_copies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::node::ValueType;

    #[test]
    fn test_int_return_in_d0() {
        let cfg = TargetConfig::mc68000();
        let info = MachineFunctionInfo::new();
        let rets = [ReturnValue {
            spec: ArgSpec::new(ValueType::I32),
            value: VReg(7),
        }];
        let lowering = lower_return(&rets, CallConv::C, &cfg, &info).unwrap();
        assert_eq!(lowering.reg_copies, vec![(regs::D0, VReg(7))]);
        assert_eq!(lowering.bytes_to_pop, 0);
    }

    #[test]
    fn test_sret_copy_added_after_results() {
        let cfg = TargetConfig::mc68000();
        let mut info = MachineFunctionInfo::new();
        info.sret_return_vreg = Some(VReg(3));
        info.bytes_to_pop_on_return = 4;
        let rets = [ReturnValue {
            spec: ArgSpec::new(ValueType::Ptr),
            value: VReg(9),
        }];
        let lowering = lower_return(&rets, CallConv::C, &cfg, &info).unwrap();
        // The pointer result goes to A0, then the sret copy to D0 reads the
        // vreg captured at entry.
        assert_eq!(
            lowering.reg_copies,
            vec![(regs::A0, VReg(9)), (regs::D0, VReg(3))]
        );
        assert_eq!(lowering.bytes_to_pop, 4);
    }

    #[test]
    fn test_void_return_with_sret_only() {
        let cfg = TargetConfig::mc68000();
        let mut info = MachineFunctionInfo::new();
        info.sret_return_vreg = Some(VReg(0));
        let lowering = lower_return(&[], CallConv::C, &cfg, &info).unwrap();
        assert_eq!(lowering.reg_copies, vec![(regs::D0, VReg(0))]);
    }
}
