//! Test tail call lowering end to end.
//!
//! Eligibility, the call plan, and pseudo expansion must agree: a sibling
//! call pushes nothing, a guaranteed tail call records the frame delta that
//! pseudo expansion later reconciles against the epilogue's stack bump.

use m68k_codegen::cc::{
    is_eligible_for_tail_call, lower_call, lower_formal_arguments, ArgSpec, CallArg, CallSite,
    CallTarget, FunctionAbi, IncomingArg, TailCallQuery,
};
use m68k_codegen::core::frame::FrameInfo;
use m68k_codegen::core::func_info::MachineFunctionInfo;
use m68k_codegen::core::registers::{VReg, VRegAlloc};
use m68k_codegen::lower::node::ValueType;
use m68k_codegen::machine::inst::{MachineInst, Opcode, Operand, Width};
use m68k_codegen::machine::MachineFunction;
use m68k_codegen::passes::run_post_ra_passes;
use m68k_codegen::target::{CallConv, TargetConfig};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A caller that forwards its own incoming stack argument unchanged.
#[test]
fn test_argument_forwarding_sibcall() {
    init_logging();
    let cfg = TargetConfig::mc68000();
    let abi = FunctionAbi::new(CallConv::C);
    let specs = [ArgSpec::new(ValueType::I32)];
    let mut frame = FrameInfo::new();
    let mut info = MachineFunctionInfo::new();
    let mut vregs = VRegAlloc::new();
    let incoming =
        lower_formal_arguments(&specs, &abi, &cfg, &mut frame, &mut info, &mut vregs).unwrap();
    let IncomingArg::Stack { index, .. } = incoming[0] else {
        panic!("expected a stack argument")
    };

    let args = [CallArg {
        spec: specs[0],
        value: VReg(5),
        from_frame: Some(index),
        from_incoming_reg: None,
    }];
    let query = TailCallQuery {
        callee_conv: CallConv::C,
        caller_conv: CallConv::C,
        is_varargs: false,
        callee_sret: false,
        caller_sret: false,
        callee_is_direct: true,
        args: &args,
        callee_rets: &[],
        caller_rets: &[],
    };
    assert!(is_eligible_for_tail_call(&query, &cfg, &frame, &info));

    let site = CallSite {
        target: CallTarget::Symbol("self_like".into()),
        conv: CallConv::C,
        is_varargs: false,
        args: &args,
        rets: &[],
        no_return: false,
        is_tail_call: true,
    };
    let plan = lower_call(&site, &cfg, &mut frame, &mut info, &mut vregs).unwrap();
    assert!(plan.is_sibcall);
    // The argument already sits in the caller's frame; nothing is pushed.
    assert_eq!(plan.bytes_to_push, 0);
    assert!(frame.has_tail_call);
}

/// A freshly computed stack argument cannot reuse a caller slot, so the
/// call must stay a plain call.
#[test]
fn test_fresh_stack_argument_blocks_sibcall() {
    init_logging();
    let cfg = TargetConfig::mc68000();
    let frame = FrameInfo::new();
    let info = MachineFunctionInfo::new();
    let args = [CallArg {
        spec: ArgSpec::new(ValueType::I32),
        value: VReg(5),
        from_frame: None,
        from_incoming_reg: None,
    }];
    let query = TailCallQuery {
        callee_conv: CallConv::C,
        caller_conv: CallConv::C,
        is_varargs: false,
        callee_sret: false,
        caller_sret: false,
        callee_is_direct: true,
        args: &args,
        callee_rets: &[],
        caller_rets: &[],
    };
    assert!(!is_eligible_for_tail_call(&query, &cfg, &frame, &info));
}

/// Guaranteed tail call on the fast convention: the plan records the frame
/// delta, and expansion folds it into the jump's stack reconciliation.
#[test]
fn test_guaranteed_tail_call_through_expansion() {
    init_logging();
    let mut cfg = TargetConfig::mc68020();
    cfg.guaranteed_tail_call_opt = true;
    let abi = FunctionAbi::new(CallConv::Fast);

    // The caller itself took two stack slots, aligned to 12 for tail calls.
    let caller_args = [ArgSpec::new(ValueType::I32), ArgSpec::new(ValueType::I32)];
    let mut frame = FrameInfo::new();
    let mut info = MachineFunctionInfo::new();
    let mut vregs = VRegAlloc::new();
    lower_formal_arguments(&caller_args, &abi, &cfg, &mut frame, &mut info, &mut vregs).unwrap();
    assert_eq!(info.bytes_to_pop_on_return, 12);

    // The callee needs five slots: 20 bytes, aligned to 20.
    let callee_args: Vec<CallArg> = (0..5)
        .map(|i| CallArg {
            spec: ArgSpec::new(ValueType::I32),
            value: VReg(i),
            from_frame: None,
            from_incoming_reg: None,
        })
        .collect();
    let site = CallSite {
        target: CallTarget::Symbol("bigger".into()),
        conv: CallConv::Fast,
        is_varargs: false,
        args: &callee_args,
        rets: &[],
        no_return: false,
        is_tail_call: true,
    };
    let plan = lower_call(&site, &cfg, &mut frame, &mut info, &mut vregs).unwrap();
    assert!(!plan.is_sibcall);
    // Caller reserved 12, callee needs 20: the frame grows by 8.
    assert_eq!(plan.fp_diff, -8);
    assert_eq!(info.tc_return_addr_delta(), -8);

    // Expansion of the resulting pseudo reconciles against the recorded
    // delta: adjustment 0 - (-8) = 8.
    let mut mf = MachineFunction::new("caller");
    mf.info = info;
    let b = mf.add_block();
    mf.block_mut(b).push(MachineInst::new(
        Opcode::TcReturnSym,
        vec![Operand::Symbol("bigger".into()), Operand::Imm(0)],
    ));
    assert!(run_post_ra_passes(&mut mf, &cfg).unwrap());
    let insts = &mf.blocks[0].insts;
    assert_eq!(insts.len(), 2);
    assert_eq!(insts[0].opcode, Opcode::Add { width: Width::Long });
    assert_eq!(insts[0].operands[1], Operand::Imm(8));
    assert_eq!(insts[1].opcode, Opcode::TailJmpSym);
}

/// A call that grows no larger than the caller's own area keeps the stack
/// untouched at the jump.
#[test]
fn test_matching_area_needs_no_reconciliation() {
    init_logging();
    let mut cfg = TargetConfig::mc68020();
    cfg.guaranteed_tail_call_opt = true;
    let abi = FunctionAbi::new(CallConv::Fast);
    let caller_args = [ArgSpec::new(ValueType::I32), ArgSpec::new(ValueType::I32)];
    let mut frame = FrameInfo::new();
    let mut info = MachineFunctionInfo::new();
    let mut vregs = VRegAlloc::new();
    lower_formal_arguments(&caller_args, &abi, &cfg, &mut frame, &mut info, &mut vregs).unwrap();

    let callee_args: Vec<CallArg> = (0..2)
        .map(|i| CallArg {
            spec: ArgSpec::new(ValueType::I32),
            value: VReg(i),
            from_frame: None,
            from_incoming_reg: None,
        })
        .collect();
    let site = CallSite {
        target: CallTarget::Symbol("same_shape".into()),
        conv: CallConv::Fast,
        is_varargs: false,
        args: &callee_args,
        rets: &[],
        no_return: false,
        is_tail_call: true,
    };
    let plan = lower_call(&site, &cfg, &mut frame, &mut info, &mut vregs).unwrap();
    assert_eq!(plan.fp_diff, 0);
    assert_eq!(info.tc_return_addr_delta(), 0);

    let mut mf = MachineFunction::new("caller");
    mf.info = info;
    let b = mf.add_block();
    mf.block_mut(b).push(MachineInst::new(
        Opcode::TcReturnSym,
        vec![Operand::Symbol("same_shape".into()), Operand::Imm(0)],
    ));
    assert!(run_post_ra_passes(&mut mf, &cfg).unwrap());
    let insts = &mf.blocks[0].insts;
    assert_eq!(insts.len(), 1);
    assert_eq!(insts[0].opcode, Opcode::TailJmpSym);
}
