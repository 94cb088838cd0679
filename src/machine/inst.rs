// Machine instruction representation shared by the post-regalloc passes.
// Opcodes form one closed enum so every pass matches exhaustively; adding an
// opcode forces every match site to take a position on it. Pseudo opcodes
// never survive pseudo expansion; the collapse pass and emission only ever
// see concrete opcodes.

//! Machine instructions, operands, and implicit-operand annotations.

use crate::core::registers::{PhysReg, VReg};
use crate::lower::condcode::CondCode;

/// Operation width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Byte,
    Word,
    Long,
}

impl Width {
    pub fn bytes(self) -> u32 {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
            Width::Long => 4,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() * 8
    }
}

/// Identifier of a block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

/// Register-indirect memory reference with displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRef {
    pub base: PhysReg,
    pub disp: i32,
}

impl MemRef {
    pub fn new(base: PhysReg, disp: i32) -> Self {
        Self { base, disp }
    }
}

/// An explicit operand of a machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(PhysReg),
    VReg(VReg),
    Imm(i64),
    Mem(MemRef),
    Symbol(String),
    Block(BlockId),
}

impl Operand {
    pub fn as_reg(&self) -> Option<PhysReg> {
        match self {
            Operand::Reg(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_imm(&self) -> Option<i64> {
        match self {
            Operand::Imm(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_mem(&self) -> Option<MemRef> {
        match self {
            Operand::Mem(m) => Some(*m),
            _ => None,
        }
    }
}

/// Implicit register effects carried alongside the explicit operands.
/// Expansion must copy these verbatim onto replacement instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplicitOp {
    Def(PhysReg),
    Use(PhysReg),
    Kill(PhysReg),
    /// Last use of a virtual register, before allocation.
    KillVReg(VReg),
    DefCcr,
    UseCcr,
    KillCcr,
}

/// Machine opcodes. `*Pseudo` and the extend pseudos exist only between
/// instruction selection and the expansion pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    // --- concrete ---
    /// `move.<w> src, dst`
    Move { width: Width },
    /// Sign extension in place on a data register.
    Ext { from: Width, to: Width },
    /// `and.<w> #imm, dst`
    AndImm { width: Width },
    /// `add.<w> src, dst`
    Add { width: Width },
    /// `sub.<w> src, dst`
    Sub { width: Width },
    /// `move <reg>, ccr`
    MoveToCcr,
    /// `move ccr, <reg>`
    MoveFromCcr,
    /// Multi-register store, registers to memory.
    MovemRM { width: Width },
    /// Multi-register load, memory to registers.
    MovemMR { width: Width },
    /// Conditional branch.
    Bcc { cc: CondCode },
    /// Return from subroutine.
    Rts,
    /// Tail jump to a symbol.
    TailJmpSym,
    /// Tail jump through an address register.
    TailJmpReg,

    // --- pseudos ---
    /// Width-changing move with undefined upper bits.
    MovXPseudo { from: Width, to: Width },
    /// Sign-extending move; `from_mem` selects the memory-source form.
    MovSXPseudo { from: Width, to: Width, from_mem: bool },
    /// Zero-extending move; `from_mem` selects the memory-source form.
    MovZXPseudo { from: Width, to: Width, from_mem: bool },
    /// CCR read into a data register.
    MoveFromCcrPseudo,
    /// CCR write from a data register.
    MoveToCcrPseudo,
    /// Multi-register store pseudo, before direction is made explicit.
    MovemRMPseudo { width: Width },
    /// Multi-register load pseudo.
    MovemMRPseudo { width: Width },
    /// Return with callee stack cleanup; operand 0 is the byte count.
    RetPseudo,
    /// Tail call to a symbol; operand 0 target, operand 1 stack adjustment.
    TcReturnSym,
    /// Tail call through a register.
    TcReturnReg,
    /// Conditional move, resolved by the custom inserter.
    CMov { cc: CondCode, width: Width },
    /// Incoming value selection at a control-flow merge.
    Phi,
    /// Segmented-stack allocation request.
    SegAlloca,
}

impl Opcode {
    /// Pseudos must not survive the expansion pass.
    pub fn is_pseudo(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            MovXPseudo { .. }
                | MovSXPseudo { .. }
                | MovZXPseudo { .. }
                | MoveFromCcrPseudo
                | MoveToCcrPseudo
                | MovemRMPseudo { .. }
                | MovemMRPseudo { .. }
                | RetPseudo
                | TcReturnSym
                | TcReturnReg
                | CMov { .. }
                | Phi
                | SegAlloca
        )
    }

    /// Whether this instruction ends its block.
    pub fn is_terminator(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Bcc { .. } | Rts | TailJmpSym | TailJmpReg | RetPseudo | TcReturnSym | TcReturnReg
        )
    }
}

/// One machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineInst {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    pub implicit: Vec<ImplicitOp>,
}

impl MachineInst {
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self {
            opcode,
            operands,
            implicit: Vec::new(),
        }
    }

    pub fn with_implicit(mut self, implicit: Vec<ImplicitOp>) -> Self {
        self.implicit = implicit;
        self
    }

    pub fn operand(&self, idx: usize) -> &Operand {
        &self.operands[idx]
    }

    /// Whether a given physical register is killed by an implicit operand.
    pub fn kills(&self, reg: PhysReg) -> bool {
        self.implicit.iter().any(|op| *op == ImplicitOp::Kill(reg))
    }

    pub fn kills_vreg(&self, vreg: VReg) -> bool {
        self.implicit
            .iter()
            .any(|op| *op == ImplicitOp::KillVReg(vreg))
    }

    pub fn kills_ccr(&self) -> bool {
        self.implicit
            .iter()
            .any(|op| matches!(op, ImplicitOp::KillCcr))
    }

    pub fn defines_ccr(&self) -> bool {
        self.implicit
            .iter()
            .any(|op| matches!(op, ImplicitOp::DefCcr))
    }

    pub fn uses_ccr(&self) -> bool {
        self.implicit
            .iter()
            .any(|op| matches!(op, ImplicitOp::UseCcr | ImplicitOp::KillCcr))
    }
}
