// Location assignment. The convention rule tables are declarative: candidate
// registers in priority order per value class, and a stack area for the
// rest. The assigner walks a value list front to back, hands each `inreg`
// value the first free candidate register, and appends everything else to
// the stack area at the next slot-aligned offset. Assignment is a pure
// function of the rule table and the value list, so re-running it over the
// same list yields identical locations, and the used-register set makes
// handing a register out twice impossible. Per-function assignment state
// lives in a bump arena.

//! Argument and return location assignment.

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

use crate::core::error::{CompileError, CompileResult};
use crate::core::frame::SlotExt;
use crate::core::registers::{PhysReg, RegBitSet};
use crate::lower::node::ValueType;
use crate::target::ConventionRules;

/// Value class for register candidate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgClass {
    Int,
    Ptr,
}

/// Description of one argument or return value.
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub ty: ValueType,
    /// Marked `inreg`: eligible for register passing.
    pub in_reg: bool,
    /// Hidden struct-return pointer.
    pub sret: bool,
    /// Aggregate passed by value on the stack, with its byte size.
    pub byval: Option<u32>,
    pub ext: SlotExt,
}

impl ArgSpec {
    pub fn new(ty: ValueType) -> Self {
        Self {
            ty,
            in_reg: false,
            sret: false,
            byval: None,
            ext: SlotExt::None,
        }
    }

    pub fn in_reg(mut self) -> Self {
        self.in_reg = true;
        self
    }

    pub fn sret(mut self) -> Self {
        self.sret = true;
        self
    }

    pub fn class(&self) -> ArgClass {
        if self.ty == ValueType::Ptr {
            ArgClass::Ptr
        } else {
            ArgClass::Int
        }
    }

    pub fn size(&self) -> u32 {
        match self.byval {
            Some(bytes) => bytes,
            None => self.ty.bits() / 8,
        }
    }
}

/// Assigned location of one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Reg(PhysReg),
    /// Byte offset into the argument stack area.
    Stack(u32),
}

/// One assignment produced by the engine.
#[derive(Debug, Clone, Copy)]
pub struct CCAssignment {
    pub loc: Location,
    pub size: u32,
    pub align: u32,
    pub ext: SlotExt,
}

impl CCAssignment {
    pub fn reg(&self) -> Option<PhysReg> {
        match self.loc {
            Location::Reg(r) => Some(r),
            Location::Stack(_) => None,
        }
    }

    pub fn stack_offset(&self) -> Option<u32> {
        match self.loc {
            Location::Reg(_) => None,
            Location::Stack(off) => Some(off),
        }
    }
}

/// First-fit assigner over one convention's rule table.
pub struct LocationAssigner<'bump, 'rules> {
    rules: &'rules ConventionRules,
    used: RegBitSet,
    stack_offset: u32,
    assignments: BumpVec<'bump, CCAssignment>,
}

impl<'bump, 'rules> LocationAssigner<'bump, 'rules> {
    pub fn new(bump: &'bump Bump, rules: &'rules ConventionRules) -> Self {
        Self {
            rules,
            used: RegBitSet::new(),
            stack_offset: 0,
            assignments: BumpVec::new_in(bump),
        }
    }

    /// Assign locations to a full argument list, in order.
    pub fn assign_args(&mut self, args: &[ArgSpec]) {
        for spec in args {
            let assignment = self.assign_one(spec);
            self.assignments.push(assignment);
        }
    }

    fn assign_one(&mut self, spec: &ArgSpec) -> CCAssignment {
        if spec.in_reg && spec.byval.is_none() {
            let candidates = match spec.class() {
                ArgClass::Int => self.rules.int_regs,
                ArgClass::Ptr => self.rules.ptr_regs,
            };
            if let Some(reg) = self.take_first_free(candidates) {
                return CCAssignment {
                    loc: Location::Reg(reg),
                    size: spec.size(),
                    align: self.rules.slot_align,
                    ext: spec.ext,
                };
            }
        }
        self.assign_stack(spec)
    }

    fn assign_stack(&mut self, spec: &ArgSpec) -> CCAssignment {
        let align = self.rules.slot_align;
        self.stack_offset = round_up(self.stack_offset, align);
        let offset = self.stack_offset;
        // Every scalar occupies a full slot; byval aggregates take as many
        // slots as they need.
        let advance = round_up(spec.size().max(self.rules.slot_size), self.rules.slot_size);
        self.stack_offset += advance;
        CCAssignment {
            loc: Location::Stack(offset),
            size: spec.size(),
            align,
            ext: spec.ext,
        }
    }

    /// Assign return values. Returns fail the convention when they do not
    /// all fit in the return registers.
    pub fn assign_returns(&mut self, rets: &[ArgSpec]) -> CompileResult<()> {
        for spec in rets {
            let candidates = match spec.class() {
                ArgClass::Int => self.rules.ret_int_regs,
                ArgClass::Ptr => self.rules.ret_ptr_regs,
            };
            let Some(reg) = self.take_first_free(candidates) else {
                return Err(CompileError::CallingConvention {
                    reason: format!(
                        "no return register left for a {:?} value in {:?}",
                        spec.class(),
                        self.rules.kind
                    ),
                });
            };
            self.assignments.push(CCAssignment {
                loc: Location::Reg(reg),
                size: spec.size(),
                align: self.rules.slot_align,
                ext: spec.ext,
            });
        }
        Ok(())
    }

    fn take_first_free(&mut self, candidates: &[PhysReg]) -> Option<PhysReg> {
        for &reg in candidates {
            if !self.used.contains(reg) {
                self.used.set(reg);
                return Some(reg);
            }
        }
        None
    }

    pub fn assignments(&self) -> &[CCAssignment] {
        &self.assignments
    }

    /// Total size of the stack argument area assigned so far.
    pub fn stack_size(&self) -> u32 {
        self.stack_offset
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Offset within a stack slot at which a sub-word value sits. Big-endian
/// layout puts a byte at +3 and a halfword at +2 of its 4-byte slot.
pub fn slot_value_offset(assignment: &CCAssignment, slot_size: u32) -> u32 {
    if assignment.size < slot_size && assignment.align >= slot_size {
        slot_size - assignment.size
    } else {
        0
    }
}

/// Round an argument area size so that pushing it keeps the stack aligned
/// once the return address slot is accounted for: the result satisfies
/// `size % alignment == alignment - slot_size`.
pub fn aligned_argument_stack_size(size: u32, stack_alignment: u32, slot_size: u32) -> u32 {
    let align_mask = stack_alignment - 1;
    if (size & align_mask) <= stack_alignment - slot_size {
        size + ((stack_alignment - slot_size) - (size & align_mask))
    } else {
        (size & !align_mask) + stack_alignment + (stack_alignment - slot_size)
    }
}
