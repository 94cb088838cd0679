// This module defines the physical register model for the M68k family: eight
// data registers D0-D7 and eight address registers A0-A7, where A7 doubles as
// the stack pointer and A6 conventionally as the frame pointer. PhysReg pairs
// a register bank with an id; RegBitSet tracks register sets per bank and
// converts to/from the 16-bit MOVEM mask layout (D0..D7 occupy bits 0..7,
// A0..A7 bits 8..15). The MOVEM mask conversion is what the collapse pass and
// pseudo expansion rely on, so the bit layout here is load-bearing. VReg and
// VRegAlloc provide virtual register numbering for the pre-allocation lowering
// stages (struct-return threading, segmented-stack alloca, select lowering).

//! Physical and virtual register model.

/// Register banks on the M68k: data and address registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegBank {
    Data = 0,
    Addr = 1,
}

/// A physical register: bank plus index within the bank (0..=7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysReg {
    pub bank: RegBank,
    pub id: u8,
}

impl PhysReg {
    pub const fn data(id: u8) -> Self {
        Self {
            bank: RegBank::Data,
            id,
        }
    }

    pub const fn addr(id: u8) -> Self {
        Self {
            bank: RegBank::Addr,
            id,
        }
    }

    pub fn is_data(&self) -> bool {
        self.bank == RegBank::Data
    }

    pub fn is_addr(&self) -> bool {
        self.bank == RegBank::Addr
    }

    /// Bit of this register in a MOVEM mask: D0..D7 are bits 0..7,
    /// A0..A7 are bits 8..15.
    pub fn movem_bit(&self) -> u16 {
        debug_assert!(self.id < 8);
        1u16 << (self.bank as u8 * 8 + self.id)
    }
}

impl std::fmt::Display for PhysReg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.bank {
            RegBank::Data => write!(f, "%d{}", self.id),
            RegBank::Addr => write!(f, "%a{}", self.id),
        }
    }
}

/// Well-known registers.
pub mod regs {
    use super::PhysReg;

    pub const D0: PhysReg = PhysReg::data(0);
    pub const D1: PhysReg = PhysReg::data(1);
    pub const D2: PhysReg = PhysReg::data(2);
    pub const D3: PhysReg = PhysReg::data(3);
    pub const D4: PhysReg = PhysReg::data(4);
    pub const D5: PhysReg = PhysReg::data(5);
    pub const D6: PhysReg = PhysReg::data(6);
    pub const D7: PhysReg = PhysReg::data(7);

    pub const A0: PhysReg = PhysReg::addr(0);
    pub const A1: PhysReg = PhysReg::addr(1);
    pub const A2: PhysReg = PhysReg::addr(2);
    pub const A3: PhysReg = PhysReg::addr(3);
    pub const A4: PhysReg = PhysReg::addr(4);
    pub const A5: PhysReg = PhysReg::addr(5);
    pub const A6: PhysReg = PhysReg::addr(6);
    /// A7 is the stack pointer.
    pub const SP: PhysReg = PhysReg::addr(7);
}

/// Bit set for efficiently tracking register sets, one mask per bank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegBitSet {
    banks: [u16; 2],
}

impl RegBitSet {
    /// Create empty register set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_regs(regs: &[PhysReg]) -> Self {
        let mut set = Self::new();
        for &r in regs {
            set.set(r);
        }
        set
    }

    /// Check if register is set.
    pub fn contains(&self, reg: PhysReg) -> bool {
        debug_assert!(reg.id < 8);
        (self.banks[reg.bank as usize] & (1u16 << reg.id)) != 0
    }

    /// Set a register.
    pub fn set(&mut self, reg: PhysReg) {
        debug_assert!(reg.id < 8);
        self.banks[reg.bank as usize] |= 1u16 << reg.id;
    }

    /// Clear a register.
    pub fn clear(&mut self, reg: PhysReg) {
        debug_assert!(reg.id < 8);
        self.banks[reg.bank as usize] &= !(1u16 << reg.id);
    }

    /// Set union with another set.
    pub fn union(&mut self, other: &RegBitSet) {
        for i in 0..2 {
            self.banks[i] |= other.banks[i];
        }
    }

    /// True if every register of `other` is also in `self`.
    pub fn is_superset_of(&self, other: &RegBitSet) -> bool {
        (0..2).all(|i| other.banks[i] & !self.banks[i] == 0)
    }

    pub fn count(&self) -> u32 {
        self.banks.iter().map(|b| b.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.banks == [0, 0]
    }

    /// Pack into the 16-bit MOVEM mask layout.
    pub fn movem_mask(&self) -> u16 {
        self.banks[0] | (self.banks[1] << 8)
    }

    /// Build a set from a 16-bit MOVEM mask.
    pub fn from_movem_mask(mask: u16) -> Self {
        Self {
            banks: [mask & 0x00ff, mask >> 8],
        }
    }
}

/// A virtual register number, valid until register allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VReg(pub u32);

/// Monotonic virtual register allocator.
#[derive(Debug, Default)]
pub struct VRegAlloc {
    next: u32,
}

impl VRegAlloc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self) -> VReg {
        let v = VReg(self.next);
        self.next += 1;
        v
    }
}
