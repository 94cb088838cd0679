// Blocks and functions. Passes mutate instruction lists only through the
// splice helpers here, which return the index following the edit; a pass
// snapshots that index before touching anything at the current position and
// resumes from the snapshot, so an edit can never be scanned twice.

//! Machine blocks and functions.

use crate::core::frame::FrameInfo;
use crate::core::func_info::MachineFunctionInfo;
use crate::machine::inst::{BlockId, MachineInst};

/// A straight-line sequence of instructions plus successor edges.
#[derive(Debug, Default)]
pub struct MachineBlock {
    pub insts: Vec<MachineInst>,
    pub successors: Vec<BlockId>,
    /// Condition register is live on entry to this block.
    pub ccr_live_in: bool,
}

impl MachineBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, inst: MachineInst) {
        self.insts.push(inst);
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Inserts `insts` before position `at`; returns the index past the last
    /// inserted instruction.
    pub fn insert_at(&mut self, at: usize, insts: Vec<MachineInst>) -> usize {
        let n = insts.len();
        self.insts.splice(at..at, insts);
        at + n
    }

    /// Replaces the instruction at `at` with `replacement`; returns the
    /// index past the last replacement instruction.
    pub fn replace_at(&mut self, at: usize, replacement: Vec<MachineInst>) -> usize {
        let n = replacement.len();
        self.insts.splice(at..at + 1, replacement);
        at + n
    }

    /// Removes `[from, to)`; returns `from`.
    pub fn remove_range(&mut self, from: usize, to: usize) -> usize {
        debug_assert!(from <= to && to <= self.insts.len());
        self.insts.drain(from..to);
        from
    }

    pub fn remove_at(&mut self, at: usize) -> usize {
        self.remove_range(at, at + 1)
    }

    pub fn add_successor(&mut self, succ: BlockId) {
        if !self.successors.contains(&succ) {
            self.successors.push(succ);
        }
    }

    pub fn remove_successor(&mut self, succ: BlockId) {
        self.successors.retain(|s| *s != succ);
    }
}

/// A function's blocks, frame layout, and backend side-table.
#[derive(Debug, Default)]
pub struct MachineFunction {
    pub name: String,
    pub blocks: Vec<MachineBlock>,
    pub frame: FrameInfo,
    pub info: MachineFunctionInfo,
}

impl MachineFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_block(&mut self) -> BlockId {
        self.blocks.push(MachineBlock::new());
        BlockId(self.blocks.len() as u32 - 1)
    }

    pub fn block(&self, id: BlockId) -> &MachineBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut MachineBlock {
        &mut self.blocks[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::inst::{Opcode, Width};

    fn mov() -> MachineInst {
        MachineInst::new(Opcode::Move { width: Width::Long }, vec![])
    }

    #[test]
    fn test_replace_returns_resume_index() {
        let mut b = MachineBlock::new();
        b.push(mov());
        b.push(MachineInst::new(Opcode::Rts, vec![]));
        let next = b.replace_at(0, vec![mov(), mov(), mov()]);
        assert_eq!(next, 3);
        assert_eq!(b.len(), 4);
        assert_eq!(b.insts[3].opcode, Opcode::Rts);
    }

    #[test]
    fn test_remove_range() {
        let mut b = MachineBlock::new();
        for _ in 0..4 {
            b.push(mov());
        }
        let next = b.remove_range(1, 3);
        assert_eq!(next, 1);
        assert_eq!(b.len(), 2);
    }
}
