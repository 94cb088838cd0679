//! Shared backend infrastructure: errors, registers, frames, side-table.

pub mod error;
pub mod frame;
pub mod func_info;
pub mod registers;

pub use error::{CompileError, CompileResult};
pub use frame::{FrameIndex, FrameInfo, FrameObject, SlotExt};
pub use func_info::MachineFunctionInfo;
pub use registers::{regs, PhysReg, RegBank, RegBitSet, VReg, VRegAlloc};
