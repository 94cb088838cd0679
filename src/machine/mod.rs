//! Machine-level IR: instructions, blocks, and the SP adjustment service.

pub mod block;
pub mod inst;
pub mod stack_adjust;

pub use block::{MachineBlock, MachineFunction};
pub use inst::{BlockId, ImplicitOp, MachineInst, MemRef, Opcode, Operand, Width};
