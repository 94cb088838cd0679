//! M68k code generation backend.
//!
//! The post-frontend half of a retargetable compiler for the Motorola
//! 68000 family. Input is a graph of generic operations per function;
//! output is fully target-legal machine instruction blocks for a
//! downstream emission stage.
//!
//! # Pipeline
//!
//! ```ignore
//! use m68k_codegen::lower::{lower_operation, LowerCtx};
//! use m68k_codegen::passes::run_post_ra_passes;
//! use m68k_codegen::target::TargetConfig;
//!
//! let cfg = TargetConfig::mc68020();
//! // 1. lower generic nodes into target-legal ones
//! for id in graph_node_ids {
//!     lower_operation(id, &mut ctx)?;
//! }
//! // 2. lower calls, arguments and returns through the cc module
//! // 3. after register allocation, expand pseudos and fold MOVEM runs
//! run_post_ra_passes(&mut func, &cfg)?;
//! ```
//!
//! # Architecture
//!
//! - [`lower`] - custom lowering of generic operations (multiply, overflow
//!   arithmetic, bit-test comparisons, dynamic allocation, select diamonds)
//! - [`cc`] - calling convention engine: location assignment, entry and
//!   return lowering, call planning, tail-call eligibility
//! - [`machine`] - machine instruction and block representation plus the
//!   stack adjustment service
//! - [`passes`] - post-register-allocation pseudo expansion and the MOVEM
//!   collapse peephole
//! - [`core`] - shared infrastructure: errors, registers, frames, the
//!   per-function side table
//! - [`target`] - processor generation and calling convention rule tables

pub mod cc;
pub mod core;
pub mod lower;
pub mod machine;
pub mod passes;
pub mod target;

pub use crate::core::{CompileError, CompileResult};
pub use machine::{MachineBlock, MachineFunction};
pub use passes::run_post_ra_passes;
pub use target::{CallConv, TargetConfig};
