// This module defines error types for the M68k backend using the thiserror
// crate for idiomatic Rust error handling. CompileError is the main error enum
// covering the policy-fatal conditions of the pipeline: return cleanup counts
// that exceed the addressable immediate range, segmented-stack allocation on
// targets that cannot lower it, unsupported operand widths and calling
// convention failures. Each variant carries the unmet precondition so the
// diagnostic names exactly what the target cannot do. The module also provides
// CompileResult<T> as a convenience alias. Recoverable "no pattern matched"
// situations are not errors; lowering returns Lowered::Unchanged for those.
// Internal-consistency violations (overlapping MOVEM masks, undefined frame
// slots, operand arity mismatches) are asserts, not error values.

//! Error types for the M68k backend.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

/// Main error type for backend compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The return-cleanup byte count does not fit the addressable immediate
    /// range. Never silently truncated.
    #[error("return cleanup of {bytes} bytes exceeds the 16-bit addressable range")]
    CleanupTooLarge { bytes: i64 },

    #[error("segmented stack allocation is not supported on this target")]
    SegmentedStackUnsupported,

    #[error("unsupported {width}-bit {operation} operation")]
    UnsupportedWidth {
        operation: &'static str,
        width: u32,
    },

    #[error("calling convention error: {reason}")]
    CallingConvention { reason: String },

    #[error("code generation failed: {reason}")]
    CodeGeneration { reason: String },
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
