// Per-function side-table threaded through the whole pipeline. The calling
// convention engine fills it in during entry and call lowering; pseudo
// expansion reads the recorded maximum negative tail-call delta when it
// reconciles stack frames, and the external frame layout stage consumes the
// argument area size and callee-pop byte count afterwards. Nothing in here is
// reachable through global lookup; every pass receives it explicitly.

//! Per-function machine metadata.

use super::frame::{FrameIndex, FrameInfo};
use super::registers::{PhysReg, VReg};

/// Metadata attached to a single function during compilation.
#[derive(Debug, Default)]
pub struct MachineFunctionInfo {
    /// Bytes the callee pops from the stack on return (0 for caller-pop
    /// conventions, slot size for stack struct-return).
    pub bytes_to_pop_on_return: u32,

    /// Virtual register holding the incoming struct-return pointer, copied
    /// exactly once at function entry.
    pub sret_return_vreg: Option<VReg>,

    /// Registers forwarded unchanged for musttail vararg calls, with the
    /// virtual register each was copied into at entry.
    pub forwarded_musttail_regs: Vec<(PhysReg, VReg)>,

    /// Size of the incoming argument stack area.
    pub arg_stack_size: u32,

    /// Frame index of the first vararg slot, if the function takes varargs.
    pub varargs_frame_index: Option<FrameIndex>,

    ra_index: Option<FrameIndex>,

    /// Most negative frame delta over all tail calls in this function.
    /// Always <= 0.
    tc_return_addr_delta: i32,
}

impl MachineFunctionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tc_return_addr_delta(&self) -> i32 {
        self.tc_return_addr_delta
    }

    /// Record a tail call's frame delta. Only ever moves downward.
    pub fn update_tc_return_addr_delta(&mut self, delta: i32) {
        if delta < self.tc_return_addr_delta {
            self.tc_return_addr_delta = delta;
        }
    }

    /// Frame index of the return address slot, creating it on first use.
    pub fn return_address_index(&mut self, frame: &mut FrameInfo, slot_size: u32) -> FrameIndex {
        if let Some(idx) = self.ra_index {
            return idx;
        }
        let idx = frame.create_fixed_object(slot_size, -(slot_size as i32), false);
        self.ra_index = Some(idx);
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tc_delta_only_decreases() {
        let mut info = MachineFunctionInfo::new();
        info.update_tc_return_addr_delta(-8);
        info.update_tc_return_addr_delta(-4);
        assert_eq!(info.tc_return_addr_delta(), -8);
        info.update_tc_return_addr_delta(-12);
        assert_eq!(info.tc_return_addr_delta(), -12);
    }

    #[test]
    fn test_return_address_slot_created_once() {
        let mut info = MachineFunctionInfo::new();
        let mut frame = FrameInfo::new();
        let a = info.return_address_index(&mut frame, 4);
        let b = info.return_address_index(&mut frame, 4);
        assert_eq!(a, b);
        assert_eq!(frame.object(a).offset, -4);
    }
}
