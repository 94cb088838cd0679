// This module tracks the stack frame objects of a function under compilation.
// FrameInfo owns a list of FrameObject slots; fixed objects describe the
// incoming argument area (positive or negative offsets relative to the frame
// on entry) and are what the tail-call eligibility check matches outgoing
// stack arguments against. Objects carry the sign/zero-extension flags the
// calling convention recorded for them, because a tail call may only reuse a
// caller slot whose extension state agrees with the outgoing argument. Frame
// objects must never overlap; an overlapping creation is an upstream bug and
// asserts rather than producing an error value.

//! Per-function stack frame objects.

/// Extension state recorded for a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotExt {
    #[default]
    None,
    Sext,
    Zext,
}

/// A single stack slot.
#[derive(Debug, Clone)]
pub struct FrameObject {
    pub offset: i32,
    pub size: u32,
    pub immutable: bool,
    pub ext: SlotExt,
    /// Fixed objects live in the incoming argument area and keep their
    /// offset through frame layout.
    pub fixed: bool,
}

/// Index of a frame object within its function.
pub type FrameIndex = usize;

/// Stack frame bookkeeping for one function.
#[derive(Debug, Default)]
pub struct FrameInfo {
    objects: Vec<FrameObject>,
    /// Set when the function needs its stack dynamically re-aligned;
    /// disqualifies sibling calls.
    pub needs_stack_realignment: bool,
    pub has_tail_call: bool,
    pub has_var_sized_objects: bool,
}

impl FrameInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fixed object in the incoming argument area.
    ///
    /// Panics if the new object would overlap an existing fixed object.
    pub fn create_fixed_object(&mut self, size: u32, offset: i32, immutable: bool) -> FrameIndex {
        debug_assert!(size > 0, "zero-sized frame objects are not allowed");
        for obj in self.objects.iter().filter(|o| o.fixed) {
            let disjoint =
                offset + size as i32 <= obj.offset || obj.offset + obj.size as i32 <= offset;
            assert!(
                disjoint,
                "fixed frame object [{offset}, +{size}) overlaps existing [{}, +{})",
                obj.offset, obj.size
            );
        }
        self.objects.push(FrameObject {
            offset,
            size,
            immutable,
            ext: SlotExt::None,
            fixed: true,
        });
        self.objects.len() - 1
    }

    pub fn object(&self, index: FrameIndex) -> &FrameObject {
        &self.objects[index]
    }

    pub fn set_object_ext(&mut self, index: FrameIndex, ext: SlotExt) {
        self.objects[index].ext = ext;
    }

    pub fn is_fixed(&self, index: FrameIndex) -> bool {
        self.objects[index].fixed
    }

    /// Find the fixed object at exactly this offset, if any.
    pub fn fixed_object_at(&self, offset: i32) -> Option<(FrameIndex, &FrameObject)> {
        self.objects
            .iter()
            .enumerate()
            .find(|(_, o)| o.fixed && o.offset == offset)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
