//! Frame allocation interface
//!
//! Frames are fixed-size blocks requested by size and handed back by handle.
//! The allocator owns the storage; callers only ever hold a [`FrameId`].
//!
//! # Discipline
//! - Every `allocate` is matched by exactly one `release`
//! - Releases happen in reverse allocation order (LIFO), mirroring the
//!   nesting of suspended calls

use crate::runtime::errors::FrameResult;
use crate::runtime::memory::FrameId;

/// Frame alignment, matching the usual async-context alignment
pub const FRAME_ALIGN: usize = 16;

/// Payload size of one frame, rounded up to its alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    size: usize,
}

impl FrameLayout {
    /// Create a layout from size and alignment
    ///
    /// # Returns
    /// `Some(FrameLayout)` if alignment is a power of two, `None` otherwise.
    /// The size is rounded up to the alignment.
    pub fn from_size_align(
        size: usize,
        align: usize,
    ) -> Option<Self> {
        if align == 0 || !align.is_power_of_two() {
            return None;
        }

        let aligned_size = size.checked_add(align - 1)? & !(align - 1);

        Some(Self { size: aligned_size })
    }

    /// Layout for a declared frame-size requirement
    pub fn for_frame(size: usize) -> Option<Self> {
        Self::from_size_align(size, FRAME_ALIGN)
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Task-local frame allocator
///
/// Allocation never blocks. It only fails when a configured frame limit is
/// hit, which callers treat as resource exhaustion.
pub trait FrameAllocator {
    /// Allocate a zeroed frame of at least `size` payload bytes
    fn allocate(
        &mut self,
        size: usize,
    ) -> FrameResult<FrameId>;

    /// Return a frame to the allocator
    ///
    /// Fails for stale handles and for releases that break LIFO order; in
    /// both cases nothing is released.
    fn release(
        &mut self,
        frame: FrameId,
    ) -> FrameResult<()>;
}
