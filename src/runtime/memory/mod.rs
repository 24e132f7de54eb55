//! Frame memory for suspended calls
//!
//! Frames live in a task-local arena and are addressed by [`FrameId`]
//! handles instead of raw addresses. A handle carries the generation of the
//! slot it was issued for, so a handle to a released frame is rejected
//! instead of aliasing whatever frame reuses the slot.
//!
//! The arena keeps its live frames on an allocation stack: releases must
//! pop that stack, which makes the LIFO discipline of nested suspensions a
//! checked property rather than a convention.

mod allocator;

pub use allocator::{FrameAllocator, FrameLayout, FRAME_ALIGN};

use std::fmt;

use tracing::{error, trace};

use crate::runtime::errors::{FrameError, FrameResult};
use crate::runtime::task::Continuation;
use crate::util::config::ArenaConfig;

/// Handle to a frame in a [`FrameArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId {
    index: u32,
    generation: u32,
}

impl FrameId {
    /// Slot index inside the arena
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for FrameId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Frame({}#{})", self.index, self.generation)
    }
}

/// Suspended-call state for one invocation
///
/// `parent` is a back-reference used only for resume chaining; it does not
/// own the parent. The payload is opaque to the dispatch core.
pub struct Frame {
    parent: Option<FrameId>,
    resume: Option<Continuation>,
    layout: FrameLayout,
    payload: Vec<u8>,
}

impl Frame {
    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    pub fn has_resume(&self) -> bool {
        self.resume.is_some()
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }
}

impl fmt::Debug for Frame {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Frame")
            .field("parent", &self.parent)
            .field("resume", &self.resume)
            .field("size", &self.layout.size())
            .finish()
    }
}

/// Arena event, recorded when tracing is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    Allocated { frame: FrameId, size: usize },
    Released { frame: FrameId },
}

/// Allocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Total frames handed out
    pub allocations: usize,
    /// Total frames returned
    pub releases: usize,
    /// Highest number of simultaneously live frames
    pub peak_live: usize,
    /// Payload bytes currently held by live frames
    pub bytes_live: usize,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    frame: Option<Frame>,
}

/// Task-local, growth-on-demand frame arena
#[derive(Debug)]
pub struct FrameArena {
    slots: Vec<Slot>,
    /// Indices of vacant slots
    free: Vec<u32>,
    /// Live frames in allocation order
    stack: Vec<FrameId>,
    max_live: Option<usize>,
    stats: ArenaStats,
    events: Option<Vec<FrameEvent>>,
}

impl FrameArena {
    /// Create an arena with default configuration
    pub fn new() -> Self {
        Self::with_config(&ArenaConfig::default())
    }

    pub fn with_config(config: &ArenaConfig) -> Self {
        Self {
            slots: Vec::with_capacity(config.initial_capacity),
            free: Vec::new(),
            stack: Vec::with_capacity(config.initial_capacity),
            max_live: config.max_live_frames,
            stats: ArenaStats::default(),
            events: config.trace_events.then(Vec::new),
        }
    }

    /// Allocate a frame already linked to a parent and a resume target
    pub fn allocate_linked(
        &mut self,
        size: usize,
        parent: Option<FrameId>,
        resume: Option<Continuation>,
    ) -> FrameResult<FrameId> {
        let id = self.allocate(size)?;
        let frame = self.get_mut(id)?;
        frame.parent = parent;
        frame.resume = resume;
        Ok(id)
    }

    /// Whether `frame` refers to a live frame
    pub fn contains(
        &self,
        frame: FrameId,
    ) -> bool {
        self.get(frame).is_ok()
    }

    pub fn get(
        &self,
        frame: FrameId,
    ) -> FrameResult<&Frame> {
        self.slots
            .get(frame.index())
            .filter(|slot| slot.generation == frame.generation)
            .and_then(|slot| slot.frame.as_ref())
            .ok_or(FrameError::InvalidHandle(frame))
    }

    pub fn get_mut(
        &mut self,
        frame: FrameId,
    ) -> FrameResult<&mut Frame> {
        self.slots
            .get_mut(frame.index())
            .filter(|slot| slot.generation == frame.generation)
            .and_then(|slot| slot.frame.as_mut())
            .ok_or(FrameError::InvalidHandle(frame))
    }

    /// Set a frame's parent and resume target
    pub fn link(
        &mut self,
        frame: FrameId,
        parent: FrameId,
        resume: Continuation,
    ) -> FrameResult<()> {
        let slot = self.get_mut(frame)?;
        slot.parent = Some(parent);
        slot.resume = Some(resume);
        Ok(())
    }

    /// Take the parent and resume target out of a frame
    ///
    /// The resume target can be taken once; a second attempt reports
    /// `MissingResume` and leaves the frame untouched.
    pub fn unlink(
        &mut self,
        frame: FrameId,
    ) -> FrameResult<(FrameId, Continuation)> {
        let slot = self.get_mut(frame)?;
        let parent = slot.parent.ok_or(FrameError::MissingParent(frame))?;
        let resume = slot.resume.take().ok_or(FrameError::MissingResume(frame))?;
        Ok((parent, resume))
    }

    /// Check that `frame` could be released right now without changing it
    pub fn check_release(
        &self,
        frame: FrameId,
    ) -> FrameResult<()> {
        if !self.contains(frame) {
            error!(%frame, "release of stale frame handle");
            return Err(FrameError::InvalidHandle(frame));
        }
        let top = self.top();
        if top != Some(frame) {
            error!(%frame, ?top, "frame released out of order");
            return Err(FrameError::OutOfOrder {
                released: frame,
                top,
            });
        }
        Ok(())
    }

    /// Unlink and release `frame` in one step
    ///
    /// Either both happen or neither does: a frame that cannot be released
    /// keeps its parent and resume target, so it can be finished later.
    pub fn detach(
        &mut self,
        frame: FrameId,
    ) -> FrameResult<(FrameId, Continuation)> {
        self.check_release(frame)?;
        let links = self.unlink(frame)?;
        self.release(frame)?;
        Ok(links)
    }

    /// Most recently allocated live frame
    pub fn top(&self) -> Option<FrameId> {
        self.stack.last().copied()
    }

    /// Number of live frames
    pub fn live(&self) -> usize {
        self.stack.len()
    }

    pub fn stats(&self) -> ArenaStats {
        self.stats
    }

    /// Recorded events, if tracing is enabled
    pub fn events(&self) -> Option<&[FrameEvent]> {
        self.events.as_deref()
    }

    fn record(
        &mut self,
        event: FrameEvent,
    ) {
        if let Some(events) = self.events.as_mut() {
            events.push(event);
        }
    }
}

impl Default for FrameArena {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAllocator for FrameArena {
    fn allocate(
        &mut self,
        size: usize,
    ) -> FrameResult<FrameId> {
        if let Some(limit) = self.max_live {
            if self.stack.len() >= limit {
                error!(limit, "frame arena exhausted");
                return Err(FrameError::Exhausted { limit });
            }
        }

        let layout = FrameLayout::for_frame(size).ok_or(FrameError::Oversized(size))?;
        let frame = Frame {
            parent: None,
            resume: None,
            layout,
            payload: vec![0u8; layout.size()],
        };

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.frame = Some(frame);
                FrameId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    frame: Some(frame),
                });
                FrameId {
                    index,
                    generation: 0,
                }
            }
        };

        self.stack.push(id);
        self.stats.allocations += 1;
        self.stats.bytes_live += layout.size();
        self.stats.peak_live = self.stats.peak_live.max(self.stack.len());
        self.record(FrameEvent::Allocated {
            frame: id,
            size: layout.size(),
        });
        trace!(%id, size = layout.size(), "frame allocated");
        Ok(id)
    }

    fn release(
        &mut self,
        frame: FrameId,
    ) -> FrameResult<()> {
        self.check_release(frame)?;

        self.stack.pop();
        let slot = &mut self.slots[frame.index()];
        if let Some(released) = slot.frame.take() {
            self.stats.bytes_live -= released.layout.size();
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(frame.index);
        self.stats.releases += 1;
        self.record(FrameEvent::Released { frame });
        trace!(%frame, "frame released");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
