//! Task-local execution context
//!
//! A [`Task`] drives one dispatch chain. It owns the frame arena the chain
//! allocates from and a queue of parked steps: a suspended callee parks a
//! step, and whoever drives the task runs it later, possibly on another
//! thread. At most one step of a task runs at a time because every step
//! needs `&mut Task`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::runtime::errors::{ErrorPayload, FrameResult};
use crate::runtime::memory::{FrameAllocator, FrameArena, FrameId};
use crate::util::config::ArenaConfig;

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

type ResumeFn = dyn FnOnce(&mut Task, FrameId, Option<ErrorPayload>) -> FrameResult<()> + Send;

/// Resume target of a frame
///
/// Resumes the frame it is given with an optional error. `resume` takes
/// `self` by value, so a continuation runs at most once.
pub struct Continuation {
    name: &'static str,
    resume: Box<ResumeFn>,
}

impl Continuation {
    pub fn new<F>(
        name: &'static str,
        resume: F,
    ) -> Self
    where
        F: FnOnce(&mut Task, FrameId, Option<ErrorPayload>) -> FrameResult<()> + Send + 'static,
    {
        Self {
            name,
            resume: Box::new(resume),
        }
    }

    /// Name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Transfer control to the continuation
    pub fn resume(
        self,
        task: &mut Task,
        frame: FrameId,
        error: Option<ErrorPayload>,
    ) -> FrameResult<()> {
        trace!(continuation = self.name, %frame, failed = error.is_some(), "resume");
        (self.resume)(task, frame, error)
    }
}

impl fmt::Debug for Continuation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("Continuation").field(&self.name).finish()
    }
}

/// Work parked by a suspended frame
pub type Step = Box<dyn FnOnce(&mut Task, FrameId) -> FrameResult<()> + Send>;

/// Execution context for one dispatch chain
pub struct Task {
    id: TaskId,
    arena: FrameArena,
    parked: VecDeque<(FrameId, Step)>,
    cancelled: bool,
}

impl Task {
    /// Create a task with a default arena
    pub fn new(id: TaskId) -> Self {
        Self::with_config(id, &ArenaConfig::default())
    }

    pub fn with_config(
        id: TaskId,
        config: &ArenaConfig,
    ) -> Self {
        Self {
            id,
            arena: FrameArena::with_config(config),
            parked: VecDeque::new(),
            cancelled: false,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn arena(&self) -> &FrameArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut FrameArena {
        &mut self.arena
    }

    /// Allocate a frame with no parent and no resume target
    pub fn root_frame(
        &mut self,
        size: usize,
    ) -> FrameResult<FrameId> {
        self.arena.allocate(size)
    }

    /// Finish `frame`: release it and resume its parent
    ///
    /// This is the return path every callee takes. The frame's parent and
    /// resume target are read first, then the frame is released, then the
    /// parent is resumed with `error`. A frame can complete only once; a
    /// second completion finds a stale handle and resumes nothing. A frame
    /// that is not the newest live frame is refused and left as it was.
    pub fn complete(
        &mut self,
        frame: FrameId,
        error: Option<ErrorPayload>,
    ) -> FrameResult<()> {
        let (parent, resume) = self.arena.detach(frame)?;
        debug!(task = %self.id, %frame, %parent, continuation = resume.name(), "frame completed");
        resume.resume(self, parent, error)
    }

    /// Park `step` until the task is driven again
    pub fn suspend<F>(
        &mut self,
        frame: FrameId,
        step: F,
    ) where
        F: FnOnce(&mut Task, FrameId) -> FrameResult<()> + Send + 'static,
    {
        trace!(task = %self.id, %frame, "frame suspended");
        self.parked.push_back((frame, Box::new(step)));
    }

    /// Run one parked step
    ///
    /// Returns `false` when nothing was parked.
    pub fn poll_once(&mut self) -> FrameResult<bool> {
        match self.parked.pop_front() {
            Some((frame, step)) => {
                trace!(task = %self.id, %frame, "frame resumed");
                step(self, frame)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run parked steps until none remain, returning how many ran
    pub fn run_until_idle(&mut self) -> FrameResult<usize> {
        let mut steps = 0;
        while self.poll_once()? {
            steps += 1;
        }
        Ok(steps)
    }

    /// Number of parked steps
    pub fn parked(&self) -> usize {
        self.parked.len()
    }

    /// Mark the task cancelled
    ///
    /// Nothing is interrupted; entry points observe the flag and finish
    /// with an error of their own.
    pub fn cancel(&mut self) {
        debug!(task = %self.id, "task cancelled");
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("live_frames", &self.arena.live())
            .field("parked", &self.parked.len())
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

/// How a caller was resumed
#[derive(Debug, Clone)]
pub enum Completion {
    Returned,
    Threw(ErrorPayload),
}

impl Completion {
    pub fn error(&self) -> Option<&ErrorPayload> {
        match self {
            Completion::Returned => None,
            Completion::Threw(error) => Some(error),
        }
    }
}

/// Records every resumption of a caller frame
///
/// Used as the caller's continuation when the caller is host code rather
/// than another frame: the slot is inspected once the task goes idle.
#[derive(Debug, Clone, Default)]
pub struct CompletionSlot {
    resumed: Arc<Mutex<Vec<(FrameId, Completion)>>>,
}

impl CompletionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continuation that records into this slot
    pub fn continuation(&self) -> Continuation {
        let resumed = Arc::clone(&self.resumed);
        Continuation::new("completion-slot", move |_task, frame, error| {
            let completion = match error {
                Some(error) => Completion::Threw(error),
                None => Completion::Returned,
            };
            resumed.lock().push((frame, completion));
            Ok(())
        })
    }

    /// The single recorded completion, if exactly one happened
    pub fn single(&self) -> Option<(FrameId, Completion)> {
        let resumed = self.resumed.lock();
        match resumed.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        }
    }

    /// Number of recorded resumptions
    pub fn count(&self) -> usize {
        self.resumed.lock().len()
    }
}
