//! Completion relay
//!
//! Resume target of every callee frame created by `dispatch`. When the
//! callee completes, the relay receives the intermediate frame, unhooks the
//! caller's frame and continuation from it, releases it, and resumes the
//! caller with the callee's error untouched.

use tracing::{debug, error};

use crate::runtime::errors::{ErrorPayload, FrameError, FrameResult};
use crate::runtime::memory::FrameId;
use crate::runtime::task::{Continuation, Task};

/// Continuation that forwards completion of `intermediate` to its parent
///
/// The relay only accepts the frame it was built for. Any other frame is
/// rejected before anything is released or resumed.
pub fn completion_relay(intermediate: FrameId) -> Continuation {
    Continuation::new("completion-relay", move |task, frame, error| {
        relay(task, intermediate, frame, error)
    })
}

fn relay(
    task: &mut Task,
    expected: FrameId,
    frame: FrameId,
    error: Option<ErrorPayload>,
) -> FrameResult<()> {
    if frame != expected {
        error!(%expected, %frame, "completion relayed for the wrong frame");
        return Err(FrameError::UnexpectedFrame {
            expected,
            found: frame,
        });
    }

    let (caller_frame, caller_resume) = task.arena_mut().detach(frame)?;

    debug!(
        intermediate = %frame,
        %caller_frame,
        failed = error.is_some(),
        "relaying completion to caller"
    );
    caller_resume.resume(task, caller_frame, error)
}
