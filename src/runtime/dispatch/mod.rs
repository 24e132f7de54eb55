//! Distributed target dispatch
//!
//! [`dispatch`] executes a distributed target locally on behalf of a caller
//! frame:
//!
//! ```text
//! caller frame ──parent── intermediate frame ──parent── callee frame
//!   (caller's own)          resume: caller's             resume: completion relay
//!                           continuation
//! ```
//!
//! The callee runs in its own frame and returns through the completion
//! relay, which releases the intermediate frame and resumes the caller. To
//! the caller this looks exactly like calling the target directly.
//!
//! Resolution failures never escape as return values: they are delivered to
//! the caller's continuation as an error payload, just like errors thrown by
//! the target itself.

pub mod abi;
mod relay;

pub use abi::{
    decoder_ref, ArgumentTypes, DecoderRef, DistributedAccessor, EntryFn, FnAccessor,
    InvocationArgs, InvocationDecoder, OpaqueRef, ResultBuffer, Substitutions, WitnessTables,
};
pub use relay::completion_relay;

use std::fmt;

use tracing::{debug, debug_span};

use crate::runtime::actor::ActorRef;
use crate::runtime::errors::{DispatchError, ErrorPayload, FrameError, FrameResult};
use crate::runtime::memory::{FrameAllocator, FrameId};
use crate::runtime::registry::{resolve, CallableRegistry, RemoteCallTarget};
use crate::runtime::task::{Continuation, Task};
use crate::runtime::value::TypeDescriptor;

/// Frame size of the intermediate frame; it carries nothing but its links
pub const INTERMEDIATE_FRAME_SIZE: usize = 0;

/// Everything needed to execute one target
#[derive(Clone)]
pub struct DispatchRequest {
    pub actor: ActorRef,
    pub target: RemoteCallTarget,
    pub decoder: DecoderRef,
    pub argument_types: ArgumentTypes,
    pub result_buffer: ResultBuffer,
    pub substitutions: Option<Substitutions>,
    pub witness_tables: WitnessTables,
    pub witness_table_count: usize,
}

impl DispatchRequest {
    /// Request with no generic context
    pub fn new(
        actor: ActorRef,
        target: RemoteCallTarget,
        decoder: DecoderRef,
        result_buffer: ResultBuffer,
    ) -> Self {
        Self {
            actor,
            target,
            decoder,
            argument_types: ArgumentTypes::new(),
            result_buffer,
            substitutions: None,
            witness_tables: WitnessTables::default(),
            witness_table_count: 0,
        }
    }

    pub fn with_argument_types(
        mut self,
        types: impl IntoIterator<Item = TypeDescriptor>,
    ) -> Self {
        self.argument_types = types.into_iter().collect();
        self
    }

    pub fn with_substitutions(
        mut self,
        substitutions: Substitutions,
    ) -> Self {
        self.substitutions = Some(substitutions);
        self
    }

    /// Set witness tables; the count follows the tables
    pub fn with_witness_tables(
        mut self,
        tables: WitnessTables,
    ) -> Self {
        self.witness_table_count = tables.len();
        self.witness_tables = tables;
        self
    }

    fn into_invocation(self) -> InvocationArgs {
        InvocationArgs {
            decoder: self.decoder,
            argument_types: self.argument_types,
            result_buffer: self.result_buffer,
            substitutions: self.substitutions,
            witness_tables: self.witness_tables,
            witness_table_count: self.witness_table_count,
            actor: self.actor,
        }
    }
}

impl fmt::Debug for DispatchRequest {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("DispatchRequest")
            .field("actor", &self.actor.id())
            .field("target", &self.target)
            .field("argument_types", &self.argument_types)
            .field("witness_table_count", &self.witness_table_count)
            .finish()
    }
}

/// Execute `request.target` locally for `caller_frame`
///
/// The caller is resumed exactly once through `caller_resume`, with no
/// error when the target returned, with the target's own error payload when
/// it threw, or with a [`DispatchError`] payload when the target could not be
/// run at all. In the last case no frame stays allocated.
///
/// An `Err` return means the frame machinery itself was misused (for example
/// `caller_frame` is not live); the caller has not been resumed then.
pub fn dispatch(
    task: &mut Task,
    registry: &dyn CallableRegistry,
    request: DispatchRequest,
    caller_frame: FrameId,
    caller_resume: Continuation,
) -> FrameResult<()> {
    let span = debug_span!("dispatch", name = %request.target, task = %task.id());
    let _enter = span.enter();

    if !task.arena().contains(caller_frame) {
        return Err(FrameError::InvalidHandle(caller_frame));
    }

    let record = match resolve(registry, request.target.as_bytes()) {
        Ok(record) => record,
        Err(error) => return caller_resume.resume(task, caller_frame, Some(error.into())),
    };

    let arena = task.arena_mut();
    let intermediate = match arena.allocate(INTERMEDIATE_FRAME_SIZE) {
        Ok(frame) => frame,
        Err(source) => {
            return fail_allocation(task, &request.target, source, caller_frame, caller_resume)
        }
    };
    let callee = match arena.allocate(record.frame_size()) {
        Ok(frame) => frame,
        Err(source) => {
            // Nothing links to the intermediate frame yet; it is on top.
            arena.release(intermediate)?;
            return fail_allocation(task, &request.target, source, caller_frame, caller_resume);
        }
    };

    arena.link(intermediate, caller_frame, caller_resume)?;
    arena.link(callee, intermediate, completion_relay(intermediate))?;

    debug!(
        %caller_frame,
        %intermediate,
        %callee,
        frame_size = record.frame_size(),
        "invoking distributed target"
    );
    record
        .accessor()
        .invoke(task, callee, request.into_invocation())
}

fn fail_allocation(
    task: &mut Task,
    target: &RemoteCallTarget,
    source: FrameError,
    caller_frame: FrameId,
    caller_resume: Continuation,
) -> FrameResult<()> {
    let error = DispatchError::FrameExhausted {
        name: target.display_name(),
        source,
    };
    caller_resume.resume(task, caller_frame, Some(ErrorPayload::from(error)))
}
