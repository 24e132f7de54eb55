//! Entry-point calling contract
//!
//! Every distributed target is reached through a [`DistributedAccessor`]:
//! it declares the frame size it needs and is invoked with a callee frame and
//! an [`InvocationArgs`] bundle whose fields follow the fixed parameter order
//! decoder, argument types, result buffer, substitutions, witness tables,
//! witness table count, actor.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::runtime::actor::ActorRef;
use crate::runtime::errors::{DecodeError, FrameResult};
use crate::runtime::memory::FrameId;
use crate::runtime::task::Task;
use crate::runtime::value::{TypeDescriptor, Value};

/// Opaque shared handle, passed through uninterpreted
pub type OpaqueRef = Arc<dyn Any + Send + Sync>;

/// Argument type descriptors, after substitution
pub type ArgumentTypes = SmallVec<[TypeDescriptor; 4]>;

/// Decodes the arguments of one invocation
///
/// Only entry points call this; the bridge just passes the decoder along.
pub trait InvocationDecoder: Send {
    fn decode_generic_substitutions(&mut self) -> Result<Vec<TypeDescriptor>, DecodeError> {
        Ok(Vec::new())
    }

    /// Decode the next argument as `ty`
    fn decode_next_argument(
        &mut self,
        ty: &TypeDescriptor,
    ) -> Result<Value, DecodeError>;

    fn decode_return_type(&mut self) -> Result<Option<TypeDescriptor>, DecodeError> {
        Ok(None)
    }

    fn decode_error_type(&mut self) -> Result<Option<TypeDescriptor>, DecodeError> {
        Ok(None)
    }
}

/// Shared decoder; entry points keep using it across suspensions
pub type DecoderRef = Arc<Mutex<dyn InvocationDecoder>>;

/// Wrap a decoder for sharing
pub fn decoder_ref<D: InvocationDecoder + 'static>(decoder: D) -> DecoderRef {
    Arc::new(Mutex::new(decoder))
}

/// Slot the entry point writes its result into
#[derive(Clone, Default)]
pub struct ResultBuffer(Arc<Mutex<Option<Value>>>);

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(
        &self,
        value: Value,
    ) {
        *self.0.lock() = Some(value);
    }

    /// Current contents, leaving them in place
    pub fn get(&self) -> Option<Value> {
        self.0.lock().clone()
    }

    pub fn take(&self) -> Option<Value> {
        self.0.lock().take()
    }
}

impl fmt::Debug for ResultBuffer {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("ResultBuffer").field(&*self.0.lock()).finish()
    }
}

/// Generic substitutions for the invocation
#[derive(Clone)]
pub struct Substitutions(pub OpaqueRef);

impl fmt::Debug for Substitutions {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str("Substitutions(..)")
    }
}

/// Witness tables for the invocation's generic requirements
#[derive(Clone, Default)]
pub struct WitnessTables(Arc<[OpaqueRef]>);

impl WitnessTables {
    pub fn new(tables: Vec<OpaqueRef>) -> Self {
        Self(Arc::from(tables))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(
        &self,
        index: usize,
    ) -> Option<&OpaqueRef> {
        self.0.get(index)
    }
}

impl fmt::Debug for WitnessTables {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "WitnessTables({})", self.0.len())
    }
}

/// Arguments an entry point is invoked with
#[derive(Clone)]
pub struct InvocationArgs {
    pub decoder: DecoderRef,
    pub argument_types: ArgumentTypes,
    pub result_buffer: ResultBuffer,
    pub substitutions: Option<Substitutions>,
    pub witness_tables: WitnessTables,
    pub witness_table_count: usize,
    pub actor: ActorRef,
}

impl fmt::Debug for InvocationArgs {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("InvocationArgs")
            .field("argument_types", &self.argument_types)
            .field("result_buffer", &self.result_buffer)
            .field("substitutions", &self.substitutions)
            .field("witness_tables", &self.witness_tables)
            .field("witness_table_count", &self.witness_table_count)
            .field("actor", &self.actor.id())
            .finish()
    }
}

/// A locally invokable distributed target
pub trait DistributedAccessor: Send + Sync {
    /// Payload bytes the callee frame needs
    fn frame_size(&self) -> usize;

    /// Start executing in `frame`
    ///
    /// The accessor finishes by calling [`Task::complete`] on `frame`, either
    /// right away or from a step it parked with [`Task::suspend`].
    fn invoke(
        &self,
        task: &mut Task,
        frame: FrameId,
        args: InvocationArgs,
    ) -> FrameResult<()>;
}

/// Entry point signature for function-backed accessors
pub type EntryFn = fn(&mut Task, FrameId, InvocationArgs) -> FrameResult<()>;

/// Accessor backed by a plain function
#[derive(Debug, Clone, Copy)]
pub struct FnAccessor {
    /// Declared frame size
    pub frame_size: usize,
    /// Entry point
    pub entry: EntryFn,
}

impl FnAccessor {
    pub const fn new(
        frame_size: usize,
        entry: EntryFn,
    ) -> Self {
        Self { frame_size, entry }
    }
}

impl DistributedAccessor for FnAccessor {
    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn invoke(
        &self,
        task: &mut Task,
        frame: FrameId,
        args: InvocationArgs,
    ) -> FrameResult<()> {
        (self.entry)(task, frame, args)
    }
}
