//! Runtime errors

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::runtime::memory::FrameId;
use crate::runtime::value::ValueKind;

/// Frame machinery result
pub type FrameResult<T> = Result<T, FrameError>;

/// Failures the dispatch bridge originates
///
/// These never leave the bridge as a return value: they are wrapped in an
/// [`ErrorPayload`] and delivered to the caller's continuation.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No distributed target named {name:?}")]
    TargetNotFound { name: String },

    #[error("Target {name:?} is registered but not flagged distributed")]
    MalformedRecord { name: String },

    #[error("Cannot allocate frames for target {name:?}: {source}")]
    FrameExhausted {
        name: String,
        #[source]
        source: FrameError,
    },
}

/// Misuse of the frame arena or of a frame chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Frame arena exhausted ({limit} live frames)")]
    Exhausted { limit: usize },

    #[error("Frame size {0} cannot be laid out")]
    Oversized(usize),

    #[error("Stale or unknown frame handle {0}")]
    InvalidHandle(FrameId),

    #[error("Frame {released} released out of order (top is {top:?})")]
    OutOfOrder {
        released: FrameId,
        top: Option<FrameId>,
    },

    #[error("Frame {0} has no resume target")]
    MissingResume(FrameId),

    #[error("Frame {0} has no parent to resume")]
    MissingParent(FrameId),

    #[error("Completion delivered for frame {found}, expected {expected}")]
    UnexpectedFrame { expected: FrameId, found: FrameId },
}

/// Argument decoding failures, raised by decoders inside entry points
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("No argument left to decode as {expected}")]
    Exhausted { expected: String },

    #[error("Argument {index} is {found}, expected {expected}")]
    TypeMismatch {
        index: usize,
        expected: String,
        found: ValueKind,
    },

    #[error("Malformed argument payload: {0}")]
    Malformed(String),
}

/// Opaque error value carried along resume paths
///
/// Cloning shares the same underlying error, so a payload forwarded through
/// any number of frames is still the one the callee produced.
#[derive(Clone)]
pub struct ErrorPayload(Arc<dyn StdError + Send + Sync>);

impl ErrorPayload {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    pub fn from_arc(error: Arc<dyn StdError + Send + Sync>) -> Self {
        Self(error)
    }

    /// Borrow the underlying error
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Whether both payloads carry the very same error instance
    pub fn same_as(
        &self,
        other: &ErrorPayload,
    ) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ErrorPayload {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("ErrorPayload").field(&self.0).finish()
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for ErrorPayload {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<DispatchError> for ErrorPayload {
    fn from(error: DispatchError) -> Self {
        ErrorPayload::new(error)
    }
}
