//! Builtin distributed targets
//!
//! A handful of targets registered by the CLI and used by tests and
//! benchmarks, plus a list-backed argument decoder that can be fed from
//! JSON.

use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;

use crate::runtime::dispatch::{
    DistributedAccessor, FnAccessor, InvocationArgs, InvocationDecoder,
};
use crate::runtime::errors::{DecodeError, ErrorPayload, FrameResult};
use crate::runtime::memory::FrameId;
use crate::runtime::registry::{CallableRecord, GenericEnvironment, Registry};
use crate::runtime::task::Task;
use crate::runtime::value::{TypeDescriptor, Value, ValueKind};

/// Errors thrown by builtin targets
#[derive(Debug, Error)]
pub enum BuiltinError {
    #[error("Target failed with code {0}")]
    Code(i64),

    #[error("Target was cancelled")]
    Cancelled,

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Decoder over an in-memory argument list
#[derive(Debug, Default)]
pub struct ListDecoder {
    arguments: VecDeque<Value>,
    position: usize,
    substitutions: Vec<TypeDescriptor>,
}

impl ListDecoder {
    pub fn new(arguments: Vec<Value>) -> Self {
        Self {
            arguments: arguments.into(),
            position: 0,
            substitutions: Vec::new(),
        }
    }

    pub fn with_substitutions(
        mut self,
        substitutions: Vec<TypeDescriptor>,
    ) -> Self {
        self.substitutions = substitutions;
        self
    }

    /// Decoder over a JSON array of arguments
    pub fn from_json(source: &str) -> Result<Self, DecodeError> {
        let parsed: serde_json::Value =
            serde_json::from_str(source).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        match parsed {
            serde_json::Value::Array(items) => {
                let arguments = items
                    .into_iter()
                    .map(value_from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::new(arguments))
            }
            other => Err(DecodeError::Malformed(format!(
                "expected a JSON array of arguments, found {}",
                other
            ))),
        }
    }

    /// Arguments not decoded yet
    pub fn remaining(&self) -> usize {
        self.arguments.len()
    }
}

impl InvocationDecoder for ListDecoder {
    fn decode_generic_substitutions(&mut self) -> Result<Vec<TypeDescriptor>, DecodeError> {
        Ok(self.substitutions.clone())
    }

    fn decode_next_argument(
        &mut self,
        ty: &TypeDescriptor,
    ) -> Result<Value, DecodeError> {
        let value = self
            .arguments
            .pop_front()
            .ok_or_else(|| DecodeError::Exhausted {
                expected: ty.name().to_string(),
            })?;
        let index = self.position;
        self.position += 1;
        if !ty.accepts(&value) {
            return Err(DecodeError::TypeMismatch {
                index,
                expected: ty.name().to_string(),
                found: value.kind(),
            });
        }
        Ok(value)
    }
}

/// Convert a JSON value into an argument value
pub fn value_from_json(json: serde_json::Value) -> Result<Value, DecodeError> {
    Ok(match json {
        serde_json::Value::Null => Value::Unit,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| DecodeError::Malformed(format!("unsupported number {}", n)))?,
        },
        serde_json::Value::String(s) => Value::String(Arc::from(s)),
        serde_json::Value::Array(items) => Value::list(
            items
                .into_iter()
                .map(value_from_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        serde_json::Value::Object(_) => {
            return Err(DecodeError::Malformed("objects are not supported".into()))
        }
    })
}

fn decode(
    args: &InvocationArgs,
    index: usize,
) -> Result<Value, DecodeError> {
    let ty = args
        .argument_types
        .get(index)
        .cloned()
        .unwrap_or_else(|| TypeDescriptor::of(ValueKind::Any));
    args.decoder.lock().decode_next_argument(&ty)
}

fn throw(
    task: &mut Task,
    frame: FrameId,
    error: BuiltinError,
) -> FrameResult<()> {
    task.complete(frame, Some(ErrorPayload::new(error)))
}

/// `echo(x) -> x`
fn echo(
    task: &mut Task,
    frame: FrameId,
    args: InvocationArgs,
) -> FrameResult<()> {
    match decode(&args, 0) {
        Ok(value) => {
            args.result_buffer.write(value);
            task.complete(frame, None)
        }
        Err(error) => throw(task, frame, error.into()),
    }
}

/// `add(a: Int, b: Int) -> Int`
fn add(
    task: &mut Task,
    frame: FrameId,
    args: InvocationArgs,
) -> FrameResult<()> {
    let operands = decode_int(&args, 0).and_then(|a| Ok((a, decode_int(&args, 1)?)));
    match operands {
        Ok((a, b)) => {
            args.result_buffer.write(Value::Int(a.wrapping_add(b)));
            task.complete(frame, None)
        }
        Err(error) => throw(task, frame, error.into()),
    }
}

fn decode_int(
    args: &InvocationArgs,
    index: usize,
) -> Result<i64, DecodeError> {
    let value = decode(args, index)?;
    value.to_int().ok_or_else(|| DecodeError::TypeMismatch {
        index,
        expected: "Int".into(),
        found: value.kind(),
    })
}

/// Always throws code 7
fn faulty(
    task: &mut Task,
    frame: FrameId,
    _args: InvocationArgs,
) -> FrameResult<()> {
    throw(task, frame, BuiltinError::Code(7))
}

/// Suspends twice, then echoes its argument
///
/// The number of resumptions so far is kept in the first payload byte.
fn suspend_twice(
    task: &mut Task,
    frame: FrameId,
    args: InvocationArgs,
) -> FrameResult<()> {
    task.arena_mut().get_mut(frame)?.payload_mut()[0] = 0;
    task.suspend(frame, move |task, frame| suspend_twice_step(task, frame, args));
    Ok(())
}

fn suspend_twice_step(
    task: &mut Task,
    frame: FrameId,
    args: InvocationArgs,
) -> FrameResult<()> {
    let resumed = {
        let payload = task.arena_mut().get_mut(frame)?.payload_mut();
        payload[0] += 1;
        payload[0]
    };
    if resumed < 2 {
        task.suspend(frame, move |task, frame| suspend_twice_step(task, frame, args));
        return Ok(());
    }
    echo(task, frame, args)
}

/// `countdown(n: Int)`: suspends `n` times, honouring cancellation
fn countdown(
    task: &mut Task,
    frame: FrameId,
    args: InvocationArgs,
) -> FrameResult<()> {
    match decode_int(&args, 0) {
        Ok(n) => countdown_step(task, frame, args, n),
        Err(error) => throw(task, frame, error.into()),
    }
}

fn countdown_step(
    task: &mut Task,
    frame: FrameId,
    args: InvocationArgs,
    left: i64,
) -> FrameResult<()> {
    if task.is_cancelled() {
        return throw(task, frame, BuiltinError::Cancelled);
    }
    if left <= 0 {
        args.result_buffer.write(Value::Unit);
        return task.complete(frame, None);
    }
    task.suspend(frame, move |task, frame| {
        countdown_step(task, frame, args, left - 1)
    });
    Ok(())
}

/// Names and accessors of every builtin target
pub fn builtin_accessors() -> Vec<(&'static str, FnAccessor)> {
    vec![
        ("echo", FnAccessor::new(32, echo)),
        ("add", FnAccessor::new(16, add)),
        ("faulty", FnAccessor::new(0, faulty)),
        ("suspendTwice", FnAccessor::new(16, suspend_twice)),
        ("countdown", FnAccessor::new(16, countdown)),
    ]
}

/// Registry holding every builtin target
///
/// `echo` is generic over its argument and carries a generic environment
/// naming its single parameter.
pub fn builtin_registry() -> Registry {
    let mut registry = Registry::new();
    for (name, accessor) in builtin_accessors() {
        let accessor: Arc<dyn DistributedAccessor> = Arc::new(accessor);
        let mut record = CallableRecord::new(name, accessor);
        if name == "echo" {
            record = record.with_generic_environment(GenericEnvironment::new(vec![
                TypeDescriptor::new("T", ValueKind::Any),
            ]));
        }
        registry.register(record);
    }
    registry
}
