//! Distributed target dispatch
//!
//! Executes a named distributed target locally on behalf of a suspended
//! caller, stitching the callee into the caller's chain of frames through
//! an intermediate frame so that the callee's result or error reaches the
//! caller as if it had called the target directly.
//!
//! # Example
//!
//! ```no_run
//! use distributed_dispatch::{run_target, util::config::BridgeConfig, Result};
//!
//! fn main() -> Result<()> {
//!     let value = run_target("echo", "[42]", &BridgeConfig::default())?;
//!     println!("{}", value);
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

pub mod builtins;
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

use anyhow::anyhow;
use tracing::debug;

use crate::builtins::{builtin_registry, ListDecoder};
use crate::runtime::actor::LocalActor;
use crate::runtime::dispatch::{decoder_ref, dispatch, DispatchRequest, ResultBuffer};
use crate::runtime::memory::{ArenaStats, FrameAllocator};
use crate::runtime::registry::{CallableRegistry, RemoteCallTarget};
use crate::runtime::task::{Completion, CompletionSlot, Task, TaskId};
use crate::runtime::value::Value;
use crate::util::config::BridgeConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Outcome of running one target to completion
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Value the target wrote, or `Unit` when it wrote none
    pub value: Value,
    /// Parked steps the task ran after the initial dispatch
    pub steps: usize,
    /// Frame arena counters once the task went idle
    pub stats: ArenaStats,
}

/// Run a builtin target with a JSON array of arguments
pub fn run_target(
    target: &str,
    args_json: &str,
    config: &BridgeConfig,
) -> Result<Value> {
    run_target_in(&builtin_registry(), target, args_json, config).map(|report| report.value)
}

/// Run `target` from `registry` to completion on a fresh task
///
/// An error the caller was resumed with becomes the `Err`.
pub fn run_target_in(
    registry: &dyn CallableRegistry,
    target: &str,
    args_json: &str,
    config: &BridgeConfig,
) -> Result<RunReport> {
    let decoder = ListDecoder::from_json(args_json).context("Failed to decode arguments")?;
    let result = ResultBuffer::new();
    let request = DispatchRequest::new(
        LocalActor::shared("local"),
        RemoteCallTarget::new(target),
        decoder_ref(decoder),
        result.clone(),
    );

    let mut task = Task::with_config(TaskId(0), &config.arena);
    let caller = task.root_frame(0)?;
    let slot = CompletionSlot::new();
    dispatch(&mut task, registry, request, caller, slot.continuation())?;
    let steps = task.run_until_idle()?;

    let (_, completion) = slot
        .single()
        .ok_or_else(|| anyhow!("Target `{}` did not resume its caller exactly once", target))?;
    task.arena_mut().release(caller)?;
    let stats = task.arena().stats();
    debug!(name = target, steps, peak_live = stats.peak_live, "task idle");

    match completion {
        Completion::Returned => Ok(RunReport {
            value: result.take().unwrap_or(Value::Unit),
            steps,
            stats,
        }),
        Completion::Threw(error) => {
            Err(anyhow::Error::new(error).context(format!("Target `{}` failed", target)))
        }
    }
}
