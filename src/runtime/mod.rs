//! Runtime system
//!
//! Frame memory, task execution and the dispatch bridge that runs
//! distributed targets locally.

pub mod actor;
pub mod dispatch;
pub mod errors;
pub mod memory;
pub mod registry;
pub mod task;
pub mod value;
