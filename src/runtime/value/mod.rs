//! Boundary value types
//!
//! Decoded argument values and the type descriptors that drive decoding.
//! The dispatch core moves these around without looking inside them.

pub mod runtime_value;
pub use runtime_value::*;

#[cfg(test)]
mod tests;
