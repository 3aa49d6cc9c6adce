//! Script validation and step-by-step execution over the privileged shell.
pub mod engine;
pub mod safety;

pub use engine::ExecutionEngine;
