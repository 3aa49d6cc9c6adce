//! Per-instruction resolution pipeline.
pub mod engine;
pub mod journal;
pub mod state;
pub mod warmup;

pub use engine::Orchestrator;
pub use journal::Journal;
pub use state::{Resolution, ResolutionSource, ResolutionState};
pub use warmup::Warmer;
