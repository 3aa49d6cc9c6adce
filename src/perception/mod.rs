pub mod context;
pub mod elements;
pub mod traits;
pub mod types;

pub use context::ContextDetector;
pub use elements::ElementExtractor;
